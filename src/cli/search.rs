use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use super::{open_provider, open_store};
use crate::cli::SubCommandExtend;
use crate::config::{ClipOptions, Opts};
use crate::search::{SearchOutcome, SearchService};
use crate::store::SearchHit;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub clip: ClipOptions,
    /// 查询文本
    pub query: String,
    /// 显示的结果数量
    #[arg(short, value_name = "K", default_value_t = 10)]
    pub k: usize,
    /// 资源目录
    #[arg(long, value_name = "DIR", default_value = "assets")]
    pub assets: PathBuf,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let provider = open_provider(&self.clip, &opts.conf_dir, &self.assets)?;
        let store = open_store(&opts.conf_dir).await?;
        let service = SearchService::new(provider, store);

        match service.search(&self.query, self.k).await? {
            SearchOutcome::NoIndex => {
                println!("向量库为空，请先使用 index 命令编码图片");
                Ok(())
            }
            SearchOutcome::Found(hits) => print_result(&hits, self),
        }
    }
}

fn print_result(result: &[SearchHit], opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for hit in result {
                println!("{:.4}\t{}", hit.distance, hit.path);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
