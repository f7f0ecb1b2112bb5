use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::embedding::ProviderOptions;
use crate::pipeline::PersistMode;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs =
        ProjectDirs::from("", "clipsearch", "clipsearch").expect("failed to get project dir");
    ConfDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap_or("clipsearch")
}

#[derive(Parser, Debug, Clone)]
pub struct ClipOptions {
    /// CLIP 向量提取程序，通过 stdin/stdout 以 JSON 交互
    #[arg(long, value_name = "PATH", default_value = "clip-extract")]
    pub extractor: PathBuf,
    /// CLIP 模型文件路径，默认为配置目录下的 model.gguf
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,
    /// 编码使用的线程数
    #[arg(short = 't', long, value_name = "N", default_value_t = 4)]
    pub threads: u32,
    /// 提取程序的日志级别，0 为静默
    #[arg(long, value_name = "LEVEL", default_value_t = 0)]
    pub clip_verbose: u32,
}

impl ClipOptions {
    /// 结合配置目录生成向量提取参数
    pub fn provider_options(&self, conf_dir: &ConfDir) -> ProviderOptions {
        ProviderOptions {
            extractor: self.extractor.clone(),
            model_path: self.model.clone().unwrap_or_else(|| conf_dir.model()),
            n_threads: self.threads,
            verbose: self.clip_verbose,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct IndexOptions {
    /// 每批提交给编码器的图片数量
    #[arg(short, long, value_name = "N", default_value_t = 10)]
    pub batch_size: usize,
    /// 每批完成后立即保存已编码记录，而不是整轮结束后保存一次
    #[arg(long)]
    pub persist_each_batch: bool,
}

impl IndexOptions {
    pub fn persist_mode(&self) -> PersistMode {
        if self.persist_each_batch { PersistMode::PerBatch } else { PersistMode::PerRun }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "clipsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// clipsearch 数据目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 编码一个图片集合并写入向量库
    Index(IndexCommand),
    /// 使用文本搜索相似图片
    Search(SearchCommand),
    /// 列出可用的图片集合
    Collections(CollectionsCommand),
    /// 显示已编码记录和向量库状态
    Status(StatusCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回向量数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("clipsearch.db")
    }

    /// 返回已编码记录文件的路径
    pub fn registry(&self) -> PathBuf {
        self.path.join("encoded.json")
    }

    /// 返回默认模型文件的路径
    pub fn model(&self) -> PathBuf {
        self.path.join("model.gguf")
    }

    /// 返回图片集合的本地可写目录
    pub fn collections(&self) -> PathBuf {
        self.path.join("collections")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
