use std::path::PathBuf;

use clap::Parser;
use log::info;
use rand::distr::{Alphanumeric, SampleString};
use tokio::net::TcpListener;

use super::{open_provider, open_store};
use crate::cli::SubCommandExtend;
use crate::config::{ClipOptions, IndexOptions};
use crate::pipeline::Indexer;
use crate::search::SearchService;
use crate::{Opts, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub clip: ClipOptions,
    #[command(flatten)]
    pub index: IndexOptions,
    /// 资源目录
    #[arg(long, value_name = "DIR", default_value = "assets")]
    pub assets: PathBuf,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// 请求验证 token，不填则随机生成
    #[arg(long, default_value_t = String::new())]
    pub token: String,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let conf_dir = opts.conf_dir.clone();
        let provider = open_provider(&self.clip, &conf_dir, &self.assets)?;
        let store = open_store(&conf_dir).await?;

        let indexer = Indexer::new(provider.clone(), store.clone(), conf_dir.registry())
            .batch_size(self.index.batch_size)
            .persist(self.index.persist_mode());
        let search = SearchService::new(provider, store);

        let mut token = self.token.clone();
        if token.is_empty() {
            token = Alphanumeric.sample_string(&mut rand::rng(), 32);
            info!("鉴权 token: {}", token);
        }

        // 创建应用状态
        let state = server::AppState::new(indexer, search, conf_dir, self.assets.clone(), token);

        // 创建应用
        let app = server::create_app(state);

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
