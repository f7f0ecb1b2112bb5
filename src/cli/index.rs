use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::warn;
use tokio::task::block_in_place;

use super::{open_provider, open_store};
use crate::assets;
use crate::cli::SubCommandExtend;
use crate::config::{ClipOptions, IndexOptions, Opts};
use crate::pipeline::{CancelToken, IndexEvent, Indexer};
use crate::utils::{describe_event, pb_style};

#[derive(Parser, Debug, Clone)]
pub struct IndexCommand {
    #[command(flatten)]
    pub clip: ClipOptions,
    #[command(flatten)]
    pub index: IndexOptions,
    /// 集合名
    pub collection: String,
    /// 直接编码该目录，不从资源目录复制
    #[arg(short, long, value_name = "DIR")]
    pub path: Option<PathBuf>,
    /// 资源目录，每个子目录为一个集合
    #[arg(long, value_name = "DIR", default_value = "assets")]
    pub assets: PathBuf,
}

impl SubCommandExtend for IndexCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let conf_dir = &opts.conf_dir;
        assets::check_name(&self.collection)?;
        let source = match &self.path {
            Some(path) => path.clone(),
            None => block_in_place(|| {
                assets::materialize_folder(&self.assets, &self.collection, &conf_dir.collections())
            })?,
        };

        let provider = open_provider(&self.clip, conf_dir, &self.assets)?;
        let store = open_store(conf_dir).await?;
        let indexer = Indexer::new(provider, store, conf_dir.registry())
            .batch_size(self.index.batch_size)
            .persist(self.index.persist_mode());

        let cancel = CancelToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("收到中断信号，将在当前批次完成后停止");
                token.cancel();
            }
        });

        let (t, mut rx) = indexer.index_collection(&self.collection, source, cancel);

        let pb = ProgressBar::no_length().with_style(pb_style());
        while let Some(event) = rx.recv().await {
            let message = describe_event(&self.collection, &event);
            match &event {
                IndexEvent::Filtered { new, .. } => pb.set_length(*new as u64),
                IndexEvent::BatchEncoded { encoded, failed, .. } => {
                    pb.inc((encoded + failed) as u64)
                }
                IndexEvent::BatchFailed { size, .. } => {
                    pb.println(&message);
                    pb.inc(*size as u64);
                }
                IndexEvent::NoImages | IndexEvent::AlreadyIndexed | IndexEvent::Finished(_) => {
                    pb.suspend(|| println!("{}", message));
                }
                _ => {}
            }
            pb.set_message(message);
        }

        let summary = t.await??;
        pb.finish_and_clear();

        if summary.failed > 0 {
            warn!("{} 张图片编码失败，将在下次运行时重试", summary.failed);
        }
        Ok(())
    }
}
