mod collections;
mod index;
mod search;
pub mod server;
mod status;

use std::path::Path;
use std::sync::Arc;

pub use collections::*;
pub use index::*;
pub use search::*;
pub use server::*;
pub use status::*;

use log::info;
use tokio::task::block_in_place;

use crate::assets;
use crate::config::{ClipOptions, ConfDir, Opts};
use crate::embedding::CommandProvider;
use crate::store::SqliteVectorStore;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 模型文件名，资源目录中存在该文件时会在首次使用时复制到配置目录
const MODEL_ASSET: &str = "model.gguf";

/// 创建编码器，必要时从资源目录复制模型
fn open_provider(
    clip: &ClipOptions,
    conf_dir: &ConfDir,
    asset_root: &Path,
) -> anyhow::Result<Arc<CommandProvider>> {
    let options = clip.provider_options(conf_dir);
    if clip.model.is_none() && !options.model_path.exists() && asset_root.join(MODEL_ASSET).is_file() {
        info!("从资源目录复制模型");
        block_in_place(|| assets::materialize_file(asset_root, MODEL_ASSET, conf_dir.path()))?;
    }
    Ok(Arc::new(CommandProvider::new(options)))
}

async fn open_store(conf_dir: &ConfDir) -> anyhow::Result<Arc<SqliteVectorStore>> {
    Ok(Arc::new(SqliteVectorStore::open(conf_dir.database()).await?))
}
