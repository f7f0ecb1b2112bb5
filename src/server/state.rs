use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ConfDir;
use crate::embedding::CommandProvider;
use crate::pipeline::Indexer;
use crate::search::SearchService;
use crate::store::SqliteVectorStore;

/// 应用状态
pub struct AppState {
    /// 编码流程
    pub indexer: Indexer<CommandProvider, SqliteVectorStore>,
    /// 搜索服务
    pub search: SearchService<CommandProvider, SqliteVectorStore>,
    /// 数据目录
    pub conf_dir: ConfDir,
    /// 资源目录
    pub assets: PathBuf,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        indexer: Indexer<CommandProvider, SqliteVectorStore>,
        search: SearchService<CommandProvider, SqliteVectorStore>,
        conf_dir: ConfDir,
        assets: PathBuf,
        token: String,
    ) -> Arc<Self> {
        Arc::new(AppState { indexer, search, conf_dir, assets, token })
    }

    pub fn check_token(&self, token: &str) -> bool {
        self.token == token
    }
}
