use std::sync::Arc;
use std::time::Instant;

use log::debug;
use tokio::task::spawn_blocking;

use crate::embedding::EmbeddingProvider;
use crate::metrics;
use crate::store::{SearchHit, VectorStore};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("查询文本不能为空")]
    EmptyQuery,
    #[error("查询文本编码失败: {0}")]
    Encoding(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// 向量库为空，尚未编码任何图片
    NoIndex,
    /// 按距离升序排列的结果
    Found(Vec<SearchHit>),
}

impl SearchOutcome {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            Self::NoIndex => &[],
            Self::Found(hits) => hits,
        }
    }
}

/// 文本搜图
pub struct SearchService<P, S> {
    provider: Arc<P>,
    store: Arc<S>,
}

impl<P, S> Clone for SearchService<P, S> {
    fn clone(&self) -> Self {
        Self { provider: self.provider.clone(), store: self.store.clone() }
    }
}

impl<P, S> SearchService<P, S>
where
    P: EmbeddingProvider + 'static,
    S: VectorStore,
{
    pub fn new(provider: Arc<P>, store: Arc<S>) -> Self {
        Self { provider, store }
    }

    /// 搜索与 `query` 最相似的 `k` 张图片
    ///
    /// 向量库为空时直接返回 [`SearchOutcome::NoIndex`]，不会调用编码器
    pub async fn search(&self, query: &str, k: usize) -> Result<SearchOutcome, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if self.store.count().await? == 0 {
            debug!("向量库为空，跳过编码");
            return Ok(SearchOutcome::NoIndex);
        }

        let start = Instant::now();
        let provider = self.provider.clone();
        let texts = vec![query.to_owned()];
        let result = spawn_blocking(move || provider.extract(&[], &texts))
            .await
            .map_err(|e| SearchError::Encoding(e.to_string()))?
            .and_then(|result| result.into_result())
            .map_err(|e| SearchError::Encoding(e.to_string()))?;
        let Some(vector) = result.text_embeddings.into_iter().next() else {
            return Err(SearchError::Encoding("编码器没有返回向量".to_string()));
        };

        let hits = self.store.nearest(&vector, k).await?;
        debug!("搜索 {:?} 返回 {} 个结果", query, hits.len());
        metrics::observe_search_duration(start.elapsed().as_secs_f64());

        Ok(SearchOutcome::Found(hits))
    }
}
