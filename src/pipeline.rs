//! 增量编码流程
//!
//! 扫描集合目录，过滤已编码图片，分批调用编码器并写入向量库，
//! 最后更新已编码记录。进度以 [`IndexEvent`] 的形式通过 channel 发出。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio::task::{JoinHandle, spawn_blocking};
use utoipa::ToSchema;
use walkdir::WalkDir;

use crate::embedding::EmbeddingProvider;
use crate::metrics;
use crate::registry::Registry;
use crate::store::{EmbeddingRecord, VectorStore};

/// 可编码的图片后缀名
static IMAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)^(jpg|jpeg|png|webp)$").expect("failed to build regex"));

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// 已编码记录的保存时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// 整轮结束后保存一次，中途崩溃会导致下次重复编码
    #[default]
    PerRun,
    /// 每批完成后立即保存
    PerBatch,
}

/// 编码进度
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEvent {
    /// 扫描完成
    Scanned { total: usize },
    /// 目录中没有图片
    NoImages,
    /// 过滤已编码图片
    Filtered { new: usize, skipped: usize },
    /// 所有图片均已编码
    AlreadyIndexed,
    /// 开始编码第 `batch` 批（从 0 开始）
    BatchStarted { batch: usize, batches: usize, size: usize },
    /// 一批编码完成
    BatchEncoded { batch: usize, encoded: usize, failed: usize },
    /// 一批编码失败，该批图片均未写入
    BatchFailed { batch: usize, size: usize, error: String },
    /// 运行被取消
    Cancelled,
    Finished(IndexSummary),
}

/// 一轮编码的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct IndexSummary {
    /// 新编码的图片数量
    pub encoded: usize,
    /// 跳过的已编码图片数量
    pub skipped: usize,
    /// 编码失败的图片数量
    pub failed: usize,
    /// 是否被取消
    pub cancelled: bool,
}

/// 协作式取消标记，在批与批之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Indexer<P, S> {
    provider: Arc<P>,
    store: Arc<S>,
    registry_path: PathBuf,
    batch_size: usize,
    persist: PersistMode,
    /// 同一集合的编码串行执行
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
    /// 保存已编码记录时互斥，避免不同集合互相覆盖
    save_lock: Arc<tokio::sync::Mutex<()>>,
}

impl<P, S> Clone for Indexer<P, S> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            store: self.store.clone(),
            registry_path: self.registry_path.clone(),
            batch_size: self.batch_size,
            persist: self.persist,
            locks: self.locks.clone(),
            save_lock: self.save_lock.clone(),
        }
    }
}

impl<P, S> Indexer<P, S>
where
    P: EmbeddingProvider + 'static,
    S: VectorStore + 'static,
{
    pub fn new(provider: Arc<P>, store: Arc<S>, registry_path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            store,
            registry_path: registry_path.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            persist: PersistMode::default(),
            locks: Default::default(),
            save_lock: Default::default(),
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn persist(mut self, persist: PersistMode) -> Self {
        self.persist = persist;
        self
    }

    /// 编码一个集合
    ///
    /// 返回任务句柄和进度 channel，接收端被丢弃不会中断编码
    pub fn index_collection(
        &self,
        collection: &str,
        source: impl Into<PathBuf>,
        cancel: CancelToken,
    ) -> (JoinHandle<Result<IndexSummary>>, Receiver<IndexEvent>) {
        let (tx, rx) = channel(64);
        let this = self.clone();
        let collection = collection.to_owned();
        let source = source.into();
        let t = tokio::spawn(async move {
            let lock = this.collection_lock(&collection)?;
            let guard = lock.clone().lock_owned().await;
            let run = Run { indexer: &this, collection: &collection, tx, cancel };
            let result = run.execute(&source).await;
            drop(guard);
            this.release_lock(&collection, lock);
            result
        });
        (t, rx)
    }

    /// 编码一个集合并等待完成，忽略进度
    pub async fn index_and_wait(
        &self,
        collection: &str,
        source: impl Into<PathBuf>,
    ) -> Result<IndexSummary> {
        let (t, rx) = self.index_collection(collection, source, CancelToken::new());
        drop(rx);
        t.await?
    }

    fn collection_lock(&self, collection: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| anyhow!("集合锁已损坏"))?;
        Ok(locks.entry(collection.to_owned()).or_default().clone())
    }

    /// 没有其他任务持有时移除集合锁
    fn release_lock(&self, collection: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        if let Ok(mut locks) = self.locks.lock() {
            if locks.get(collection).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(collection);
            }
        }
    }

    /// 将本轮的集合记录合并进磁盘上的记录并保存
    async fn persist_registry(&self, collection: &str, registry: &Registry) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let mut disk = Registry::load(&self.registry_path);
        disk.replace_collection(collection, registry);
        disk.save(&self.registry_path)
    }
}

/// 一轮编码的上下文
struct Run<'a, P, S> {
    indexer: &'a Indexer<P, S>,
    collection: &'a str,
    tx: Sender<IndexEvent>,
    cancel: CancelToken,
}

impl<P, S> Run<'_, P, S>
where
    P: EmbeddingProvider + 'static,
    S: VectorStore + 'static,
{
    async fn emit(&self, event: IndexEvent) {
        // 接收端已关闭时继续执行
        let _ = self.tx.send(event).await;
    }

    async fn execute(&self, source: &Path) -> Result<IndexSummary> {
        let collection = self.collection;
        info!("开始编码集合 {}: {}", collection, source.display());

        let source_owned = source.to_path_buf();
        let candidates = spawn_blocking(move || scan_images(&source_owned)).await?;
        self.emit(IndexEvent::Scanned { total: candidates.len() }).await;
        if candidates.is_empty() {
            info!("集合 {} 中没有图片", collection);
            self.emit(IndexEvent::NoImages).await;
            let summary = IndexSummary::default();
            self.emit(IndexEvent::Finished(summary)).await;
            return Ok(summary);
        }

        let mut registry = Registry::load(&self.indexer.registry_path);
        let total = candidates.len();
        let new_files = candidates
            .into_iter()
            .filter(|path| !registry.is_encoded(collection, path))
            .collect::<Vec<_>>();
        let mut summary = IndexSummary { skipped: total - new_files.len(), ..Default::default() };
        self.emit(IndexEvent::Filtered { new: new_files.len(), skipped: summary.skipped }).await;

        if new_files.is_empty() {
            info!("集合 {} 已全部编码", collection);
            self.emit(IndexEvent::AlreadyIndexed).await;
            self.emit(IndexEvent::Finished(summary)).await;
            return Ok(summary);
        }

        let batches = new_files.chunks(self.indexer.batch_size).collect::<Vec<_>>();
        let nbatches = batches.len();
        for (i, batch) in batches.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("集合 {} 的编码已取消", collection);
                summary.cancelled = true;
                self.emit(IndexEvent::Cancelled).await;
                break;
            }

            self.emit(IndexEvent::BatchStarted { batch: i, batches: nbatches, size: batch.len() })
                .await;
            match self.encode_batch(i, batch, &mut registry).await {
                Ok((encoded, failed)) => {
                    summary.encoded += encoded;
                    summary.failed += failed;
                    self.emit(IndexEvent::BatchEncoded { batch: i, encoded, failed }).await;
                }
                Err(e) => {
                    warn!("集合 {} 第 {} 批编码失败: {}", collection, i, e);
                    metrics::inc_failed_batches(collection);
                    summary.failed += batch.len();
                    self.emit(IndexEvent::BatchFailed {
                        batch: i,
                        size: batch.len(),
                        error: e.to_string(),
                    })
                    .await;
                }
            }

            if self.indexer.persist == PersistMode::PerBatch {
                self.indexer.persist_registry(collection, &registry).await?;
            }
        }

        self.indexer.persist_registry(collection, &registry).await?;
        info!(
            "集合 {} 编码完成: 新增 {}, 跳过 {}, 失败 {}",
            collection, summary.encoded, summary.skipped, summary.failed
        );
        self.emit(IndexEvent::Finished(summary)).await;
        Ok(summary)
    }

    /// 编码一批图片，返回 `(成功数量, 失败数量)`
    ///
    /// 编码器调用失败时返回错误，此时没有任何记录被写入
    async fn encode_batch(
        &self,
        i: usize,
        batch: &[String],
        registry: &mut Registry,
    ) -> Result<(usize, usize)> {
        let provider = self.indexer.provider.clone();
        let paths = batch.to_vec();
        let result = spawn_blocking(move || provider.extract(&paths, &[])).await??;
        let pairs = result.into_result()?.tagged_images(batch)?;
        debug!("第 {} 批返回 {} 个向量", i, pairs.len());

        let mut encoded = 0;
        for (path, vector) in pairs {
            // 忽略未提交的路径和重复返回的路径
            if !batch.contains(&path) || registry.is_encoded(self.collection, &path) {
                continue;
            }
            let record = EmbeddingRecord::new(self.collection, path.clone(), vector);
            match self.indexer.store.insert(record).await {
                Ok(()) => {
                    registry.mark_encoded(self.collection, path);
                    encoded += 1;
                }
                Err(e) => warn!("写入向量失败: {}: {}", path, e),
            }
        }
        metrics::inc_encoded_images(self.collection, encoded as u64);

        Ok((encoded, batch.len() - encoded))
    }
}

/// 扫描目录下的所有图片，返回排序后的绝对路径
pub fn scan_images(path: &Path) -> Vec<String> {
    let root = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut entries = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| {
            entry.ok().and_then(|entry| {
                let path = entry.path();
                if entry.file_type().is_file() {
                    if let Some(ext) = path.extension() {
                        if IMAGE_SUFFIX.is_match(&ext.to_string_lossy()) {
                            return Some(path.to_string_lossy().to_string());
                        }
                    }
                }
                None
            })
        })
        .collect::<Vec<_>>();
    entries.sort();
    debug!("扫描完成，共 {} 张图片", entries.len());
    entries
}
