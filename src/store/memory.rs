use std::sync::RwLock;

use anyhow::{Result, anyhow, bail};

use super::{EmbeddingRecord, SearchHit, VectorStore, cosine_distance, sort_hits};

/// 内存向量库，使用暴力搜索
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    records: RwLock<Vec<EmbeddingRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回所有记录的快照
    pub fn records(&self) -> Vec<EmbeddingRecord> {
        self.records.read().map(|records| records.clone()).unwrap_or_default()
    }
}

impl VectorStore for MemoryVectorStore {
    async fn insert(&self, record: EmbeddingRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|_| anyhow!("向量库锁已损坏"))?;
        if let Some(first) = records.first() {
            if first.vector.len() != record.vector.len() {
                bail!("向量维度不一致: {} != {}", record.vector.len(), first.vector.len());
            }
        }
        records.push(record);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let records = self.records.read().map_err(|_| anyhow!("向量库锁已损坏"))?;
        Ok(records.len())
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let records = self.records.read().map_err(|_| anyhow!("向量库锁已损坏"))?;
        let mut hits = records
            .iter()
            .map(|record| SearchHit {
                path: record.path.clone(),
                name: record.name.clone(),
                distance: cosine_distance(&record.vector, vector),
            })
            .collect::<Vec<_>>();
        sort_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }
}
