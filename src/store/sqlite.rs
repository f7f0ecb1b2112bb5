use std::path::Path;

use anyhow::{Result, bail};
use log::{debug, info};
use sqlx::SqlitePool;
use sqlx::sqlite::*;
use tokio::sync::RwLock;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use super::{EmbeddingRecord, SearchHit, VectorStore, sort_hits};

/// 基于 SQLite 的向量库
///
/// 记录保存在 SQLite 中，打开时将所有向量载入内存中的 usearch HNSW 索引，
/// 索引的 key 即记录的行 ID。
pub struct SqliteVectorStore {
    pool: SqlitePool,
    /// 写入第一条记录前维度未知，此时为 None
    index: RwLock<Option<Index>>,
}

impl SqliteVectorStore {
    /// 打开向量库，不存在时自动创建
    pub async fn open(filename: impl AsRef<Path>) -> Result<Self> {
        let filename = filename.as_ref();
        info!("初始化数据库连接: {}", filename.display());

        if let Some(parent) = filename.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .filename(filename)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;

        info!("检查数据库迁移");
        sqlx::migrate!().run(&pool).await?;

        let index = load_index(&pool).await?;
        Ok(Self { pool, index: RwLock::new(index) })
    }

    /// 维度，空库返回 None
    pub async fn dimensions(&self) -> Option<usize> {
        self.index.read().await.as_ref().map(|index| index.dimensions())
    }
}

impl VectorStore for SqliteVectorStore {
    async fn insert(&self, record: EmbeddingRecord) -> Result<()> {
        let mut lock = self.index.write().await;
        if let Some(index) = lock.as_ref() {
            if index.dimensions() != record.vector.len() {
                bail!("向量维度不一致: {} != {}", record.vector.len(), index.dimensions());
            }
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO embedding (collection, path, name, vector)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&record.collection)
        .bind(&record.path)
        .bind(&record.name)
        .bind(bytemuck::cast_slice::<f32, u8>(&record.vector))
        .fetch_one(&self.pool)
        .await?;

        // 第一条记录写入后才确定维度
        if lock.is_none() {
            *lock = Some(create_index(record.vector.len())?);
        }
        if let Some(index) = lock.as_ref() {
            if index.size() + 1 > index.capacity() {
                index.reserve((index.capacity() * 2).max(64))?;
            }
            index.add(id as u64, &record.vector)?;
        }

        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM embedding")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let lock = self.index.read().await;
        let Some(index) = lock.as_ref() else {
            return Ok(vec![]);
        };
        if index.dimensions() != vector.len() {
            bail!("查询向量维度不一致: {} != {}", vector.len(), index.dimensions());
        }

        let count = k.min(index.size());
        if count == 0 {
            return Ok(vec![]);
        }
        let matches = index.search(vector, count)?;
        debug!("usearch 返回 {} 个结果", matches.keys.len());

        let mut hits = Vec::with_capacity(matches.keys.len());
        for (key, distance) in matches.keys.into_iter().zip(matches.distances) {
            let (path, name) = sqlx::query_as::<_, (String, String)>(
                "SELECT path, name FROM embedding WHERE id = ?",
            )
            .bind(key as i64)
            .fetch_one(&self.pool)
            .await?;
            hits.push(SearchHit { path, name, distance });
        }
        sort_hits(&mut hits);

        Ok(hits)
    }
}

fn create_index(dimensions: usize) -> Result<Index> {
    let options = IndexOptions {
        dimensions,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F32,
        ..Default::default()
    };
    Ok(Index::new(&options)?)
}

/// 从数据库载入所有向量
async fn load_index(pool: &SqlitePool) -> Result<Option<Index>> {
    let rows = sqlx::query_as::<_, (i64, Vec<u8>)>("SELECT id, vector FROM embedding ORDER BY id")
        .fetch_all(pool)
        .await?;
    let Some((_, first)) = rows.first() else {
        return Ok(None);
    };

    let dimensions = first.len() / size_of::<f32>();
    let index = create_index(dimensions)?;
    index.reserve(rows.len().max(64))?;
    for (id, blob) in &rows {
        let vector: Vec<f32> = bytemuck::pod_collect_to_vec(blob);
        if vector.len() != dimensions {
            bail!("记录 {} 的向量维度不一致: {} != {}", id, vector.len(), dimensions);
        }
        index.add(*id as u64, &vector)?;
    }
    info!("已载入 {} 条向量，维度 {}", rows.len(), dimensions);

    Ok(Some(index))
}
