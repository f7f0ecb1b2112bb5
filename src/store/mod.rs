mod memory;
mod sqlite;

use std::future::Future;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use utoipa::ToSchema;

pub use self::memory::*;
pub use self::sqlite::*;

/// 一张已编码的图片
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    /// 图片路径，作为唯一标识
    pub path: String,
    /// 展示用的图片名
    pub name: String,
    /// 所属集合
    pub collection: String,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(collection: &str, path: String, vector: Vec<f32>) -> Self {
        Self { name: display_name(&path), collection: collection.to_owned(), path, vector }
    }
}

/// 一条搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SearchHit {
    /// 图片路径
    pub path: String,
    /// 图片名
    pub name: String,
    /// 与查询向量的距离，越小越相似
    pub distance: f32,
}

/// 向量库
///
/// 度量方式由向量库决定，调用方不重新计算距离
pub trait VectorStore: Send + Sync {
    /// 写入一条记录
    fn insert(&self, record: EmbeddingRecord) -> impl Future<Output = Result<()>> + Send;

    /// 记录总数
    fn count(&self) -> impl Future<Output = Result<usize>> + Send;

    /// 返回与 `vector` 最接近的至多 `k` 条记录，按距离升序排列
    fn nearest(&self, vector: &[f32], k: usize) -> impl Future<Output = Result<Vec<SearchHit>>> + Send;
}

/// 从路径中取出文件名
pub fn display_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_owned())
}

/// 余弦距离，即 `1 - cos`
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0. || nb == 0. {
        return 1.;
    }
    1. - dot / (na.sqrt() * nb.sqrt())
}

/// 按距离升序排序，距离相同时按路径排序，保证结果稳定
pub(crate) fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.path.cmp(&b.path)));
}
