use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::SearchHit;

/// 搜索请求参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// 查询文本
    pub query: String,
    /// 返回的结果数量
    pub k: Option<usize>,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 按距离升序排列的结果，向量库为空时为 null
    pub result: Option<Vec<SearchHit>>,
}

/// 编码请求参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct IndexRequest {
    /// 集合名
    pub collection: String,
    /// 直接编码该目录，不从资源目录复制
    pub path: Option<String>,
}

/// 集合信息
#[derive(Debug, Serialize, ToSchema)]
pub struct CollectionInfo {
    /// 集合名
    pub name: String,
    /// 已编码图片数量
    pub encoded: usize,
}
