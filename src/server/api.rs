use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum_auth::AuthBearer;
use log::info;
use tokio::task::block_in_place;

use super::error::{AppError, Result, asset_error, search_error};
use super::state::AppState;
use super::types::*;
use crate::assets;
use crate::metrics;
use crate::pipeline::IndexSummary;
use crate::registry::Registry;
use crate::search::SearchOutcome;

const DEFAULT_K: usize = 10;

/// 使用文本搜索图片
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchRequest,
    responses(
        (status = 200, body = SearchResponse),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(data): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    if !state.check_token(&token) {
        return Err(AppError::unauthorized());
    }

    let start = Instant::now();
    info!("正在搜索: {}", data.query);

    let outcome =
        state.search.search(&data.query, data.k.unwrap_or(DEFAULT_K)).await.map_err(search_error)?;
    let result = match outcome {
        SearchOutcome::NoIndex => None,
        SearchOutcome::Found(hits) => Some(hits),
    };

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, result }))
}

/// 编码一个图片集合
#[utoipa::path(
    post,
    path = "/index",
    request_body = IndexRequest,
    responses(
        (status = 200, body = IndexSummary),
    )
)]
pub async fn index_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(data): Json<IndexRequest>,
) -> Result<Json<IndexSummary>> {
    if !state.check_token(&token) {
        return Err(AppError::unauthorized());
    }

    assets::check_name(&data.collection).map_err(asset_error)?;
    let source = match data.path {
        Some(path) => PathBuf::from(path),
        None => block_in_place(|| {
            assets::materialize_folder(&state.assets, &data.collection, &state.conf_dir.collections())
        })
        .map_err(asset_error)?,
    };

    let summary = state.indexer.index_and_wait(&data.collection, source).await?;
    Ok(Json(summary))
}

/// 列出资源目录中的集合
#[utoipa::path(
    get,
    path = "/collections",
    responses(
        (status = 200, body = Vec<CollectionInfo>),
    )
)]
pub async fn collections_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<Vec<CollectionInfo>>> {
    if !state.check_token(&token) {
        return Err(AppError::unauthorized());
    }

    let registry = Registry::load(state.conf_dir.registry());
    let collections = assets::list_collections(&state.assets)?
        .into_iter()
        .map(|name| {
            let encoded = registry.encoded(&name).map_or(0, |set| set.len());
            CollectionInfo { name, encoded }
        })
        .collect();
    Ok(Json(collections))
}

/// 导出 prometheus 指标
pub async fn metrics_handler() -> Result<String> {
    Ok(metrics::gather_text()?)
}
