use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::search::SearchError;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: anyhow::Error,
}

impl AppError {
    pub fn new(status: StatusCode, error: impl Into<anyhow::Error>) -> Self {
        Self { status, error: error.into() }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, anyhow::anyhow!("token 无效"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, format!("Something went wrong: {}", self.error)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }
}

/// 搜索错误按类型映射状态码
pub fn search_error(err: SearchError) -> AppError {
    let status = match err {
        SearchError::EmptyQuery => StatusCode::BAD_REQUEST,
        SearchError::Encoding(_) => StatusCode::BAD_GATEWAY,
        SearchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    AppError::new(status, err)
}

/// 资源错误按类型映射状态码
pub fn asset_error(err: std::io::Error) -> AppError {
    let status = match err.kind() {
        std::io::ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    AppError::new(status, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(search_error(SearchError::EmptyQuery).status, StatusCode::BAD_REQUEST);
        assert_eq!(search_error(SearchError::Encoding("oops".into())).status, StatusCode::BAD_GATEWAY);
        let response = AppError::unauthorized().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn invalid_collection_name() {
        let err = crate::assets::check_name("../../etc").unwrap_err();
        assert_eq!(asset_error(err).status, StatusCode::BAD_REQUEST);
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "资源目录不存在");
        assert_eq!(asset_error(err).status, StatusCode::NOT_FOUND);
    }
}
