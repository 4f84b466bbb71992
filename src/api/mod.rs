//! REST API module.
//!
//! Every success body is `{"status": "success", "data": ...}`; paginated
//! listings add a `metadata` object.

mod resources;
mod users;

pub use resources::*;
pub use users::*;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::Page;
use crate::errors::AppError;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    status_code: StatusCode,
    pub status: &'static str,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            status_code: StatusCode::OK,
            status: "success",
            data,
            metadata: None,
        }
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = status_code;
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

/// Pagination metadata of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total_count: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(current_page: u32, per_page: u32, total_count: i64) -> Self {
        let per = i64::from(per_page.max(1));
        Self {
            current_page,
            per_page,
            total_count,
            total_pages: (total_count + per - 1) / per,
        }
    }
}

/// `page` / `per_page` query parameters, plus the optional filter expression.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub filter: Option<String>,
}

impl ListParams {
    /// Unwrap the extractor, turning malformed query strings into a 400 envelope.
    pub fn from_query(query: Result<Query<ListParams>, QueryRejection>) -> Result<Self, AppError> {
        query
            .map(|Query(params)| params)
            .map_err(|rejection| AppError::Validation(rejection.body_text()))
    }

    /// Validated `(page, per_page)`.
    pub fn page(&self) -> Result<(u32, u32), AppError> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);

        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(AppError::Validation(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
        Ok((page, per_page))
    }
}

/// Unwrap a path extractor into the error envelope on failure.
pub fn path_param<T>(path: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    path.map(|Path(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Unwrap a JSON body extractor into the error envelope on failure.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Create a paginated API response.
pub fn paginated<T: Serialize>(page: Page<T>, current_page: u32, per_page: u32) -> ApiResult<Vec<T>> {
    let mut response = ApiResponse::new(page.items);
    response.metadata = Some(Pagination::new(current_page, per_page, page.total_count));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
        assert_eq!(Pagination::new(2, 10, 11).total_pages, 2);
        assert_eq!(Pagination::new(1, 100, 250).total_pages, 3);
    }

    #[test]
    fn test_page_defaults_and_bounds() {
        assert_eq!(ListParams::default().page().unwrap(), (1, 10));

        let params = ListParams {
            page: Some(0),
            ..Default::default()
        };
        assert!(matches!(params.page(), Err(AppError::Validation(_))));

        let params = ListParams {
            per_page: Some(MAX_PER_PAGE + 1),
            ..Default::default()
        };
        assert!(matches!(params.page(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::new(vec![1, 2])).unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"], serde_json::json!([1, 2]));
        assert!(body.get("metadata").is_none());
    }
}
