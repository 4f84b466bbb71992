//! Resource API endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};

use super::{json_body, path_param, success, ApiResponse, ApiResult, ListParams};
use crate::errors::AppError;
use crate::models::{CreateResourceRequest, Resource};
use crate::AppState;

/// GET /resources - List resources matching `filter`.
pub async fn list_resources(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<Resource>> {
    let params = ListParams::from_query(query)?;
    success(state.repo.list_resources(params.filter.as_deref()).await?)
}

/// GET /resources/{id} - Get a single resource.
pub async fn get_resource(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Resource> {
    let id = path_param(path)?;
    match state.repo.get_resource(id).await? {
        Some(resource) => success(resource),
        None => Err(AppError::NotFound(format!("Resource {} not found", id))),
    }
}

/// POST /resources - Create a new resource.
pub async fn create_resource(
    State(state): State<AppState>,
    body: Result<Json<CreateResourceRequest>, JsonRejection>,
) -> ApiResult<Resource> {
    let request = json_body(body)?;
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if request.resource_type.trim().is_empty() {
        return Err(AppError::Validation("resource_type is required".to_string()));
    }

    let resource = state.repo.create_resource(&request).await?;
    tracing::info!("Created resource {} ({})", resource.id, resource.name);
    Ok(ApiResponse::new(resource).with_status(StatusCode::CREATED))
}

/// DELETE /resources/{id} - Delete a resource and its grants.
pub async fn delete_resource(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let id = path_param(path)?;
    state.repo.delete_resource(id).await?;
    tracing::info!("Deleted resource {}", id);
    success(())
}
