//! User API endpoints.

use axum::extract::{
    rejection::{PathRejection, QueryRejection},
    Path, Query, State,
};

use super::{paginated, path_param, success, ApiResult, ListParams};
use crate::errors::AppError;
use crate::models::{Resource, User};
use crate::AppState;

/// GET /active-users - One page of active users.
pub async fn active_users(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<User>> {
    let params = ListParams::from_query(query)?;
    let (page, per_page) = params.page()?;

    let users = state.repo.get_active_users_paginated(page, per_page).await?;
    paginated(users, page, per_page)
}

/// GET /users - One page of users matching `filter`.
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Vec<User>> {
    let params = ListParams::from_query(query)?;
    let (page, per_page) = params.page()?;

    let users = state
        .repo
        .get_users_paginated(params.filter.as_deref(), page, per_page)
        .await?;
    paginated(users, page, per_page)
}

/// GET /users/{id} - Get a single user.
pub async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<User> {
    let id = path_param(path)?;
    match state.repo.get_user(id).await? {
        Some(user) => success(user),
        None => Err(AppError::NotFound(format!("User {} not found", id))),
    }
}

/// GET /users/{id}/resources - Resources granted to a user.
pub async fn list_user_resources(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Vec<Resource>> {
    let id = path_param(path)?;
    success(state.repo.list_user_resources(id).await?)
}

/// PUT /users/{id}/resources/{resource_id} - Grant a resource.
pub async fn assign_resource(
    State(state): State<AppState>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> ApiResult<()> {
    let (id, resource_id) = path_param(path)?;
    state.repo.assign_resource(id, resource_id).await?;
    tracing::debug!("Assigned resource {} to user {}", resource_id, id);
    success(())
}

/// DELETE /users/{id}/resources/{resource_id} - Revoke a resource.
pub async fn unassign_resource(
    State(state): State<AppState>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> ApiResult<()> {
    let (id, resource_id) = path_param(path)?;
    state.repo.unassign_resource(id, resource_id).await?;
    tracing::debug!("Revoked resource {} from user {}", resource_id, id);
    success(())
}
