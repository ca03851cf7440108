use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::error::ServiceError;
use crate::http::handlers::JsonBody;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::services::user::{Deleted, UserList};
use crate::services::{User, UserInput};

pub async fn list(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> Result<Json<UserList>, ServiceError> {
    state.users.list(&ctx).await.map(Json)
}

pub async fn get(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<String>,
) -> Result<Json<User>, ServiceError> {
    state.users.get(&id, &ctx).await.map(Json)
}

pub async fn create(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    JsonBody(input): JsonBody<UserInput>,
) -> Result<(StatusCode, Json<Value>), ServiceError> {
    let user = state.users.create(input, &ctx).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "user": user })),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UserInput>,
) -> Result<Json<Value>, ServiceError> {
    let user = state.users.update(&id, input, &ctx).await?;
    Ok(Json(json!({ "message": "User updated successfully", "user": user })))
}

pub async fn delete(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ServiceError> {
    state.users.delete(&id, &ctx).await.map(Json)
}
