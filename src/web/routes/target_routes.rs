use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::web::models::target_models::{CreateTarget, TargetDetails, TargetMutation, UpdateTarget};
use crate::web::validation::{validate_check_interval, validate_timeout, validate_url};
use crate::web::{AppError, AppState};

pub fn create_target_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/urls", get(list_targets).post(create_target))
        .route(
            "/urls/{id}",
            get(get_target).put(update_target).delete(delete_target),
        )
}

fn not_found() -> AppError {
    AppError::NotFound("Monitored URL not found".to_string())
}

#[axum::debug_handler]
async fn list_targets(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<TargetDetails>>, AppError> {
    let targets = app_state.targets.list_targets().await?;
    Ok(Json(targets.into_iter().map(TargetDetails::from).collect()))
}

#[axum::debug_handler]
async fn create_target(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<CreateTarget>, JsonRejection>,
) -> Result<(StatusCode, Json<TargetMutation>), AppError> {
    let Json(mut payload) = payload?;
    payload.url = validate_url(&payload.url)?;
    validate_check_interval(payload.check_interval)?;
    validate_timeout(payload.timeout)?;

    let created = app_state
        .targets
        .create_target(payload)
        .await
        .map_err(|e| AppError::from_insert(e, "URL already exists in monitoring"))?;

    Ok((
        StatusCode::CREATED,
        Json(TargetMutation {
            message: format!("URL {} added to monitoring", created.url),
            monitored: created.into(),
        }),
    ))
}

#[axum::debug_handler]
async fn get_target(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<TargetDetails>, AppError> {
    let target = app_state
        .targets
        .get_target(id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(target.into()))
}

#[axum::debug_handler]
async fn update_target(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateTarget>, JsonRejection>,
) -> Result<Json<TargetMutation>, AppError> {
    let Json(payload) = payload?;
    if payload.url.is_some() {
        return Err(AppError::InvalidInput(
            "Cannot update URL. Delete and re-add instead.".to_string(),
        ));
    }
    if payload.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one field must be updated".to_string(),
        ));
    }
    if let Some(interval) = payload.check_interval {
        validate_check_interval(interval)?;
    }
    if let Some(timeout) = payload.timeout {
        validate_timeout(timeout)?;
    }

    let updated = app_state
        .targets
        .update_target(id, payload)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(TargetMutation {
        message: format!("Monitored URL {} updated", updated.url),
        monitored: updated.into(),
    }))
}

#[axum::debug_handler]
async fn delete_target(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    if !app_state.targets.delete_target(id).await? {
        return Err(not_found());
    }
    Ok(Json(json!({ "message": "URL removed from monitoring" })))
}
