use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::web::models::check_models::{CheckRequest, CheckResponse};
use crate::web::validation::{DEFAULT_CHECK_TIMEOUT_SECONDS, validate_timeout, validate_url};
use crate::web::{AppError, AppState};

pub fn create_check_router() -> Router<Arc<AppState>> {
    Router::new().route("/check", post(check_url))
}

/// Probes a URL once and returns the classified outcome without storing it.
#[axum::debug_handler]
async fn check_url(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResponse>, AppError> {
    let Json(payload) = payload?;
    let url = validate_url(&payload.url)?;
    let timeout = payload.timeout.unwrap_or(DEFAULT_CHECK_TIMEOUT_SECONDS);
    validate_timeout(timeout)?;

    let outcome = app_state
        .probe
        .check(&url, timeout.unsigned_abs())
        .await;
    info!(url = %url, kind = %outcome.kind(), "Ad-hoc check finished.");

    Ok(Json(CheckResponse::new(url, timeout, &outcome, Utc::now())))
}
