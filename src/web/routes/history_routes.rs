use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::web::models::check_models::{HistoryFilters, HistoryQuery, HistoryResponse};
use crate::web::{AppError, AppState};

const DEFAULT_HOURS: i64 = 24;
const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 1000;

pub fn create_history_router() -> Router<Arc<AppState>> {
    Router::new().route("/history", get(get_history))
}

#[axum::debug_handler]
async fn get_history(
    State(app_state): State<Arc<AppState>>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    let Query(query) = query?;
    let url = query.url.filter(|u| !u.is_empty());
    let hours = query.hours.unwrap_or(DEFAULT_HOURS);
    if hours < 0 {
        return Err(AppError::InvalidInput(
            "hours must not be negative".to_string(),
        ));
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let since = Duration::try_hours(hours)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| AppError::InvalidInput("hours is out of range".to_string()))?;

    let checks = app_state
        .results
        .list_history(url.as_deref(), since, limit)
        .await?;

    Ok(Json(HistoryResponse {
        count: checks.len(),
        filters: HistoryFilters { url, hours, limit },
        checks,
    }))
}
