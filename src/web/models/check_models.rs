use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::entities::check_result;
use crate::db::enums::CheckOutcomeKind;
use crate::monitor::outcome::CheckOutcome;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub url: String,
    pub timeout: Option<i32>,
}

/// Result of an ad-hoc check. Not persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub url: String,
    pub timeout_seconds: i32,
    pub outcome: CheckOutcomeKind,
    pub is_healthy: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<f64>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl CheckResponse {
    pub fn new(url: String, timeout_seconds: i32, outcome: &CheckOutcome, checked_at: DateTime<Utc>) -> Self {
        Self {
            url,
            timeout_seconds,
            outcome: outcome.kind(),
            is_healthy: outcome.is_healthy(),
            status_code: outcome.status_code(),
            response_time_ms: outcome.response_time_ms(),
            error: outcome.error_message(),
            checked_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub url: Option<String>,
    pub hours: Option<i64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryFilters {
    pub url: Option<String>,
    pub hours: i64,
    pub limit: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub count: usize,
    pub filters: HistoryFilters,
    pub checks: Vec<check_result::Model>,
}
