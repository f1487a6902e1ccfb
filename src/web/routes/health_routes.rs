use axum::Json;
use chrono::Utc;
use serde_json::{Value, json};

use crate::version::{SERVICE_NAME, VERSION};

pub async fn health_check_handler() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": VERSION,
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
