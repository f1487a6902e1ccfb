use axum::{Router, http::Method, routing::get};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::db::services::{CheckResultService, TargetService};
use crate::monitor::probe::ProbeExecutor;
use crate::web::routes::{check_routes, health_routes, history_routes, target_routes};

pub use error::AppError;

pub mod error;
pub mod models;
pub mod routes;
pub mod validation;

#[derive(Clone)]
pub struct AppState {
    pub targets: TargetService,
    pub results: CheckResultService,
    pub probe: Arc<dyn ProbeExecutor>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, probe: Arc<dyn ProbeExecutor>) -> Self {
        Self {
            targets: TargetService::new(db.clone()),
            results: CheckResultService::new(db),
            probe,
        }
    }
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let api = Router::new()
        .merge(check_routes::create_check_router())
        .merge(history_routes::create_history_router())
        .nest("/monitored", target_routes::create_target_router());

    Router::new()
        .route("/health", get(health_routes::health_check_handler))
        .nest("/api/v1", api)
        .with_state(app_state)
        .layer(cors)
}
