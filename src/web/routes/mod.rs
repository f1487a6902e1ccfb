pub mod check_routes;
pub mod health_routes;
pub mod history_routes;
pub mod target_routes;
