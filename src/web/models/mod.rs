pub mod check_models;
pub mod target_models;
