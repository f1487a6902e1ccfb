pub mod db;
pub mod monitor;
pub mod scheduler;
pub mod server;
pub mod telemetry;
pub mod version;
pub mod web;
