//! The `services` module wraps all database access behind small services, one
//! per table. Each service owns a cloned connection pool handle and implements
//! the matching storage trait from `crate::scheduler::store`, so the scheduler
//! and the HTTP handlers never build queries themselves.

pub mod check_result_service;
pub mod lease_service;
pub mod target_service;

pub use check_result_service::CheckResultService;
pub use lease_service::LeaseService;
pub use target_service::TargetService;
