//! SeaORM entities for the monitoring tables.

pub mod check_result;
pub mod monitored_target;
pub mod scheduler_lease;

pub mod prelude {
    pub use super::check_result::Entity as CheckResult;
    pub use super::monitored_target::Entity as MonitoredTarget;
    pub use super::scheduler_lease::Entity as SchedulerLease;
}
