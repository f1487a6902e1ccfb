//! Distributed poll scheduler: picks due targets, claims each through a
//! lease, probes it and reschedules it with backoff.

pub mod backoff;
pub mod lease;
pub mod runner;
pub mod store;

pub use backoff::BackoffPolicy;
pub use runner::{CycleReport, Scheduler, SchedulerError, SchedulerSettings, TargetDisposition};
