//! The poll loop: select due targets, claim, probe, record, reschedule, release.

use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt, stream};
use sea_orm::DbErr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::backoff::{BackoffPolicy, is_due};
use super::lease::LeaseGuard;
use super::store::{CheckRecord, LeaseStore, ResultSink, TargetRepository};
use crate::db::entities::monitored_target;
use crate::monitor::probe::ProbeExecutor;
use crate::server::config::SchedulerConfig;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub scheduler_id: String,
    pub batch_size: u64,
    pub lock_timeout: chrono::Duration,
    pub loop_interval: Duration,
    pub max_concurrency: usize,
    pub backoff: BackoffPolicy,
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            scheduler_id: config.scheduler_id.clone(),
            batch_size: config.batch_size,
            lock_timeout: config.lock_timeout(),
            loop_interval: config.loop_interval(),
            max_concurrency: config.max_concurrency,
            backoff: config.backoff_policy(),
        }
    }
}

/// What happened to one selected target in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDisposition {
    Checked { healthy: bool },
    /// The lease could not be taken: another scheduler holds it, or the
    /// target row is gone.
    Skipped,
    /// Deleted, deactivated or already rescheduled by the time the lease was won.
    NotDue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub selected: usize,
    pub checked: usize,
    pub healthy: usize,
    pub skipped: usize,
    pub not_due: usize,
    pub failed: usize,
}

impl CycleReport {
    fn record(&mut self, disposition: Option<TargetDisposition>) {
        match disposition {
            Some(TargetDisposition::Checked { healthy }) => {
                self.checked += 1;
                if healthy {
                    self.healthy += 1;
                }
            }
            Some(TargetDisposition::Skipped) => self.skipped += 1,
            Some(TargetDisposition::NotDue) => self.not_due += 1,
            None => self.failed += 1,
        }
    }
}

pub struct Scheduler {
    settings: SchedulerSettings,
    targets: Arc<dyn TargetRepository>,
    leases: Arc<dyn LeaseStore>,
    results: Arc<dyn ResultSink>,
    probe: Arc<dyn ProbeExecutor>,
    clock: Clock,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        targets: Arc<dyn TargetRepository>,
        leases: Arc<dyn LeaseStore>,
        results: Arc<dyn ResultSink>,
        probe: Arc<dyn ProbeExecutor>,
    ) -> Self {
        Self {
            settings,
            targets,
            leases,
            results,
            probe,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn scheduler_id(&self) -> &str {
        &self.settings.scheduler_id
    }

    /// Runs cycles until `shutdown` flips to true (or its sender goes away).
    /// A cycle in flight always completes, releasing its leases, before exit.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            scheduler_id = %self.settings.scheduler_id,
            batch_size = self.settings.batch_size,
            loop_interval_seconds = self.settings.loop_interval.as_secs(),
            "Scheduler started."
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(report) => info!(
                    selected = report.selected,
                    checked = report.checked,
                    healthy = report.healthy,
                    skipped = report.skipped,
                    not_due = report.not_due,
                    failed = report.failed,
                    "Cycle finished."
                ),
                Err(e) => error!(error = %e, "Cycle aborted while selecting due targets."),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.loop_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(scheduler_id = %self.settings.scheduler_id, "Scheduler stopped.");
    }

    /// One pass over at most `batch_size` due targets. Only a failure to
    /// select is returned as an error; per-target failures are counted.
    pub async fn run_cycle(&self) -> Result<CycleReport, SchedulerError> {
        let now = (self.clock)();
        let due = self
            .targets
            .select_due(self.settings.batch_size, now)
            .await?;

        let mut report = CycleReport {
            selected: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            debug!("No targets due.");
            return Ok(report);
        }

        let dispositions: Vec<Option<TargetDisposition>> = stream::iter(due)
            .map(|target| self.process_isolated(target, now))
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        for disposition in dispositions {
            report.record(disposition);
        }
        Ok(report)
    }

    async fn process_isolated(
        &self,
        target: monitored_target::Model,
        cycle_now: DateTime<Utc>,
    ) -> Option<TargetDisposition> {
        let target_id = target.id;
        let url = target.url.clone();
        match AssertUnwindSafe(self.process_target(target, cycle_now))
            .catch_unwind()
            .await
        {
            Ok(Ok(disposition)) => Some(disposition),
            Ok(Err(e)) => {
                error!(target_id, url = %url, error = %e, "Failed to process target.");
                None
            }
            Err(_) => {
                error!(target_id, url = %url, "Processing target panicked.");
                None
            }
        }
    }

    /// Lease, then probe, then history, then schedule, then release. The
    /// release runs on every path out of the leased section.
    pub async fn process_target(
        &self,
        target: monitored_target::Model,
        cycle_now: DateTime<Utc>,
    ) -> Result<TargetDisposition, SchedulerError> {
        let lease = LeaseGuard::acquire(
            self.leases.clone(),
            target.id,
            &self.settings.scheduler_id,
            self.settings.lock_timeout,
            (self.clock)(),
        )
        .await?;
        let Some(lease) = lease else {
            debug!(target_id = target.id, "Lease not acquired; skipping.");
            return Ok(TargetDisposition::Skipped);
        };

        let result = self.check_under_lease(target.id, cycle_now).await;
        lease.release().await;
        result
    }

    async fn check_under_lease(
        &self,
        target_id: i32,
        cycle_now: DateTime<Utc>,
    ) -> Result<TargetDisposition, SchedulerError> {
        // The selection snapshot may be stale; trust only what we read under the lease.
        let Some(target) = self.targets.find(target_id).await? else {
            return Ok(TargetDisposition::NotDue);
        };
        if !is_due(&target, cycle_now) {
            debug!(target_id, "Target no longer due; another scheduler got there first.");
            return Ok(TargetDisposition::NotDue);
        }

        info!(target_id, url = %target.url, "Checking target.");
        let timeout_seconds = u32::try_from(target.timeout_seconds).unwrap_or(0);
        let outcome = self.probe.check(&target.url, timeout_seconds).await;
        let finished_at = (self.clock)();
        let healthy = outcome.is_healthy();

        self.results
            .append(CheckRecord {
                target_url: target.url.clone(),
                timeout_seconds: target.timeout_seconds,
                outcome: outcome.clone(),
                observed_at: finished_at,
            })
            .await?;

        let update = self
            .settings
            .backoff
            .next_schedule(&target, healthy, finished_at);
        if !self.targets.record_schedule(target_id, &update).await? {
            warn!(target_id, "Target was deleted before its schedule could be updated.");
        }

        if healthy {
            debug!(target_id, next_check_at = %update.next_check_at, "Target healthy.");
        } else {
            warn!(
                target_id,
                url = %target.url,
                kind = %outcome.kind(),
                consecutive_failures = update.consecutive_failures,
                next_check_at = %update.next_check_at,
                "Target unhealthy; backing off."
            );
        }

        Ok(TargetDisposition::Checked { healthy })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::services::{CheckResultService, LeaseService, TargetService};
    use crate::db::test_support::{at, insert_target, memory_db};
    use crate::monitor::outcome::CheckOutcome;
    use crate::scheduler::backoff::ScheduleUpdate;
    use async_trait::async_trait;
    use sea_orm::{DatabaseConnection, EntityTrait};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    use crate::db::entities::prelude::CheckResult;

    #[derive(Default)]
    struct ScriptedProbe {
        unhealthy: HashSet<String>,
        panics: bool,
        /// When set, each check parks until the gate is notified.
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn failing(url: &str) -> Self {
            Self {
                unhealthy: HashSet::from([url.to_string()]),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProbeExecutor for ScriptedProbe {
        async fn check(&self, url: &str, _timeout_seconds: u32) -> CheckOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panics {
                panic!("probe blew up");
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            tokio::task::yield_now().await;
            if self.unhealthy.contains(url) {
                CheckOutcome::from_status(503, 4.0)
            } else {
                CheckOutcome::from_status(200, 4.0)
            }
        }
    }

    /// Schedule writes always fail.
    struct BrokenSchedule(TargetService);

    #[async_trait]
    impl TargetRepository for BrokenSchedule {
        async fn select_due(
            &self,
            limit: u64,
            now: DateTime<Utc>,
        ) -> Result<Vec<monitored_target::Model>, DbErr> {
            self.0.select_due(limit, now).await
        }

        async fn find(&self, target_id: i32) -> Result<Option<monitored_target::Model>, DbErr> {
            self.0.find(target_id).await
        }

        async fn record_schedule(&self, _: i32, _: &ScheduleUpdate) -> Result<bool, DbErr> {
            Err(DbErr::Custom("disk full".to_string()))
        }
    }

    struct BrokenSelect;

    #[async_trait]
    impl TargetRepository for BrokenSelect {
        async fn select_due(
            &self,
            _: u64,
            _: DateTime<Utc>,
        ) -> Result<Vec<monitored_target::Model>, DbErr> {
            Err(DbErr::Custom("connection reset".to_string()))
        }

        async fn find(&self, _: i32) -> Result<Option<monitored_target::Model>, DbErr> {
            Ok(None)
        }

        async fn record_schedule(&self, _: i32, _: &ScheduleUpdate) -> Result<bool, DbErr> {
            Ok(false)
        }
    }

    fn settings(scheduler_id: &str) -> SchedulerSettings {
        SchedulerSettings {
            scheduler_id: scheduler_id.to_string(),
            batch_size: 10,
            lock_timeout: chrono::Duration::seconds(60),
            loop_interval: Duration::from_secs(3600),
            max_concurrency: 4,
            backoff: BackoffPolicy::default(),
        }
    }

    fn scheduler_with(
        db: &DatabaseConnection,
        scheduler_id: &str,
        targets: Arc<dyn TargetRepository>,
        probe: Arc<ScriptedProbe>,
    ) -> Scheduler {
        Scheduler::new(
            settings(scheduler_id),
            targets,
            Arc::new(LeaseService::new(db.clone())),
            Arc::new(CheckResultService::new(db.clone())),
            probe,
        )
        .with_clock(Arc::new(|| at(100)))
    }

    fn scheduler(db: &DatabaseConnection, scheduler_id: &str, probe: Arc<ScriptedProbe>) -> Scheduler {
        let targets = Arc::new(TargetService::new(db.clone()));
        scheduler_with(db, scheduler_id, targets, probe)
    }

    async fn reload(db: &DatabaseConnection, id: i32) -> monitored_target::Model {
        TargetService::new(db.clone())
            .find(id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_healthy_check_resets_failures_and_waits_one_interval() {
        let db = memory_db().await;
        let target = insert_target(&db, "https://ok.example", 60, None).await;
        let probe = Arc::new(ScriptedProbe::default());
        let scheduler = scheduler(&db, "scheduler-a", probe.clone());

        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.selected, 1);
        assert_eq!(report.checked, 1);
        assert_eq!(report.healthy, 1);
        let stored = reload(&db, target.id).await;
        assert_eq!(stored.consecutive_failures, 0);
        assert_eq!(stored.last_checked_at, Some(at(100)));
        assert_eq!(
            stored.next_check_at,
            Some(at(100) + chrono::Duration::seconds(60))
        );
        assert!(LeaseService::new(db.clone())
            .current(target.id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(CheckResult::find().all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unhealthy_check_backs_off() {
        let db = memory_db().await;
        let target = insert_target(&db, "https://down.example", 60, None).await;
        let probe = Arc::new(ScriptedProbe::failing("https://down.example"));
        let scheduler = scheduler(&db, "scheduler-a", probe);

        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.checked, 1);
        assert_eq!(report.healthy, 0);
        let stored = reload(&db, target.id).await;
        assert_eq!(stored.consecutive_failures, 1);
        assert_eq!(
            stored.next_check_at,
            Some(at(100) + chrono::Duration::seconds(120))
        );
        let results = CheckResult::find().all(&db).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_healthy);
        assert_eq!(results[0].status_code, Some(503));
    }

    #[tokio::test]
    async fn test_cycle_is_capped_at_batch_size() {
        let db = memory_db().await;
        for i in 0..25 {
            insert_target(&db, &format!("https://t{i}.example"), 60, None).await;
        }
        let probe = Arc::new(ScriptedProbe::default());
        let scheduler = scheduler(&db, "scheduler-a", probe.clone());

        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.selected, 10);
        assert_eq!(report.checked, 10);
        assert_eq!(probe.calls(), 10);
        let still_due = TargetService::new(db.clone())
            .select_due(100, at(100))
            .await
            .unwrap();
        assert_eq!(still_due.len(), 15);
    }

    #[tokio::test]
    async fn test_two_schedulers_check_a_target_once() {
        let db = memory_db().await;
        let target = insert_target(&db, "https://shared.example", 60, None).await;
        let probe = Arc::new(ScriptedProbe::default());
        let a = scheduler(&db, "scheduler-a", probe.clone());
        let b = scheduler(&db, "scheduler-b", probe.clone());

        let (ra, rb) = tokio::join!(a.run_cycle(), b.run_cycle());
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert_eq!(probe.calls(), 1);
        assert_eq!(ra.checked + rb.checked, 1);
        assert_eq!(ra.skipped + ra.not_due + rb.skipped + rb.not_due, 1);
        assert_eq!(CheckResult::find().all(&db).await.unwrap().len(), 1);
        assert_eq!(reload(&db, target.id).await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_not_processed_twice() {
        let db = memory_db().await;
        let target = insert_target(&db, "https://shared.example", 60, None).await;
        let probe = Arc::new(ScriptedProbe::default());
        let a = scheduler(&db, "scheduler-a", probe.clone());
        let b = scheduler(&db, "scheduler-b", probe.clone());

        assert_eq!(
            a.process_target(target.clone(), at(100)).await.unwrap(),
            TargetDisposition::Checked { healthy: true }
        );
        assert_eq!(
            b.process_target(target, at(100)).await.unwrap(),
            TargetDisposition::NotDue
        );
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_live_foreign_lease_skips_target() {
        let db = memory_db().await;
        let target = insert_target(&db, "https://held.example", 60, None).await;
        LeaseService::new(db.clone())
            .try_acquire(target.id, "scheduler-z", chrono::Duration::seconds(60), at(90))
            .await
            .unwrap();
        let probe = Arc::new(ScriptedProbe::default());
        let scheduler = scheduler(&db, "scheduler-a", probe.clone());

        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(probe.calls(), 0);
        let lease = LeaseService::new(db.clone())
            .current(target.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lease.holder_id, "scheduler-z");
    }

    #[tokio::test]
    async fn test_deleted_or_paused_target_is_not_probed() {
        let db = memory_db().await;
        let gone = insert_target(&db, "https://gone.example", 60, None).await;
        let paused = insert_target(&db, "https://paused.example", 60, None).await;
        let service = TargetService::new(db.clone());
        service.delete_target(gone.id).await.unwrap();
        service
            .update_target(
                paused.id,
                crate::web::models::target_models::UpdateTarget {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let probe = Arc::new(ScriptedProbe::default());
        let scheduler = scheduler(&db, "scheduler-a", probe.clone());

        // No row to hang a lease on.
        assert_eq!(
            scheduler.process_target(gone, at(100)).await.unwrap(),
            TargetDisposition::Skipped
        );
        assert_eq!(
            scheduler.process_target(paused.clone(), at(100)).await.unwrap(),
            TargetDisposition::NotDue
        );
        assert_eq!(probe.calls(), 0);
        assert!(LeaseService::new(db.clone())
            .current(paused.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_lease_released_when_schedule_write_fails() {
        let db = memory_db().await;
        let target = insert_target(&db, "https://a.example", 60, None).await;
        let probe = Arc::new(ScriptedProbe::default());
        let targets = Arc::new(BrokenSchedule(TargetService::new(db.clone())));
        let scheduler = scheduler_with(&db, "scheduler-a", targets, probe);

        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.checked, 0);
        assert!(LeaseService::new(db.clone())
            .current(target.id)
            .await
            .unwrap()
            .is_none());
        // The result was appended before the schedule write failed.
        assert_eq!(CheckResult::find().all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_select_failure_aborts_cycle() {
        let db = memory_db().await;
        let probe = Arc::new(ScriptedProbe::default());
        let scheduler = scheduler_with(&db, "scheduler-a", Arc::new(BrokenSelect), probe.clone());

        let err = scheduler.run_cycle().await.unwrap_err();

        assert!(matches!(err, SchedulerError::Database(_)));
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_isolated_and_lease_released() {
        let db = memory_db().await;
        let target = insert_target(&db, "https://a.example", 60, None).await;
        let probe = Arc::new(ScriptedProbe {
            panics: true,
            ..Default::default()
        });
        let scheduler = scheduler(&db, "scheduler-a", probe);

        let report = scheduler.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1);

        let leases = LeaseService::new(db.clone());
        let mut released = false;
        for _ in 0..50 {
            if leases.current(target.id).await.unwrap().is_none() {
                released = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(released, "lease should be released in the background");
        assert_eq!(reload(&db, target.id).await.next_check_at, None);
    }

    #[tokio::test]
    async fn test_shutdown_lets_in_flight_cycle_finish() {
        let db = memory_db().await;
        let target = insert_target(&db, "https://a.example", 60, None).await;
        let gate = Arc::new(Notify::new());
        let probe = Arc::new(ScriptedProbe {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let scheduler = scheduler(&db, "scheduler-a", probe.clone());
        let (tx, rx) = watch::channel(false);

        let stop = async {
            while probe.calls() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            // Shutdown arrives while the probe is still running.
            tx.send(true).unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            gate.notify_one();
        };

        tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(scheduler.run(rx), stop);
        })
        .await
        .expect("scheduler did not stop");

        assert_eq!(probe.calls(), 1);
        let leases = LeaseService::new(db.clone());
        assert!(leases.current(target.id).await.unwrap().is_none());
        let reloaded = reload(&db, target.id).await;
        assert!(reloaded.next_check_at.is_some());
        assert!(reloaded.last_checked_at.is_some());
        assert_eq!(CheckResult::find().all(&db).await.unwrap().len(), 1);
    }
}
