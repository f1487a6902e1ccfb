use chrono::{DateTime, Duration, Utc};
use sea_orm::DbErr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::store::LeaseStore;

/// A held lease on one target. Call [`LeaseGuard::release`] when done; if the
/// guard is dropped without it (panic, cancelled future) the release is
/// spawned onto the current runtime instead.
pub struct LeaseGuard {
    store: Arc<dyn LeaseStore>,
    target_id: i32,
    holder_id: String,
    released: bool,
}

impl LeaseGuard {
    /// `Ok(None)` means another holder owns a live lease.
    pub async fn acquire(
        store: Arc<dyn LeaseStore>,
        target_id: i32,
        holder_id: &str,
        lease_duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, DbErr> {
        if !store
            .try_acquire(target_id, holder_id, lease_duration, now)
            .await?
        {
            return Ok(None);
        }
        Ok(Some(Self {
            store,
            target_id,
            holder_id: holder_id.to_string(),
            released: false,
        }))
    }

    /// Errors are logged, not returned: the lease expires on its own.
    pub async fn release(mut self) {
        self.released = true;
        match self.store.release(self.target_id, &self.holder_id).await {
            Ok(true) => debug!(target_id = self.target_id, "Lease released."),
            Ok(false) => warn!(
                target_id = self.target_id,
                holder = %self.holder_id,
                "Lease was already gone or reclaimed by another scheduler."
            ),
            Err(e) => warn!(
                target_id = self.target_id,
                error = %e,
                "Failed to release lease; it will expire on its own."
            ),
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                target_id = self.target_id,
                "Lease dropped outside a runtime; leaving it to expire."
            );
            return;
        };
        let store = self.store.clone();
        let target_id = self.target_id;
        let holder_id = std::mem::take(&mut self.holder_id);
        warn!(target_id, "Lease dropped without release; releasing in background.");
        handle.spawn(async move {
            if let Err(e) = store.release(target_id, &holder_id).await {
                warn!(target_id, error = %e, "Background lease release failed.");
            }
        });
    }
}
