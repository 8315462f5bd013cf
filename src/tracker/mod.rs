mod store;

pub use store::StatusStore;

use crate::error::{AppError, Result};
use crate::models::{Action, FailureKind, OperationKey, OperationRecord, Outcome};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

pub const INTERRUPTED_BY_RESTART: &str = "interrupted by restart";
const LEASE_DROPPED: &str = "lease dropped before release";

type RecordMap = BTreeMap<OperationKey, OperationRecord>;

fn find_running<'a>(
    records: &'a RecordMap,
    resource_group_id: &str,
    scope: Option<&str>,
) -> Option<&'a OperationKey> {
    records
        .iter()
        .find(|(key, record)| key.matches(resource_group_id, scope) && record.is_running())
        .map(|(key, _)| key)
}

#[derive(Clone)]
pub struct StatusTracker {
    inner: Arc<Inner>,
}

struct Inner {
    records: Mutex<RecordMap>,
    store: Option<StatusStore>,
}

impl Inner {
    fn persist_locked(&self, records: &RecordMap) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(records.values()) {
            tracing::error!(
                error = %e,
                path = %store.path().display(),
                "Failed to persist running status map",
            );
        }
    }
}

impl StatusTracker {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                records: Mutex::new(BTreeMap::new()),
                store: None,
            }),
        }
    }

    /// Loads the persisted map and reconciles orphaned `Running` records to
    /// `Failed` before anyone can observe them.
    pub fn load(store: StatusStore) -> Result<Self> {
        let mut records = BTreeMap::new();
        let mut reconciled = 0usize;

        for mut record in store.load()? {
            if record.is_running() {
                tracing::warn!(
                    key = %record.key(),
                    "Reconciling operation left running by a previous process",
                );
                record.finish(Outcome::failed(
                    FailureKind::Interrupted,
                    INTERRUPTED_BY_RESTART,
                ));
                reconciled += 1;
            }
            records.insert(record.key(), record);
        }

        tracing::info!(
            records = records.len(),
            reconciled,
            path = %store.path().display(),
            "Loaded running status map",
        );

        let tracker = Self {
            inner: Arc::new(Inner {
                records: Mutex::new(records),
                store: Some(store),
            }),
        };
        if reconciled > 0 {
            tracker.persist()?;
        }
        Ok(tracker)
    }

    /// Claims (resource group, scope) for `action`. Never waits: a live run
    /// on the same pair fails with `OperationInProgress`.
    pub fn acquire(&self, resource_group_id: &str, scope: &str, action: Action) -> Result<Lease> {
        let key = OperationKey::new(resource_group_id, scope, action);
        let lease_id = Uuid::new_v4();

        let mut records = self.inner.records.lock();
        if let Some(running) = find_running(&records, resource_group_id, Some(scope)) {
            return Err(AppError::OperationInProgress {
                resource_group_id: resource_group_id.to_string(),
                scope: scope.to_string(),
                action: running.action,
            });
        }

        let previous = records.insert(key.clone(), OperationRecord::running(&key, lease_id));
        self.inner.persist_locked(&records);
        drop(records);

        tracing::debug!(key = %key, lease = %lease_id, "Lease acquired");
        Ok(Lease {
            tracker: self.clone(),
            key,
            lease_id,
            previous,
            settled: false,
        })
    }

    fn finish(&self, key: &OperationKey, lease_id: Uuid, outcome: Outcome) {
        let mut records = self.inner.records.lock();
        let Some(record) = records.get_mut(key) else {
            tracing::warn!(key = %key, "Released lease has no record");
            return;
        };
        if record.lease_id != Some(lease_id) {
            tracing::warn!(key = %key, lease = %lease_id, "Released lease no longer owns its record");
            return;
        }
        record.finish(outcome);
        tracing::debug!(key = %key, status = ?record.status, "Lease released");
        self.inner.persist_locked(&records);
    }

    fn restore(&self, key: &OperationKey, lease_id: Uuid, previous: Option<OperationRecord>) {
        let mut records = self.inner.records.lock();
        if records.get(key).and_then(|r| r.lease_id) != Some(lease_id) {
            return;
        }
        match previous {
            Some(previous) => {
                records.insert(key.clone(), previous);
            }
            None => {
                records.remove(key);
            }
        }
        self.inner.persist_locked(&records);
    }

    pub fn snapshot(&self, resource_group_id: &str, scope: Option<&str>) -> Vec<OperationRecord> {
        self.inner
            .records
            .lock()
            .iter()
            .filter(|(key, _)| key.matches(resource_group_id, scope))
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Runs `f` while holding the map lock, provided nothing is running on
    /// (resource group, scope). No lease can be acquired on the pair until
    /// `f` returns.
    pub fn unless_running<T>(
        &self,
        resource_group_id: &str,
        scope: &str,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let records = self.inner.records.lock();
        if let Some(running) = find_running(&records, resource_group_id, Some(scope)) {
            return Err(AppError::OperationInProgress {
                resource_group_id: resource_group_id.to_string(),
                scope: scope.to_string(),
                action: running.action,
            });
        }
        f()
    }

    /// Runs `f` while holding the map lock, provided nothing is running on
    /// the given resource group (or scope). On success the matching records
    /// are dropped, since the workspace they describe no longer exists.
    pub fn clear_with<T>(
        &self,
        resource_group_id: &str,
        scope: Option<&str>,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let mut records = self.inner.records.lock();
        if let Some(key) = find_running(&records, resource_group_id, scope) {
            return Err(AppError::WorkspaceInUse(format!("{} is running", key)));
        }

        let value = f()?;

        let before = records.len();
        records.retain(|key, _| !key.matches(resource_group_id, scope));
        if records.len() != before {
            self.inner.persist_locked(&records);
        }
        Ok(value)
    }

    pub fn persist(&self) -> Result<()> {
        let records = self.inner.records.lock();
        if let Some(store) = &self.inner.store {
            store.save(records.values())?;
        }
        Ok(())
    }
}

/// Exclusive right to run one action on one (resource group, scope).
///
/// Settled exactly once: by [`Lease::release`], by [`Lease::abort`], or by
/// drop, which records the operation as abandoned.
#[must_use = "a lease must be released or aborted"]
pub struct Lease {
    tracker: StatusTracker,
    key: OperationKey,
    lease_id: Uuid,
    previous: Option<OperationRecord>,
    settled: bool,
}

impl Lease {
    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    pub fn release(mut self, outcome: Outcome) {
        self.settled = true;
        self.tracker.finish(&self.key, self.lease_id, outcome);
    }

    /// Gives the key back without recording a run; the previous record, if
    /// any, becomes visible again.
    pub fn abort(mut self) {
        self.settled = true;
        let previous = self.previous.take();
        self.tracker.restore(&self.key, self.lease_id, previous);
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::warn!(key = %self.key, "Lease dropped without release");
        self.tracker.finish(
            &self.key,
            self.lease_id,
            Outcome::failed(FailureKind::Abandoned, LEASE_DROPPED),
        );
    }
}
