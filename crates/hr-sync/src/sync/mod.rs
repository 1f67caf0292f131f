//! Record-level sync engine with per-record failure isolation.
//!
//! Each record runs in its own target transaction. A failed record is
//! rolled back, reported, and skipped; the run never aborts because of
//! a record. Continue-on-error is an explicit state transition into
//! [`SyncOutcome`], not exception unwinding.

use crate::error::{Result, SyncError};
use crate::normalize::EmployeeRecord;
use crate::target::TargetStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Terminal state of one record's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Committed,
    RolledBack,
}

/// Per-record result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub employee_id: i64,
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrent upsert workers. 1 is the sequential baseline: one
    /// connection, records in buffer order.
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

/// Sync engine: folds records into outcomes over a target store.
pub struct SyncEngine<T: TargetStore> {
    target: Arc<T>,
    config: EngineConfig,
}

impl<T: TargetStore + 'static> SyncEngine<T> {
    /// Create a new engine over a connected target store.
    pub fn new(target: T, config: EngineConfig) -> Self {
        Self {
            target: Arc::new(target),
            config,
        }
    }

    /// Upsert every record, one isolated transaction each.
    ///
    /// Returns one outcome per record. No retry: a failed record is
    /// reported and skipped.
    pub async fn sync(&self, records: Vec<EmployeeRecord>) -> Result<Vec<SyncOutcome>> {
        info!(
            "Syncing {} records (workers: {})",
            records.len(),
            self.config.workers
        );

        if self.config.workers > 1 {
            self.sync_parallel(records).await
        } else {
            Ok(self.sync_sequential(records).await)
        }
    }

    /// Sequential baseline: records in buffer order on one connection.
    async fn sync_sequential(&self, records: Vec<EmployeeRecord>) -> Vec<SyncOutcome> {
        let mut outcomes = Vec::with_capacity(records.len());
        for record in &records {
            outcomes.push(sync_record(self.target.as_ref(), record).await);
        }
        outcomes
    }

    /// Worker-pool extension: records distribute freely because keys
    /// are disjoint and each merge is atomic per key. Outcomes come
    /// back without cross-record ordering guarantees.
    async fn sync_parallel(&self, records: Vec<EmployeeRecord>) -> Result<Vec<SyncOutcome>> {
        let (tx, rx) = async_channel::bounded::<EmployeeRecord>(self.config.workers * 2);

        let mut handles = Vec::with_capacity(self.config.workers);
        for _ in 0..self.config.workers {
            let rx = rx.clone();
            let target = Arc::clone(&self.target);
            handles.push(tokio::spawn(async move {
                let mut outcomes = Vec::new();
                while let Ok(record) = rx.recv().await {
                    outcomes.push(sync_record(target.as_ref(), &record).await);
                }
                outcomes
            }));
        }
        drop(rx);

        for record in records {
            if tx.send(record).await.is_err() {
                break;
            }
        }
        drop(tx);

        let mut outcomes = Vec::new();
        for handle in handles {
            let worker_outcomes = handle
                .await
                .map_err(|e| SyncError::pool(e.to_string(), "joining sync worker"))?;
            outcomes.extend(worker_outcomes);
        }
        Ok(outcomes)
    }
}

/// One record's state machine: begin, merge, commit or roll back.
async fn sync_record<T: TargetStore + ?Sized>(target: &T, record: &EmployeeRecord) -> SyncOutcome {
    info!("Upserting employee_id={}", record.employee_id);

    match target.upsert(record).await {
        Ok(()) => {
            info!("employee_id={}: committed", record.employee_id);
            SyncOutcome {
                employee_id: record.employee_id,
                status: SyncStatus::Committed,
                error: None,
            }
        }
        Err(e) => {
            warn!("employee_id={}: rolled back: {}", record.employee_id, e);
            SyncOutcome {
                employee_id: record.employee_id,
                status: SyncStatus::RolledBack,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::SqlValue;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Target store fake: fails chosen keys, records every call.
    struct FakeStore {
        fail_keys: HashSet<i64>,
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<i64>>>,
    }

    impl FakeStore {
        fn new(fail_keys: &[i64]) -> Self {
            Self {
                fail_keys: fail_keys.iter().copied().collect(),
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl TargetStore for FakeStore {
        async fn upsert(&self, record: &EmployeeRecord) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(record.employee_id);
            if self.fail_keys.contains(&record.employee_id) {
                Err(SyncError::Extraction(format!(
                    "injected failure for {}",
                    record.employee_id
                )))
            } else {
                Ok(())
            }
        }
    }

    fn record(employee_id: i64) -> EmployeeRecord {
        EmployeeRecord {
            employee_id,
            values: vec![SqlValue::I64(employee_id)],
        }
    }

    fn records(ids: &[i64]) -> Vec<EmployeeRecord> {
        ids.iter().copied().map(record).collect()
    }

    #[tokio::test]
    async fn test_all_records_commit() {
        let engine = SyncEngine::new(FakeStore::new(&[]), EngineConfig::default());
        let outcomes = engine.sync(records(&[100, 200, 300])).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.status == SyncStatus::Committed));
        assert!(outcomes.iter().all(|o| o.error.is_none()));
    }

    #[tokio::test]
    async fn test_failed_record_is_isolated() {
        let engine = SyncEngine::new(FakeStore::new(&[200]), EngineConfig::default());
        let outcomes = engine.sync(records(&[100, 200, 300])).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status, SyncStatus::Committed);
        assert_eq!(outcomes[1].status, SyncStatus::RolledBack);
        assert!(outcomes[1].error.as_ref().unwrap().contains("injected failure"));
        assert_eq!(outcomes[2].status, SyncStatus::Committed);
    }

    #[tokio::test]
    async fn test_run_continues_past_every_failure() {
        let engine = SyncEngine::new(FakeStore::new(&[1, 2, 3]), EngineConfig::default());
        let outcomes = engine.sync(records(&[1, 2, 3])).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.status == SyncStatus::RolledBack));
    }

    #[tokio::test]
    async fn test_sequential_preserves_buffer_order() {
        let store = FakeStore::new(&[]);
        let engine = SyncEngine::new(store, EngineConfig { workers: 1 });
        let outcomes = engine.sync(records(&[300, 100, 200])).await.unwrap();

        let ids: Vec<i64> = outcomes.iter().map(|o| o.employee_id).collect();
        assert_eq!(ids, vec![300, 100, 200]);
    }

    #[tokio::test]
    async fn test_every_record_reaches_the_store_exactly_once() {
        let store = FakeStore::new(&[2]);
        let calls = Arc::clone(&store.calls);
        let seen = Arc::clone(&store.seen);

        let engine = SyncEngine::new(store, EngineConfig::default());
        let outcomes = engine.sync(records(&[1, 2, 3, 4])).await.unwrap();

        assert_eq!(outcomes.len(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| o.status == SyncStatus::Committed)
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_parallel_returns_all_outcomes() {
        let ids: Vec<i64> = (1..=50).collect();
        let engine = SyncEngine::new(FakeStore::new(&[7, 13]), EngineConfig { workers: 4 });
        let outcomes = engine.sync(records(&ids)).await.unwrap();

        assert_eq!(outcomes.len(), 50);

        let mut seen: Vec<i64> = outcomes.iter().map(|o| o.employee_id).collect();
        seen.sort_unstable();
        assert_eq!(seen, ids);

        let rolled_back: Vec<i64> = outcomes
            .iter()
            .filter(|o| o.status == SyncStatus::RolledBack)
            .map(|o| o.employee_id)
            .collect();
        assert_eq!(rolled_back.len(), 2);
        assert!(rolled_back.contains(&7));
        assert!(rolled_back.contains(&13));
    }

    #[tokio::test]
    async fn test_resync_yields_identical_outcomes() {
        let engine = SyncEngine::new(FakeStore::new(&[200]), EngineConfig::default());

        let first = engine.sync(records(&[100, 200])).await.unwrap();
        let second = engine.sync(records(&[100, 200])).await.unwrap();

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.employee_id, b.employee_id);
            assert_eq!(a.status, b.status);
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let engine = SyncEngine::new(FakeStore::new(&[]), EngineConfig::default());
        let outcomes = engine.sync(Vec::new()).await.unwrap();
        assert!(outcomes.is_empty());
    }
}
