//! Sync run orchestrator - main workflow coordinator.

use crate::config::Config;
use crate::error::Result;
use crate::normalize::{normalize_row, EmployeeRecord};
use crate::source::MssqlExtractor;
use crate::sync::{EngineConfig, SyncEngine, SyncOutcome, SyncStatus};
use crate::target::PgTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

/// Sync run orchestrator.
pub struct Orchestrator {
    config: Config,
}

/// Result of a sync run - the run's final observable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Whether this was a dry run (no target writes).
    pub dry_run: bool,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Records extracted and normalized.
    pub records_total: usize,

    /// Records committed.
    pub records_committed: usize,

    /// Records rolled back.
    pub records_rolled_back: usize,

    /// Average throughput (records/second).
    pub records_per_second: i64,

    /// Keys and errors of rolled-back records.
    pub failed_records: Vec<FailedRecord>,
}

/// One rolled-back record in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRecord {
    pub employee_id: i64,
    pub error: String,
}

impl SyncReport {
    /// Serialize the report to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of probing both stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the sync job.
    ///
    /// Extraction failures and a failed target connection abort the run
    /// before any record is written. Per-record failures are contained
    /// in the report.
    pub async fn run(&self, dry_run: bool) -> Result<SyncReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting sync run: {}", run_id);

        // Phase 1: materialize the full source buffer before any
        // target work; the source connection is scoped to this phase.
        info!("Phase 1: Extracting joined rows from source");
        let rows = {
            let mut extractor = MssqlExtractor::connect(
                &self.config.source,
                Duration::from_secs(self.config.sync.query_timeout_secs),
            )
            .await?;
            extractor.extract().await?
        };

        // Phase 2: normalize
        info!("Phase 2: Normalizing {} rows", rows.len());
        let records: Vec<EmployeeRecord> = rows.iter().map(normalize_row).collect();

        if dry_run {
            info!("Dry run: skipping target writes");
            return Ok(build_report(run_id, started_at, records.len(), &[], true));
        }

        // Phase 3: load; the target connection is opened only after a
        // successful extraction.
        info!("Phase 3: Upserting {} records into target", records.len());
        let workers = self.config.sync.workers;
        let target = PgTarget::connect(&self.config.target, workers.max(1)).await?;
        let engine = SyncEngine::new(target, EngineConfig { workers });
        let outcomes = engine.sync(records).await?;

        // Phase 4: report
        let report = build_report(run_id, started_at, outcomes.len(), &outcomes, false);
        info!(
            "Sync {}: {} records, {} committed, {} rolled back in {:.1}s",
            report.status,
            report.records_total,
            report.records_committed,
            report.records_rolled_back,
            report.duration_seconds
        );
        Ok(report)
    }

    /// Create the combined target table if it does not exist.
    pub async fn init_target(&self) -> Result<()> {
        let target = PgTarget::connect(&self.config.target, 1).await?;
        target.ensure_table().await
    }

    /// Probe both stores.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let (source_connected, source_error) = match MssqlExtractor::connect(
            &self.config.source,
            Duration::from_secs(self.config.sync.query_timeout_secs),
        )
        .await
        {
            Ok(mut extractor) => match extractor.ping().await {
                Ok(()) => (true, None),
                Err(e) => (false, Some(e.to_string())),
            },
            Err(e) => (false, Some(e.to_string())),
        };
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let (target_connected, target_error) =
            match PgTarget::connect(&self.config.target, 1).await {
                Ok(target) => match target.ping().await {
                    Ok(()) => (true, None),
                    Err(e) => (false, Some(e.to_string())),
                },
                Err(e) => (false, Some(e.to_string())),
            };
        let target_latency_ms = start.elapsed().as_millis() as u64;

        HealthCheckResult {
            source_connected,
            source_latency_ms,
            source_error,
            target_connected,
            target_latency_ms,
            target_error,
            healthy: source_connected && target_connected,
        }
    }
}

/// Assemble the run report from collected outcomes.
fn build_report(
    run_id: String,
    started_at: DateTime<Utc>,
    records_total: usize,
    outcomes: &[SyncOutcome],
    dry_run: bool,
) -> SyncReport {
    let completed_at = Utc::now();
    let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

    let records_committed = outcomes
        .iter()
        .filter(|o| o.status == SyncStatus::Committed)
        .count();
    let records_rolled_back = outcomes
        .iter()
        .filter(|o| o.status == SyncStatus::RolledBack)
        .count();

    let failed_records = outcomes
        .iter()
        .filter(|o| o.status == SyncStatus::RolledBack)
        .map(|o| FailedRecord {
            employee_id: o.employee_id,
            error: o.error.clone().unwrap_or_default(),
        })
        .collect();

    let records_per_second = if duration_seconds > 0.0 {
        (records_total as f64 / duration_seconds) as i64
    } else {
        0
    };

    let status = if dry_run {
        "dry_run"
    } else if records_rolled_back > 0 {
        "completed_with_failures"
    } else {
        "completed"
    };

    SyncReport {
        run_id,
        status: status.to_string(),
        dry_run,
        started_at,
        completed_at,
        duration_seconds,
        records_total,
        records_committed,
        records_rolled_back,
        records_per_second,
        failed_records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(employee_id: i64, status: SyncStatus, error: Option<&str>) -> SyncOutcome {
        SyncOutcome {
            employee_id,
            status,
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_report_counts_outcomes() {
        let outcomes = vec![
            outcome(100, SyncStatus::Committed, None),
            outcome(200, SyncStatus::RolledBack, Some("value too long")),
            outcome(300, SyncStatus::Committed, None),
        ];

        let report = build_report("run-1".into(), Utc::now(), 3, &outcomes, false);

        assert_eq!(report.records_total, 3);
        assert_eq!(report.records_committed, 2);
        assert_eq!(report.records_rolled_back, 1);
        assert_eq!(report.status, "completed_with_failures");
        assert_eq!(report.failed_records.len(), 1);
        assert_eq!(report.failed_records[0].employee_id, 200);
        assert_eq!(report.failed_records[0].error, "value too long");
    }

    #[test]
    fn test_report_all_committed() {
        let outcomes = vec![
            outcome(100, SyncStatus::Committed, None),
            outcome(200, SyncStatus::Committed, None),
        ];

        let report = build_report("run-2".into(), Utc::now(), 2, &outcomes, false);

        assert_eq!(report.status, "completed");
        assert!(report.failed_records.is_empty());
    }

    #[test]
    fn test_dry_run_report() {
        let report = build_report("run-3".into(), Utc::now(), 42, &[], true);

        assert_eq!(report.status, "dry_run");
        assert!(report.dry_run);
        assert_eq!(report.records_total, 42);
        assert_eq!(report.records_committed, 0);
        assert_eq!(report.records_rolled_back, 0);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = build_report("run-4".into(), Utc::now(), 0, &[], false);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"run_id\": \"run-4\""));
        assert!(json.contains("\"status\": \"completed\""));
    }
}
