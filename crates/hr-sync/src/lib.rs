//! # hr-sync
//!
//! One-shot synchronization of a denormalized employee/department/job
//! dataset from MSSQL into a combined PostgreSQL table, one idempotent
//! upsert per record.
//!
//! - **Full extraction**: the joined source result set is materialized
//!   in memory before any target write
//! - **Uniform null-mapping**: absent or blank source values become SQL
//!   NULL in the target, regardless of column type
//! - **Per-record transactions**: a failed record rolls back alone and
//!   never aborts the batch
//! - **Optional worker pool** for parallel upserts over disjoint keys
//!
//! ## Example
//!
//! ```rust,no_run
//! use hr_sync::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hr_sync::SyncError> {
//!     let config = Config::load("config.yaml")?;
//!     let report = Orchestrator::new(config).run(false).await?;
//!     println!("Committed {} records", report.records_committed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod schema;
pub mod source;
pub mod sync;
pub mod target;

// Re-exports for convenient access
pub use config::{Config, SourceConfig, SyncConfig, TargetConfig};
pub use error::{Result, SyncError};
pub use normalize::{normalize_row, EmployeeRecord};
pub use orchestrator::{HealthCheckResult, Orchestrator, SyncReport};
pub use source::{MssqlExtractor, SourceRow};
pub use sync::{EngineConfig, SyncEngine, SyncOutcome, SyncStatus};
pub use target::{PgTarget, SqlNullType, SqlValue, TargetStore};
