//! PostgreSQL target store operations.

use crate::config::TargetConfig;
use crate::error::{Result, SyncError};
use crate::normalize::EmployeeRecord;
use crate::schema::{self, SqlType, COLUMNS, KEY_COLUMN, TARGET_TABLE};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{types::ToSql, Config as PgConfig, IsolationLevel, NoTls};
use tracing::{debug, info};

/// Trait for target store operations.
///
/// The sync engine drives the whole load phase through this seam. The
/// single operation must be transactional and atomic per key: either
/// the record's row is fully written (created or updated) and
/// committed, or nothing of it is visible.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Insert-or-update one record inside its own transaction.
    async fn upsert(&self, record: &EmployeeRecord) -> Result<()>;
}

/// SQL value enum for type-safe cell handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(SqlNullType),
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
    Decimal(rust_decimal::Decimal),
    String(String),
    DateTime(chrono::NaiveDateTime),
    Date(chrono::NaiveDate),
}

/// Type hint for NULL values so parameter encoding stays typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlNullType {
    I16,
    I32,
    I64,
    F64,
    Decimal,
    String,
    DateTime,
    Date,
}

impl SqlValue {
    /// Whether this value is the no-value sentinel.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Best-effort integer view of the value, used for keying outcomes
    /// and logs.
    pub fn as_i64(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;

        match self {
            SqlValue::I16(n) => Some(*n as i64),
            SqlValue::I32(n) => Some(*n as i64),
            SqlValue::I64(n) => Some(*n),
            SqlValue::Decimal(d) => d.to_i64(),
            SqlValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// PostgreSQL target store backed by a connection pool.
///
/// The sequential baseline runs with a pool of one: a single long-lived
/// connection reused across records, with a fresh transaction per
/// record as the unit of atomicity. Larger pools serve the parallel
/// worker extension.
pub struct PgTarget {
    pool: Pool,
    schema: String,
    merge_sql: String,
}

impl PgTarget {
    /// Connect to the target database and probe it.
    ///
    /// Fails before any record is processed if the target is not
    /// reachable.
    pub async fn connect(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(max_conns)
            .build()
            .map_err(|e| SyncError::pool(e.to_string(), "building target pool"))?;

        // Probe the connection up front
        let client = pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e.to_string(), "opening target connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            schema: config.schema.clone(),
            merge_sql: build_merge_sql(&config.schema),
        })
    }

    /// Create the combined table if it does not exist.
    pub async fn ensure_table(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e.to_string(), "opening target connection"))?;

        let ddl = schema::target_ddl(&self.schema);
        debug!("Target DDL: {}", ddl);
        client.batch_execute(&ddl).await?;

        info!("Ensured table {}.{}", self.schema, TARGET_TABLE);
        Ok(())
    }

    /// Round-trip probe used by health checks.
    pub async fn ping(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e.to_string(), "opening target connection"))?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }
}

#[async_trait]
impl TargetStore for PgTarget {
    async fn upsert(&self, record: &EmployeeRecord) -> Result<()> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e.to_string(), "checking out target connection"))?;

        let tx = client
            .build_transaction()
            .isolation_level(IsolationLevel::ReadCommitted)
            .start()
            .await?;

        let params = record_params(record);
        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        match tx.execute(self.merge_sql.as_str(), &param_refs).await {
            Ok(_) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                // This record rolls back alone; siblings are untouched.
                if let Err(rb) = tx.rollback().await {
                    debug!("Rollback after failed merge also failed: {}", rb);
                }
                Err(SyncError::Target(e))
            }
        }
    }
}

/// Build the single-record merge statement for the combined table.
///
/// One atomic server-side statement keyed on the employee id. The
/// update branch rewrites every non-key column unconditionally: last
/// write wins by source value.
pub fn build_merge_sql(schema: &str) -> String {
    let col_list: String = COLUMNS
        .iter()
        .map(|c| format!("\"{}\"", c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let placeholders: Vec<String> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, c)| format!("${}{}", i + 1, sql_cast_for_type(c.sql_type)))
        .collect();

    let update_cols: Vec<String> = COLUMNS
        .iter()
        .filter(|c| c.name != KEY_COLUMN)
        .map(|c| format!("\"{}\" = EXCLUDED.\"{}\"", c.name, c.name))
        .collect();

    format!(
        "INSERT INTO \"{}\".\"{}\" ({}) VALUES ({}) ON CONFLICT (\"{}\") DO UPDATE SET {}",
        schema,
        TARGET_TABLE,
        col_list,
        placeholders.join(", "),
        KEY_COLUMN,
        update_cols.join(", ")
    )
}

/// SQL cast suffix for a declared column type.
///
/// Text casts stay at plain ::text so over-width values fail at the
/// varchar(n) column instead of being truncated by the cast.
fn sql_cast_for_type(sql_type: SqlType) -> &'static str {
    match sql_type {
        SqlType::BigInt => "::bigint",
        SqlType::Numeric => "::numeric",
        SqlType::VarChar(_) => "::text",
        SqlType::Timestamp => "::timestamp",
    }
}

/// Convert a record's values to boxed statement parameters.
fn record_params(record: &EmployeeRecord) -> Vec<Box<dyn ToSql + Sync + Send>> {
    record.values.iter().map(sql_value_to_param).collect()
}

/// Convert a SqlValue to a boxed ToSql parameter.
/// Converts all values to strings - the statement's cast suffixes make
/// the server do the typing.
fn sql_value_to_param(value: &SqlValue) -> Box<dyn ToSql + Sync + Send> {
    match value {
        SqlValue::Null(_) => Box::new(None::<String>),
        SqlValue::I16(n) => Box::new(n.to_string()),
        SqlValue::I32(n) => Box::new(n.to_string()),
        SqlValue::I64(n) => Box::new(n.to_string()),
        SqlValue::F64(n) => Box::new(n.to_string()),
        SqlValue::Decimal(d) => Box::new(d.to_string()),
        SqlValue::String(s) => Box::new(s.clone()),
        SqlValue::DateTime(dt) => Box::new(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        SqlValue::Date(d) => Box::new(d.to_string()),
    }
}
