//! MSSQL source store operations.

use crate::config::SourceConfig;
use crate::error::{Result, SyncError};
use crate::schema::{self, ColumnSpec, SqlType, COLUMNS};
use crate::target::{SqlNullType, SqlValue};
use chrono::NaiveDateTime;
use std::time::Duration;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Row};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

/// One joined source row, values laid out in [`COLUMNS`] order.
///
/// Owned by the extractor; downstream components only read it.
#[derive(Debug, Clone)]
pub struct SourceRow {
    values: Vec<SqlValue>,
}

impl SourceRow {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    /// Look up a cell by column name. Unknown columns yield None.
    pub fn value(&self, name: &str) -> Option<&SqlValue> {
        schema::column_index(name).and_then(|i| self.values.get(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Extractor over a single scoped MSSQL connection.
///
/// The connection lives for the extraction phase only; dropping the
/// extractor releases it on every exit path.
pub struct MssqlExtractor {
    client: Client<Compat<TcpStream>>,
    schema: String,
    query_timeout: Duration,
}

impl MssqlExtractor {
    /// Open a connection to the source database.
    pub async fn connect(config: &SourceConfig, query_timeout: Duration) -> Result<Self> {
        let tiberius_config = build_config(config);

        let tcp = TcpStream::connect(tiberius_config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;

        tcp.set_nodelay(true).ok();

        let client = Client::connect(tiberius_config, tcp.compat_write()).await?;

        info!(
            "Connected to MSSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            client,
            schema: config.schema.clone(),
            query_timeout,
        })
    }

    /// Run the fixed join query and materialize the full result set.
    ///
    /// Fails atomically: any connectivity, query or timeout error
    /// yields no partial buffer. Row order is whatever the source
    /// returns; downstream keying is by employee id, not position.
    pub async fn extract(&mut self) -> Result<Vec<SourceRow>> {
        let sql = schema::source_query(&self.schema);
        debug!("Source query: {}", sql);

        let timed_out = |secs: u64| {
            SyncError::Extraction(format!("source query timed out after {}s", secs))
        };

        let secs = self.query_timeout.as_secs();
        let stream = timeout(self.query_timeout, self.client.simple_query(sql))
            .await
            .map_err(|_| timed_out(secs))??;

        let rows = timeout(self.query_timeout, stream.into_first_result())
            .await
            .map_err(|_| timed_out(secs))??;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let values = COLUMNS
                .iter()
                .enumerate()
                .map(|(idx, col)| convert_cell(row, idx, col))
                .collect();
            result.push(SourceRow::new(values));
        }

        info!("Extracted {} source rows", result.len());
        Ok(result)
    }

    /// Round-trip probe used by health checks.
    pub async fn ping(&mut self) -> Result<()> {
        self.client
            .simple_query("SELECT 1")
            .await?
            .into_row()
            .await?;
        Ok(())
    }
}

/// Build a tiberius config from the source settings.
fn build_config(config: &SourceConfig) -> Config {
    let mut c = Config::new();
    c.host(&config.host);
    c.port(config.port);
    c.database(&config.database);
    c.authentication(AuthMethod::sql_server(&config.user, &config.password));

    if config.encrypt {
        if config.trust_server_cert {
            c.trust_cert();
        }
        c.encryption(EncryptionLevel::Required);
    } else {
        c.encryption(EncryptionLevel::NotSupported);
    }

    c
}

/// Convert one cell to a SqlValue, driven by the declared column type.
///
/// Absent cells become typed nulls; the fallback chains cover the
/// integer widths and numeric encodings the driver may hand back.
fn convert_cell(row: &Row, idx: usize, col: &ColumnSpec) -> SqlValue {
    match col.sql_type {
        SqlType::BigInt => row
            .try_get::<i64, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::I64)
            .or_else(|| {
                row.try_get::<i32, _>(idx)
                    .ok()
                    .flatten()
                    .map(|v| SqlValue::I64(v as i64))
            })
            .or_else(|| {
                row.try_get::<i16, _>(idx)
                    .ok()
                    .flatten()
                    .map(|v| SqlValue::I64(v as i64))
            })
            .or_else(|| decimal_cell(row, idx))
            .unwrap_or(SqlValue::Null(SqlNullType::I64)),

        SqlType::Numeric => decimal_cell(row, idx)
            .or_else(|| {
                row.try_get::<i64, _>(idx)
                    .ok()
                    .flatten()
                    .map(|v| SqlValue::Decimal(v.into()))
            })
            .or_else(|| {
                row.try_get::<i32, _>(idx)
                    .ok()
                    .flatten()
                    .map(|v| SqlValue::Decimal(v.into()))
            })
            .unwrap_or(SqlValue::Null(SqlNullType::Decimal)),

        SqlType::Timestamp => row
            .try_get::<NaiveDateTime, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Null(SqlNullType::DateTime)),

        SqlType::VarChar(_) => row
            .try_get::<&str, _>(idx)
            .ok()
            .flatten()
            .map(|s| SqlValue::String(s.to_string()))
            .unwrap_or(SqlValue::Null(SqlNullType::String)),
    }
}

/// Read a numeric cell: text first for an exact decimal, f64 fallback.
fn decimal_cell(row: &Row, idx: usize) -> Option<SqlValue> {
    row.try_get::<&str, _>(idx)
        .ok()
        .flatten()
        .and_then(|s| s.parse::<rust_decimal::Decimal>().ok())
        .map(SqlValue::Decimal)
        .or_else(|| {
            row.try_get::<f64, _>(idx).ok().flatten().map(|f| {
                rust_decimal::Decimal::try_from(f)
                    .map(SqlValue::Decimal)
                    .unwrap_or(SqlValue::F64(f))
            })
        })
}
