//! Field normalization from source rows to target-shaped records.
//!
//! One rule, applied uniformly to every field: emptiness, not type,
//! drives null-mapping. The source system represents "unknown"
//! inconsistently across types, so an absent value and a blank string
//! both land on the same no-value sentinel.

use crate::schema::{ColumnSpec, SqlType, COLUMNS, KEY_COLUMN};
use crate::source::SourceRow;
use crate::target::{SqlNullType, SqlValue};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Normalized, target-schema-shaped projection of one source row.
#[derive(Debug, Clone)]
pub struct EmployeeRecord {
    /// Natural key, for keying outcomes and logs. Zero when the source
    /// row carries no usable key; the merge then fails on the key
    /// column's NOT NULL constraint and the record reports rolled back.
    pub employee_id: i64,
    /// One value per [`COLUMNS`] entry, in declaration order.
    pub values: Vec<SqlValue>,
}

/// Map a source row to a target record.
///
/// Total: every cell lands on either a typed value or the explicit
/// no-value sentinel. Never fails.
pub fn normalize_row(row: &SourceRow) -> EmployeeRecord {
    let values: Vec<SqlValue> = COLUMNS
        .iter()
        .map(|col| normalize_field(row.value(col.name), col))
        .collect();

    let employee_id = row
        .value(KEY_COLUMN)
        .and_then(SqlValue::as_i64)
        .unwrap_or(0);

    EmployeeRecord {
        employee_id,
        values,
    }
}

/// The uniform null-mapping rule.
///
/// Absent values, typed nulls, and text that trims to empty all become
/// the column's typed null; everything else is narrowed to the declared
/// target type.
pub fn normalize_field(value: Option<&SqlValue>, col: &ColumnSpec) -> SqlValue {
    match value {
        None => SqlValue::Null(null_type(col.sql_type)),
        Some(SqlValue::Null(_)) => SqlValue::Null(null_type(col.sql_type)),
        Some(SqlValue::String(s)) if s.trim().is_empty() => SqlValue::Null(null_type(col.sql_type)),
        Some(v) => narrow(v.clone(), col.sql_type),
    }
}

/// Typed null sentinel for a declared column type.
fn null_type(sql_type: SqlType) -> SqlNullType {
    match sql_type {
        SqlType::BigInt => SqlNullType::I64,
        SqlType::Numeric => SqlNullType::Decimal,
        SqlType::VarChar(_) => SqlNullType::String,
        SqlType::Timestamp => SqlNullType::DateTime,
    }
}

/// Adjust a value's representation to the declared target type.
///
/// Total by construction: a value that cannot be represented passes
/// through unchanged and is left to the target store's own typing, so a
/// genuinely incompatible cell fails that record's merge rather than
/// the whole run. No text is truncated here; over-width values are a
/// target constraint violation.
fn narrow(value: SqlValue, sql_type: SqlType) -> SqlValue {
    match (sql_type, value) {
        (SqlType::BigInt, SqlValue::I16(n)) => SqlValue::I64(n as i64),
        (SqlType::BigInt, SqlValue::I32(n)) => SqlValue::I64(n as i64),
        (SqlType::BigInt, SqlValue::Decimal(d)) => match d.to_i64() {
            Some(n) => SqlValue::I64(n),
            None => SqlValue::Decimal(d),
        },
        (SqlType::Numeric, SqlValue::I16(n)) => SqlValue::Decimal(Decimal::from(n)),
        (SqlType::Numeric, SqlValue::I32(n)) => SqlValue::Decimal(Decimal::from(n)),
        (SqlType::Numeric, SqlValue::I64(n)) => SqlValue::Decimal(Decimal::from(n)),
        (SqlType::Timestamp, SqlValue::Date(d)) => match d.and_hms_opt(0, 0, 0) {
            Some(dt) => SqlValue::DateTime(dt),
            None => SqlValue::Date(d),
        },
        (_, v) => v,
    }
}
