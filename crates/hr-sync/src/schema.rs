//! Layout of the combined employee table.
//!
//! The source join query, the field normalizer, the merge statement and
//! the target DDL are all derived from the single [`COLUMNS`] table.

/// Declared target type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// 64-bit integer identifier.
    BigInt,
    /// Exact decimal.
    Numeric,
    /// Variable-length text with a declared maximum width.
    VarChar(u16),
    /// Date and time without zone.
    Timestamp,
}

/// One column of the combined target table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
}

/// Name of the combined target table.
pub const TARGET_TABLE: &str = "combined_employees";

/// Natural key of the combined table.
pub const KEY_COLUMN: &str = "employee_id";

/// The combined table layout, in source-select and insert order.
pub const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "employee_id",
        sql_type: SqlType::BigInt,
        nullable: false,
    },
    ColumnSpec {
        name: "first_name",
        sql_type: SqlType::VarChar(20),
        nullable: true,
    },
    ColumnSpec {
        name: "last_name",
        sql_type: SqlType::VarChar(25),
        nullable: true,
    },
    ColumnSpec {
        name: "email",
        sql_type: SqlType::VarChar(25),
        nullable: true,
    },
    ColumnSpec {
        name: "phone_number",
        sql_type: SqlType::VarChar(20),
        nullable: true,
    },
    ColumnSpec {
        name: "hire_date",
        sql_type: SqlType::Timestamp,
        nullable: true,
    },
    ColumnSpec {
        name: "job_id",
        sql_type: SqlType::VarChar(10),
        nullable: true,
    },
    ColumnSpec {
        name: "salary",
        sql_type: SqlType::Numeric,
        nullable: true,
    },
    ColumnSpec {
        name: "commission_pct",
        sql_type: SqlType::Numeric,
        nullable: true,
    },
    ColumnSpec {
        name: "department_id",
        sql_type: SqlType::BigInt,
        nullable: true,
    },
    ColumnSpec {
        name: "department_name",
        sql_type: SqlType::VarChar(30),
        nullable: true,
    },
    ColumnSpec {
        name: "job_title",
        sql_type: SqlType::VarChar(35),
        nullable: true,
    },
    ColumnSpec {
        name: "min_salary",
        sql_type: SqlType::Numeric,
        nullable: true,
    },
    ColumnSpec {
        name: "max_salary",
        sql_type: SqlType::Numeric,
        nullable: true,
    },
];

/// Position of a column in [`COLUMNS`] by name.
pub fn column_index(name: &str) -> Option<usize> {
    COLUMNS.iter().position(|c| c.name == name)
}

/// Build the fixed join query against the given source schema.
///
/// Employees inner-joined with their department and job attributes,
/// selecting the columns in [`COLUMNS`] order.
pub fn source_query(schema: &str) -> String {
    format!(
        "SELECT e.employee_id, e.first_name, e.last_name, e.email, e.phone_number, \
         e.hire_date, e.job_id, e.salary, e.commission_pct, e.department_id, \
         d.department_name, j.job_title, j.min_salary, j.max_salary \
         FROM [{schema}].[employees] e \
         INNER JOIN [{schema}].[departments] d ON e.department_id = d.department_id \
         INNER JOIN [{schema}].[jobs] j ON e.job_id = j.job_id",
        schema = schema
    )
}

/// Generate DDL for the combined table.
pub fn target_ddl(schema: &str) -> String {
    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS \"{}\".\"{}\" (\n",
        schema, TARGET_TABLE
    );

    for (i, col) in COLUMNS.iter().enumerate() {
        let pg_type = match col.sql_type {
            SqlType::BigInt => "bigint".to_string(),
            SqlType::Numeric => "numeric".to_string(),
            SqlType::VarChar(n) => format!("varchar({})", n),
            SqlType::Timestamp => "timestamp".to_string(),
        };

        let nullable = if col.nullable { "" } else { " NOT NULL" };
        let key = if col.name == KEY_COLUMN {
            " PRIMARY KEY"
        } else {
            ""
        };

        ddl.push_str(&format!("    \"{}\" {}{}{}", col.name, pg_type, nullable, key));

        if i < COLUMNS.len() - 1 {
            ddl.push_str(",\n");
        } else {
            ddl.push('\n');
        }
    }

    ddl.push(')');
    ddl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_count() {
        assert_eq!(COLUMNS.len(), 14);
    }

    #[test]
    fn test_key_column_is_first_and_not_nullable() {
        assert_eq!(COLUMNS[0].name, KEY_COLUMN);
        assert!(!COLUMNS[0].nullable);
        assert_eq!(COLUMNS[0].sql_type, SqlType::BigInt);
    }

    #[test]
    fn test_all_other_columns_nullable() {
        for col in &COLUMNS[1..] {
            assert!(col.nullable, "column {} should be nullable", col.name);
        }
    }

    #[test]
    fn test_column_index_lookup() {
        assert_eq!(column_index("employee_id"), Some(0));
        assert_eq!(column_index("commission_pct"), Some(8));
        assert_eq!(column_index("max_salary"), Some(13));
        assert_eq!(column_index("no_such_column"), None);
    }

    #[test]
    fn test_source_query_joins_all_three_tables() {
        let sql = source_query("dbo");
        assert!(sql.contains("[dbo].[employees] e"));
        assert!(sql.contains("INNER JOIN [dbo].[departments] d ON e.department_id = d.department_id"));
        assert!(sql.contains("INNER JOIN [dbo].[jobs] j ON e.job_id = j.job_id"));
    }

    #[test]
    fn test_source_query_selects_every_column() {
        let sql = source_query("dbo");
        for col in COLUMNS {
            assert!(sql.contains(col.name), "query should select {}", col.name);
        }
    }

    #[test]
    fn test_target_ddl_shape() {
        let ddl = target_ddl("public");
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"combined_employees\""));
        assert!(ddl.contains("\"employee_id\" bigint NOT NULL PRIMARY KEY"));
        assert!(ddl.contains("\"first_name\" varchar(20)"));
        assert!(ddl.contains("\"job_title\" varchar(35)"));
        assert!(ddl.contains("\"hire_date\" timestamp"));
        assert!(ddl.contains("\"commission_pct\" numeric"));
        assert!(ddl.ends_with(')'));
    }
}
