//! Table provisioning and bulk load.
//!
//! [`provision_then_copy`] prepares a destination table according to an
//! [`IfExists`] policy and loads a [`Table`] into it, all inside one
//! transaction scope. SQLite DDL is transactional, so a load that fails
//! after a `DROP TABLE` rolls back to the original table.
//!
//! Usage errors are raised before any DDL:
//! - an unknown policy string fails before a connection is opened
//! - `fail` on an existing table fails after the existence probe only
//! - creating from an empty table fails before `DROP` or `CREATE`

pub mod policy;
pub mod schema;

pub use policy::IfExists;
pub use schema::{create_statement, infer_column, insert_statement, round_varchar, ColumnType, VARCHAR_STEPS};

use crate::catalog::{qualified_table_exists, QualifiedName};
use crate::driver::{Connection, Cursor, Driver};
use crate::otel::{db_span, record_db_metrics, DbOperation};
use crate::scope::{with_cursor, with_transaction};
use crate::table::Table;
use crate::types::{DatabaseError, Params, Result};
use serde::Serialize;
use tracing::info;

/// How the destination was prepared before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionAction {
    /// Destination did not exist and was created
    Created,
    /// Rows were added to the existing table
    Appended,
    /// Existing rows were deleted first
    Truncated,
    /// Existing table was dropped and created again
    Recreated,
}

/// Result of a completed copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyOutcome {
    /// Destination as `schema.table`
    pub table: String,
    pub action: ProvisionAction,
    pub rows_copied: usize,
}

/// Prepare `destination` and copy `table` into it in one transaction.
///
/// # Arguments
///
/// * `driver` - Opens the connection for the transaction scope
/// * `table` - Rows to load; its columns name the destination columns
/// * `destination` - `schema.table` or bare `table`
/// * `if_exists` - One of `fail`, `append`, `drop`, `truncate`
/// * `strict_length` - Size text columns exactly instead of rounding up
///
/// # Errors
///
/// - `DatabaseError::InvalidIfExists` before any connection is opened
/// - `DatabaseError::TableExists` under `fail`, before any DDL
/// - `DatabaseError::EmptyTable` when a table must be created from zero rows
/// - Driver errors from DDL or the load, after rollback
pub fn provision_then_copy(
    driver: &dyn Driver,
    table: &Table,
    destination: &str,
    if_exists: &str,
    strict_length: bool,
) -> Result<CopyOutcome> {
    let policy: IfExists = if_exists.parse()?;
    copy_with_policy(driver, table, destination, policy, strict_length)
}

/// [`provision_then_copy`] with an already parsed policy.
pub fn copy_with_policy(
    driver: &dyn Driver,
    table: &Table,
    destination: &str,
    policy: IfExists,
    strict_length: bool,
) -> Result<CopyOutcome> {
    let destination = QualifiedName::parse(destination)?;
    let span = db_span(DbOperation::Copy, &destination.to_string());
    let _guard = span.enter();

    let transactional_ddl = driver.supports_transactional_ddl();
    let outcome = with_transaction(driver, |conn| {
        provision_with_connection(conn, table, &destination, policy, strict_length, transactional_ddl)
    })?;

    record_db_metrics(None, Some(outcome.rows_copied));
    info!(
        table = %outcome.table,
        action = ?outcome.action,
        rows = outcome.rows_copied,
        "Copy complete"
    );
    Ok(outcome)
}

fn provision_with_connection(
    conn: &dyn Connection,
    table: &Table,
    destination: &QualifiedName,
    policy: IfExists,
    strict_length: bool,
    transactional_ddl: bool,
) -> Result<CopyOutcome> {
    let exists = qualified_table_exists(conn, destination, false)?;

    let action = match (exists, policy) {
        (false, _) => ProvisionAction::Created,
        (true, IfExists::Fail) => return Err(DatabaseError::TableExists(destination.to_string())),
        (true, IfExists::Append) => ProvisionAction::Appended,
        (true, IfExists::Truncate) => ProvisionAction::Truncated,
        (true, IfExists::Drop) => ProvisionAction::Recreated,
    };

    if action == ProvisionAction::Recreated && !transactional_ddl {
        return Err(DatabaseError::validation(format!(
            "if_exists=drop on {} needs transactional DDL",
            destination
        )));
    }

    let create_sql = match action {
        ProvisionAction::Created | ProvisionAction::Recreated => {
            Some(create_statement(table, destination, strict_length)?)
        }
        ProvisionAction::Appended | ProvisionAction::Truncated => None,
    };

    with_cursor(conn, |cursor| {
        match action {
            ProvisionAction::Truncated => {
                info!(table = %destination, "Truncating table");
                let _span = db_span(DbOperation::Truncate, &destination.to_string()).entered();
                cursor.execute(&format!("DELETE FROM {}", destination.to_sql()), &Params::None)?;
            }
            ProvisionAction::Recreated => {
                info!(table = %destination, "Dropping table");
                let _span = db_span(DbOperation::Drop, &destination.to_string()).entered();
                cursor.execute(&format!("DROP TABLE {}", destination.to_sql()), &Params::None)?;
            }
            ProvisionAction::Created | ProvisionAction::Appended => {}
        }

        if let Some(sql) = &create_sql {
            info!(table = %destination, "Creating table");
            let _span = db_span(DbOperation::Create, &destination.to_string()).entered();
            cursor.execute(sql, &Params::None)?;
        }

        let rows_copied = bulk_copy(cursor, table, destination)?;
        Ok(CopyOutcome {
            table: destination.to_string(),
            action,
            rows_copied,
        })
    })
}

/// Load every row of `table` into `destination`, matching columns by name.
fn bulk_copy(cursor: &mut dyn Cursor, table: &Table, destination: &QualifiedName) -> Result<usize> {
    if table.is_empty() {
        return Ok(0);
    }
    let sql = insert_statement(table.columns(), destination);
    let mut rows = table.rows().iter().map(|row| row.as_slice());
    let copied = cursor.execute_many(&sql, &mut rows)?;
    info!(table = %destination, rows = copied, "Copied rows");
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::table_exists;
    use crate::config::SqliteConfig;
    use crate::driver::SqliteDriver;
    use crate::types::Value;
    use tempfile::tempdir;

    fn people(rows: i64) -> Table {
        Table::from_rows(
            ["id", "name"],
            (0..rows).map(|i| vec![Value::Integer(i), Value::Text(format!("person {}", i))]),
        )
        .unwrap()
    }

    fn count(driver: &SqliteDriver, table: &str) -> i64 {
        with_transaction(driver, |conn| {
            with_cursor(conn, |cursor| {
                let mut result =
                    cursor.execute(&format!("SELECT count(*) FROM {}", table), &Params::None)?;
                match result.fetch_many(1)?.first().map(|r| r[0].clone()) {
                    Some(Value::Integer(n)) => Ok(n),
                    other => Err(DatabaseError::validation(format!("{:?}", other))),
                }
            })
        })
        .unwrap()
    }

    #[test]
    fn test_creates_missing_table() {
        let dir = tempdir().unwrap();
        let driver = SqliteDriver::new(SqliteConfig::new(dir.path().join("p.db")));

        let outcome = provision_then_copy(&driver, &people(3), "people", "fail", false).unwrap();
        assert_eq!(outcome.action, ProvisionAction::Created);
        assert_eq!(outcome.rows_copied, 3);
        assert_eq!(outcome.table, "public.people");
        assert_eq!(count(&driver, "people"), 3);
    }

    #[test]
    fn test_truncate_replaces_rows_keeps_definition() {
        let dir = tempdir().unwrap();
        let driver = SqliteDriver::new(SqliteConfig::new(dir.path().join("p.db")));

        provision_then_copy(&driver, &people(5), "people", "fail", false).unwrap();
        let outcome = provision_then_copy(&driver, &people(2), "people", "truncate", false).unwrap();
        assert_eq!(outcome.action, ProvisionAction::Truncated);
        assert_eq!(count(&driver, "people"), 2);
    }

    #[test]
    fn test_drop_recreates_with_new_shape() {
        let dir = tempdir().unwrap();
        let driver = SqliteDriver::new(SqliteConfig::new(dir.path().join("p.db")));

        provision_then_copy(&driver, &people(5), "people", "fail", false).unwrap();
        let reshaped = Table::from_rows(["code"], vec![vec![Value::from("A")]]).unwrap();
        let outcome = provision_then_copy(&driver, &reshaped, "people", "drop", false).unwrap();

        assert_eq!(outcome.action, ProvisionAction::Recreated);
        assert_eq!(count(&driver, "people"), 1);
    }

    #[test]
    fn test_empty_table_cannot_create() {
        let dir = tempdir().unwrap();
        let driver = SqliteDriver::new(SqliteConfig::new(dir.path().join("p.db")));

        let err = provision_then_copy(&driver, &people(0), "people", "fail", false).unwrap_err();
        assert!(matches!(err, DatabaseError::EmptyTable(_)));

        let exists = with_transaction(&driver, |conn| table_exists(conn, "people", false)).unwrap();
        assert!(!exists);
    }

    #[test]
    fn test_empty_table_appends_nothing() {
        let dir = tempdir().unwrap();
        let driver = SqliteDriver::new(SqliteConfig::new(dir.path().join("p.db")));

        provision_then_copy(&driver, &people(2), "people", "fail", false).unwrap();
        let outcome = provision_then_copy(&driver, &people(0), "people", "append", false).unwrap();
        assert_eq!(outcome.rows_copied, 0);
        assert_eq!(count(&driver, "people"), 2);
    }
}
