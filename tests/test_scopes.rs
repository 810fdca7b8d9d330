//! Integration tests for transaction and cursor scopes.

mod common;

use common::{config_in, ProbeDriver};
use percolate_sqlite::scope::{with_cursor, with_transaction};
use percolate_sqlite::{DatabaseError, Params, Result, Sqlite};
use tempfile::tempdir;

#[test]
fn test_each_scope_uses_one_connection() {
    let dir = tempdir().unwrap();
    let driver = ProbeDriver::new(config_in(dir.path()));

    with_transaction(&driver, |conn| {
        with_cursor(conn, |cursor| {
            cursor.execute("CREATE TABLE t (id integer)", &Params::None)?;
            Ok(())
        })?;
        with_cursor(conn, |cursor| {
            cursor.execute("INSERT INTO t VALUES (1)", &Params::None)?;
            Ok(())
        })
    })
    .unwrap();

    assert_eq!(driver.probe.connects(), 1);
    assert_eq!(driver.probe.executes(), 2);
}

#[test]
fn test_usage_error_rolls_back_earlier_work() {
    let dir = tempdir().unwrap();
    let driver = ProbeDriver::new(config_in(dir.path()));
    let db = Sqlite::new(config_in(dir.path())).unwrap();
    db.execute("CREATE TABLE t (id integer)", &Params::None).unwrap();

    let result: Result<()> = with_transaction(&driver, |conn| {
        with_cursor(conn, |cursor| {
            cursor.execute("INSERT INTO t VALUES (1)", &Params::None)?;
            Err(DatabaseError::validation("stop"))
        })
    });

    assert!(matches!(result, Err(DatabaseError::ValidationError(ref m)) if m == "stop"));
    assert_eq!(db.table("t").unwrap().num_rows().unwrap(), 0);
}

#[test]
fn test_connect_failure_surfaces() {
    let dir = tempdir().unwrap();
    let config = percolate_sqlite::SqliteConfig::new(dir.path().join("missing").join("x.db"));
    let driver = ProbeDriver::new(config);

    let result: Result<()> = with_transaction(&driver, |_| Ok(()));
    assert!(matches!(result, Err(DatabaseError::Driver(_))));
}
