//! Integration tests for schema-qualified existence checks.

mod common;

use common::{config_in, numbered};
use percolate_sqlite::catalog::table_exists;
use percolate_sqlite::{DatabaseError, Params, Sqlite};
use tempfile::tempdir;

fn with_other_schema(dir: &std::path::Path) -> Sqlite {
    let config = config_in(dir).attach("other", dir.join("other.db"));
    Sqlite::new(config).unwrap()
}

#[test]
fn test_schemas_are_independent() {
    let dir = tempdir().unwrap();
    let db = with_other_schema(dir.path());

    db.copy(&numbered(0, 1), "public.foo", "fail", false).unwrap();

    assert!(db.table_exists("public.foo", false).unwrap());
    assert!(db.table_exists("foo", false).unwrap());
    assert!(!db.table_exists("other.foo", false).unwrap());

    db.copy(&numbered(0, 1), "other.foo", "fail", false).unwrap();
    db.table("public.foo").unwrap().drop().unwrap();

    assert!(!db.table_exists("public.foo", false).unwrap());
    assert!(db.table_exists("other.foo", false).unwrap());
}

#[test]
fn test_unattached_schema_is_missing() {
    let dir = tempdir().unwrap();
    let db = Sqlite::new(config_in(dir.path())).unwrap();
    db.copy(&numbered(0, 1), "foo", "fail", false).unwrap();

    assert!(!db.table_exists("nowhere.foo", false).unwrap());
}

#[test]
fn test_views_only_count_when_requested() {
    let dir = tempdir().unwrap();
    let db = Sqlite::new(config_in(dir.path())).unwrap();
    db.copy(&numbered(0, 2), "foo", "fail", false).unwrap();
    db.execute("CREATE VIEW foo_view AS SELECT id FROM foo", &Params::None)
        .unwrap();

    assert!(!db.table_exists("foo_view", false).unwrap());
    assert!(db.table_exists("foo_view", true).unwrap());
    assert!(db.table_exists("public.foo_view", true).unwrap());
    assert!(db.table_exists("foo", true).unwrap());
}

#[test]
fn test_lookup_ignores_case() {
    let dir = tempdir().unwrap();
    let db = Sqlite::new(config_in(dir.path())).unwrap();
    db.copy(&numbered(0, 1), "Events", "fail", false).unwrap();

    assert!(db.table_exists("events", false).unwrap());
    assert!(db.table_exists("PUBLIC.EVENTS", false).unwrap());
}

#[test]
fn test_probe_runs_on_callers_connection() {
    let dir = tempdir().unwrap();
    let db = Sqlite::new(config_in(dir.path())).unwrap();

    let seen = db
        .transaction(|conn| {
            db.query_with_connection("CREATE TABLE pending (id integer)", conn, &Params::None, false)?;
            table_exists(conn, "pending", false)
        })
        .unwrap();
    assert!(seen);
}

#[test]
fn test_malformed_name_rejected() {
    let dir = tempdir().unwrap();
    let db = Sqlite::new(config_in(dir.path())).unwrap();

    assert!(matches!(
        db.table_exists("other.", false),
        Err(DatabaseError::InvalidName(_))
    ));
}
