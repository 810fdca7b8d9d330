//! Qualified names and table/view existence checks.
//!
//! Names are `schema.table` or bare `table`. The schema defaults to
//! `public`, which denotes SQLite's `main` database; any other schema
//! denotes an attached database of that name. Lookups are always
//! schema-qualified so an object in one schema never answers for another.

use crate::config::DEFAULT_SCHEMA;
use crate::driver::{quote_identifier, Connection, Cursor};
use crate::otel::{db_span, DbOperation};
use crate::scope::with_cursor;
use crate::types::{DatabaseError, Params, Result, Value};
use std::fmt;
use tracing::debug;

/// SQLite's name for the primary database.
const SQLITE_MAIN: &str = "main";

/// A table name split into schema and local name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    /// Split `raw` on the first `.`; a bare name gets the default schema.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidName` if either part is empty
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (schema, name) = match raw.split_once('.') {
            Some((schema, name)) => (schema.trim(), name.trim()),
            None => (DEFAULT_SCHEMA, raw),
        };
        if schema.is_empty() || name.is_empty() {
            return Err(DatabaseError::InvalidName(raw.to_string()));
        }
        Ok(Self {
            schema: schema.to_string(),
            name: name.to_string(),
        })
    }

    /// Schema name as SQLite knows it.
    pub fn sqlite_schema(&self) -> &str {
        if self.schema.eq_ignore_ascii_case(DEFAULT_SCHEMA) {
            SQLITE_MAIN
        } else {
            &self.schema
        }
    }

    /// Quoted `"schema"."name"` for use in SQL text.
    pub fn to_sql(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(self.sqlite_schema()),
            quote_identifier(&self.name)
        )
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Check whether `name` is an existing table (or view) on `conn`.
///
/// # Arguments
///
/// * `conn` - Open connection; the probe runs inside its transaction
/// * `name` - `schema.table` or bare `table`
/// * `check_views` - Also count views with this name
///
/// # Returns
///
/// `true` if the combined catalog count is at least one. A schema that is
/// not attached yields `false`.
pub fn table_exists(conn: &dyn Connection, name: &str, check_views: bool) -> Result<bool> {
    qualified_table_exists(conn, &QualifiedName::parse(name)?, check_views)
}

/// [`table_exists`] for an already parsed name.
pub fn qualified_table_exists(
    conn: &dyn Connection,
    qualified: &QualifiedName,
    check_views: bool,
) -> Result<bool> {
    let span = db_span(DbOperation::Exists, &qualified.to_string());
    let _guard = span.enter();

    with_cursor(conn, |cursor| {
        let schema = qualified.sqlite_schema();
        if !schema_attached(cursor, schema)? {
            debug!(schema, "Schema not attached");
            return Ok(false);
        }

        let mut count = catalog_count(cursor, qualified, "table")?;
        if check_views {
            count += catalog_count(cursor, qualified, "view")?;
        }

        debug!(table = %qualified, count, "Catalog lookup");
        Ok(count >= 1)
    })
}

fn schema_attached(cursor: &mut dyn Cursor, schema: &str) -> Result<bool> {
    if schema.eq_ignore_ascii_case(SQLITE_MAIN) || schema.eq_ignore_ascii_case("temp") {
        return Ok(true);
    }
    let count = count_query(
        cursor,
        "SELECT count(*) FROM pragma_database_list WHERE lower(name) = lower(:schema)",
        &Params::named([("schema", schema)]),
    )?;
    Ok(count >= 1)
}

fn catalog_count(cursor: &mut dyn Cursor, qualified: &QualifiedName, kind: &str) -> Result<i64> {
    let sql = format!(
        "SELECT count(*) FROM {}.sqlite_master WHERE type = :type AND lower(name) = lower(:name)",
        quote_identifier(qualified.sqlite_schema())
    );
    count_query(
        cursor,
        &sql,
        &Params::named([("type", kind), ("name", qualified.name.as_str())]),
    )
}

fn count_query(cursor: &mut dyn Cursor, sql: &str, params: &Params) -> Result<i64> {
    let mut result = cursor.execute(sql, params)?;
    let batch = result.fetch_many(1)?;
    match batch.first().and_then(|row| row.first()) {
        Some(Value::Integer(n)) => Ok(*n),
        other => Err(DatabaseError::validation(format!(
            "Expected a count, got {:?}",
            other
        ))),
    }
}
