//! `rusqlite` implementation of the driver boundary.
//!
//! Transactions follow DB-API rules: a `BEGIN` is issued implicitly before
//! the first statement run in autocommit mode, and `commit`/`rollback` are
//! no-ops when nothing is open. Statements SQLite refuses inside a
//! transaction (`VACUUM`, `ATTACH`, `DETACH`, `PRAGMA`) run without one.
//!
//! SQLite stores dates and timestamps as text, so values read back are
//! converted according to the column's declared type (`DATE`, `TIMESTAMP`,
//! `DATETIME`, `BOOLEAN`).

use super::{Connection, Cursor, Driver, ResultSet};
use crate::config::SqliteConfig;
use crate::types::{parse_date, parse_timestamp, Params, Result, Row, Value, DATE_FORMAT, TIMESTAMP_FORMAT};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use std::time::Duration;
use tracing::debug;

/// Quote an identifier for use in SQL text.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Opens `rusqlite` connections from a [`SqliteConfig`].
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    config: SqliteConfig,
}

impl SqliteDriver {
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }
}

impl Driver for SqliteDriver {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        let conn = rusqlite::Connection::open(&self.config.path)?;
        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))?;

        for (schema, path) in &self.config.attached {
            let sql = format!("ATTACH DATABASE ?1 AS {}", quote_identifier(schema));
            conn.execute(&sql, [path.to_string_lossy()])?;
        }

        debug!(path = %self.config.path.display(), attached = self.config.attached.len(), "SQLite connection opened");
        Ok(Box::new(SqliteConnection { conn }))
    }
}

/// An open SQLite connection.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl Connection for SqliteConnection {
    fn cursor(&self) -> Result<Box<dyn Cursor + '_>> {
        Ok(Box::new(SqliteCursor {
            conn: &self.conn,
            stmt: None,
        }))
    }

    fn commit(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e.into())
    }
}

/// Cursor holding at most one prepared statement at a time.
pub struct SqliteCursor<'c> {
    conn: &'c rusqlite::Connection,
    stmt: Option<rusqlite::Statement<'c>>,
}

/// Statements that must run outside a transaction.
const NON_TRANSACTIONAL: [&str; 4] = ["VACUUM", "ATTACH", "DETACH", "PRAGMA"];

/// Whether `sql` gets an implicit `BEGIN` in autocommit mode.
fn opens_transaction(sql: &str) -> bool {
    let keyword: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    !NON_TRANSACTIONAL
        .iter()
        .any(|k| k.eq_ignore_ascii_case(&keyword))
}

impl<'c> SqliteCursor<'c> {
    fn begin_if_needed(&self, sql: &str) -> Result<()> {
        if self.conn.is_autocommit() && opens_transaction(sql) {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

impl<'c> Cursor for SqliteCursor<'c> {
    fn execute<'a>(&'a mut self, sql: &str, params: &Params) -> Result<Box<dyn ResultSet + 'a>> {
        self.begin_if_needed(sql)?;

        let conn = self.conn;
        let stmt = self.stmt.insert(conn.prepare(sql)?);
        bind_params(stmt, params)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        if columns.is_empty() {
            let changed = stmt.raw_execute()?;
            debug!(changed, "Statement executed without result set");
            return Ok(Box::new(SqliteResultSet {
                columns,
                kinds: Vec::new(),
                rows: None,
            }));
        }

        let kinds = stmt
            .columns()
            .iter()
            .map(|c| DeclaredKind::from_decl_type(c.decl_type()))
            .collect();

        Ok(Box::new(SqliteResultSet {
            columns,
            kinds,
            rows: Some(stmt.raw_query()),
        }))
    }

    fn execute_many<'r>(
        &mut self,
        sql: &str,
        rows: &mut dyn Iterator<Item = &'r [Value]>,
    ) -> Result<usize> {
        self.begin_if_needed(sql)?;
        self.stmt = None;

        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut executed = 0;
        for row in rows {
            stmt.execute(rusqlite::params_from_iter(row.iter()))?;
            executed += 1;
        }
        Ok(executed)
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        if let Some(stmt) = self.stmt.take() {
            stmt.finalize()?;
        }
        Ok(())
    }
}

fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &Params) -> Result<()> {
    let expected = stmt.parameter_count();
    match params {
        Params::None => {
            if expected != 0 {
                return Err(rusqlite::Error::InvalidParameterCount(0, expected).into());
            }
        }
        Params::Positional(values) => {
            if values.len() != expected {
                return Err(rusqlite::Error::InvalidParameterCount(values.len(), expected).into());
            }
            for (i, value) in values.iter().enumerate() {
                stmt.raw_bind_parameter(i + 1, value)?;
            }
        }
        Params::Named(pairs) => {
            let mut bound = vec![false; expected + 1];
            for (name, value) in pairs {
                let key = if name.starts_with([':', '@', '$']) {
                    name.clone()
                } else {
                    format!(":{}", name)
                };
                let index = stmt
                    .parameter_index(&key)?
                    .ok_or_else(|| rusqlite::Error::InvalidParameterName(key.clone()))?;
                stmt.raw_bind_parameter(index, value)?;
                bound[index] = true;
            }
            if let Some(missing) = (1..=expected).find(|i| !bound[*i]) {
                let name = stmt
                    .parameter_name(missing)
                    .map_or_else(|| format!("?{}", missing), String::from);
                return Err(rusqlite::Error::InvalidParameterName(name).into());
            }
        }
    }
    Ok(())
}

/// Value conversion hint taken from a column's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclaredKind {
    Plain,
    Boolean,
    Date,
    Timestamp,
}

impl DeclaredKind {
    fn from_decl_type(decl: Option<&str>) -> Self {
        let Some(decl) = decl else {
            return Self::Plain;
        };
        let decl = decl.to_ascii_uppercase();
        if decl.contains("TIMESTAMP") || decl.contains("DATETIME") {
            Self::Timestamp
        } else if decl == "DATE" {
            Self::Date
        } else if decl.starts_with("BOOL") {
            Self::Boolean
        } else {
            Self::Plain
        }
    }

    fn convert(self, value: ValueRef<'_>) -> Result<Value> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i @ (0 | 1)) if self == Self::Boolean => Value::Boolean(i == 1),
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(rusqlite::Error::Utf8Error)?;
                let parsed = match self {
                    Self::Timestamp => parse_timestamp(text).map(Value::Timestamp),
                    Self::Date => parse_date(text).map(Value::Date),
                    _ => None,
                };
                parsed.unwrap_or_else(|| Value::Text(text.to_string()))
            }
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        })
    }
}

/// Rows of one executed statement.
struct SqliteResultSet<'a> {
    columns: Vec<String>,
    kinds: Vec<DeclaredKind>,
    rows: Option<rusqlite::Rows<'a>>,
}

impl<'a> ResultSet for SqliteResultSet<'a> {
    fn description(&self) -> &[String] {
        &self.columns
    }

    fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::with_capacity(size.min(1024));
        while batch.len() < size {
            let Some(row) = rows.next()? else {
                break;
            };
            let mut values = Vec::with_capacity(self.kinds.len());
            for (i, kind) in self.kinds.iter().enumerate() {
                values.push(kind.convert(row.get_ref(i)?)?);
            }
            batch.push(values);
        }
        Ok(batch)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format(DATE_FORMAT).to_string())),
            Value::Timestamp(ts) => {
                ToSqlOutput::Owned(SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()))
            }
        })
    }
}
