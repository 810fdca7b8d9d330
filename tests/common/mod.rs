//! Shared helpers for integration tests.
//!
//! `ProbeDriver` wraps the SQLite driver and records every call that
//! reaches it, so tests can assert what was (or was not) sent to the store.
//! It can also fail a bulk load part-way through.

#![allow(dead_code)]

use percolate_sqlite::driver::{Connection, Cursor, Driver, ResultSet, SqliteDriver};
use percolate_sqlite::{DatabaseError, Params, Result, Row, SqliteConfig, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Call counters shared by every wrapper a `ProbeDriver` hands out.
#[derive(Default)]
pub struct Probe {
    pub connects: AtomicUsize,
    pub executes: AtomicUsize,
    pub bulk_loads: AtomicUsize,
    pub peak_fetch: AtomicUsize,
    pub statements: Mutex<Vec<String>>,
}

impl Probe {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn bulk_loads(&self) -> usize {
        self.bulk_loads.load(Ordering::SeqCst)
    }

    pub fn peak_fetch(&self) -> usize {
        self.peak_fetch.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// Statements that change schema or data.
    pub fn mutations(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|sql| {
                let head = sql.trim_start().to_ascii_uppercase();
                ["CREATE", "DROP", "DELETE", "INSERT", "UPDATE", "ALTER"]
                    .iter()
                    .any(|kw| head.starts_with(kw))
            })
            .collect()
    }

    fn record(&self, sql: &str) {
        self.statements.lock().unwrap().push(sql.to_string());
    }
}

/// SQLite driver wrapper that counts calls and can inject failures.
pub struct ProbeDriver {
    inner: SqliteDriver,
    pub probe: Arc<Probe>,
    fail_load_after: Option<usize>,
    transactional_ddl: bool,
}

impl ProbeDriver {
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            inner: SqliteDriver::new(config),
            probe: Arc::new(Probe::default()),
            fail_load_after: None,
            transactional_ddl: true,
        }
    }

    /// Fail every bulk load after `rows` rows have been inserted.
    pub fn failing_load_after(mut self, rows: usize) -> Self {
        self.fail_load_after = Some(rows);
        self
    }

    /// Report DDL as non-transactional.
    pub fn without_transactional_ddl(mut self) -> Self {
        self.transactional_ddl = false;
        self
    }
}

impl Driver for ProbeDriver {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ProbeConnection {
            inner: self.inner.connect()?,
            probe: self.probe.clone(),
            fail_load_after: self.fail_load_after,
        }))
    }

    fn supports_transactional_ddl(&self) -> bool {
        self.transactional_ddl
    }
}

struct ProbeConnection {
    inner: Box<dyn Connection>,
    probe: Arc<Probe>,
    fail_load_after: Option<usize>,
}

impl Connection for ProbeConnection {
    fn cursor(&self) -> Result<Box<dyn Cursor + '_>> {
        Ok(Box::new(ProbeCursor {
            inner: self.inner.cursor()?,
            probe: self.probe.clone(),
            fail_load_after: self.fail_load_after,
        }))
    }

    fn commit(&self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> Result<()> {
        self.inner.rollback()
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.inner.close()
    }
}

struct ProbeCursor<'c> {
    inner: Box<dyn Cursor + 'c>,
    probe: Arc<Probe>,
    fail_load_after: Option<usize>,
}

impl<'c> Cursor for ProbeCursor<'c> {
    fn execute<'a>(&'a mut self, sql: &str, params: &Params) -> Result<Box<dyn ResultSet + 'a>> {
        self.probe.executes.fetch_add(1, Ordering::SeqCst);
        self.probe.record(sql);
        let probe = self.probe.clone();
        let inner = self.inner.execute(sql, params)?;
        Ok(Box::new(ProbeResultSet { inner, probe }))
    }

    fn execute_many<'r>(
        &mut self,
        sql: &str,
        rows: &mut dyn Iterator<Item = &'r [Value]>,
    ) -> Result<usize> {
        self.probe.bulk_loads.fetch_add(1, Ordering::SeqCst);
        self.probe.record(sql);
        match self.fail_load_after {
            Some(limit) => {
                let mut head = rows.take(limit);
                self.inner.execute_many(sql, &mut head)?;
                Err(DatabaseError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "injected load failure",
                )))
            }
            None => self.inner.execute_many(sql, rows),
        }
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.inner.close()
    }
}

struct ProbeResultSet<'a> {
    inner: Box<dyn ResultSet + 'a>,
    probe: Arc<Probe>,
}

impl<'a> ResultSet for ProbeResultSet<'a> {
    fn description(&self) -> &[String] {
        self.inner.description()
    }

    fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>> {
        let batch = self.inner.fetch_many(size)?;
        self.probe.peak_fetch.fetch_max(batch.len(), Ordering::SeqCst);
        Ok(batch)
    }
}

/// Config for a fresh database file under `dir`.
pub fn config_in(dir: &Path) -> SqliteConfig {
    SqliteConfig::new(dir.join("test.db")).with_spool_dir(dir)
}

/// Two-column table of `n` rows starting at id `start`.
pub fn numbered(start: i64, n: i64) -> percolate_sqlite::Table {
    percolate_sqlite::Table::from_rows(
        ["id", "label"],
        (start..start + n).map(|i| vec![Value::Integer(i), Value::Text(format!("row-{}", i))]),
    )
    .unwrap()
}
