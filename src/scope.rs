//! Transaction and cursor scopes.
//!
//! Both scopes hand a resource to a closure and release it on every exit
//! path before the closure's result is returned:
//!
//! - [`with_transaction`]: connect, run, then exactly one `commit` (on `Ok`)
//!   or one `rollback` (on `Err`), then always `close`
//! - [`with_cursor`]: open a cursor, run, then always close it; never
//!   commits or rolls back
//!
//! When the closure fails and releasing also fails, the closure's error is
//! returned and the release failure is logged. When only releasing fails,
//! that error is returned.

use crate::driver::{Connection, Cursor, Driver};
use crate::types::Result;
use tracing::{debug, warn};

/// Run `f` inside a transaction on a fresh connection.
///
/// # Arguments
///
/// * `driver` - Opens the connection owned by this scope
/// * `f` - Work to run; `Err` triggers a rollback
///
/// # Example
///
/// ```rust,ignore
/// let count = with_transaction(&driver, |conn| {
///     with_cursor(conn, |cursor| { /* ... */ Ok(1) })
/// })?;
/// ```
pub fn with_transaction<T, F>(driver: &dyn Driver, f: F) -> Result<T>
where
    F: FnOnce(&dyn Connection) -> Result<T>,
{
    let conn = driver.connect()?;

    let outcome = match f(conn.as_ref()) {
        Ok(value) => conn.commit().map(|()| {
            debug!("Transaction committed");
            value
        }),
        Err(err) => {
            match conn.rollback() {
                Ok(()) => debug!(error = %err, "Transaction rolled back"),
                Err(rollback_err) => warn!(
                    error = %err,
                    rollback_error = %rollback_err,
                    "Rollback failed"
                ),
            }
            Err(err)
        }
    };

    release(outcome, conn.close(), "connection")
}

/// Run `f` with a cursor on `conn`, closing it afterwards.
pub fn with_cursor<T, F>(conn: &dyn Connection, f: F) -> Result<T>
where
    F: FnOnce(&mut dyn Cursor) -> Result<T>,
{
    let mut cursor = conn.cursor()?;
    let outcome = f(&mut *cursor);
    release(outcome, cursor.close(), "cursor")
}

fn release<T>(outcome: Result<T>, closed: Result<()>, resource: &str) -> Result<T> {
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(resource, error = %close_err, "Close failed after error");
            Err(err)
        }
    }
}
