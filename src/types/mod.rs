//! Core data types.
//!
//! - `Value` / `Row`: typed cells as read from and written to SQLite
//! - `Params`: positional or named statement parameters
//! - `DatabaseError` / `Result`: error type for all operations

pub mod error;
pub mod params;
pub mod value;

pub use error::{DatabaseError, Result};
pub use params::Params;
pub use value::{parse_date, parse_timestamp, Row, Value, DATE_FORMAT, TIMESTAMP_FORMAT};
