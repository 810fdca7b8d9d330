//! What to do when a copy destination already exists.

use crate::types::DatabaseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Policy applied when the destination table already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    /// Refuse with `DatabaseError::TableExists`
    #[default]
    Fail,
    /// Insert rows into the existing table
    Append,
    /// Drop and recreate from the incoming table's shape
    Drop,
    /// Delete every row, keep the existing definition
    Truncate,
}

impl IfExists {
    /// All accepted spellings.
    pub const VALUES: [&'static str; 4] = ["fail", "append", "drop", "truncate"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Append => "append",
            Self::Drop => "drop",
            Self::Truncate => "truncate",
        }
    }
}

impl fmt::Display for IfExists {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IfExists {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "append" => Ok(Self::Append),
            "drop" => Ok(Self::Drop),
            "truncate" => Ok(Self::Truncate),
            other => Err(DatabaseError::InvalidIfExists(other.to_string())),
        }
    }
}
