//! Column type inference and DDL for new destination tables.
//!
//! Each column's type comes from its first non-null value. Text columns are
//! sized from the longest rendered value: the exact length when
//! `strict_length` is set, otherwise the next step of [`VARCHAR_STEPS`].

use crate::catalog::QualifiedName;
use crate::driver::quote_identifier;
use crate::table::Table;
use crate::types::{DatabaseError, Result, Value};

/// Widths used when rounding text columns up.
pub const VARCHAR_STEPS: [usize; 11] = [
    32, 64, 128, 256, 512, 1024, 4096, 8192, 16384, 32768, 65535,
];

/// Inferred storage type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Boolean,
    Float,
    Date,
    Datetime,
    Blob,
    Varchar(usize),
}

impl ColumnType {
    /// Declared type as written in `CREATE TABLE`.
    pub fn to_sql(&self) -> String {
        match self {
            Self::Integer => "integer".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Float => "float".to_string(),
            Self::Date => "date".to_string(),
            Self::Datetime => "datetime".to_string(),
            Self::Blob => "blob".to_string(),
            Self::Varchar(width) => format!("varchar({})", width),
        }
    }
}

/// Round `len` up to the nearest step; lengths past the last step are kept.
pub fn round_varchar(len: usize) -> usize {
    VARCHAR_STEPS
        .iter()
        .copied()
        .find(|step| *step >= len)
        .unwrap_or(len)
}

/// Infer the type of column `index` of `table`.
///
/// A column whose values are all null is treated as text.
pub fn infer_column(table: &Table, index: usize, strict_length: bool) -> ColumnType {
    let first = table
        .rows()
        .iter()
        .map(|row| &row[index])
        .find(|value| !value.is_null());

    match first {
        Some(Value::Integer(_)) => ColumnType::Integer,
        Some(Value::Boolean(_)) => ColumnType::Boolean,
        Some(Value::Real(_)) => ColumnType::Float,
        Some(Value::Date(_)) => ColumnType::Date,
        Some(Value::Timestamp(_)) => ColumnType::Datetime,
        Some(Value::Blob(_)) => ColumnType::Blob,
        Some(Value::Text(_)) | Some(Value::Null) | None => {
            let longest = table
                .rows()
                .iter()
                .map(|row| row[index].rendered_len())
                .max()
                .unwrap_or(0);
            if strict_length {
                ColumnType::Varchar(longest.max(1))
            } else {
                ColumnType::Varchar(round_varchar(longest))
            }
        }
    }
}

/// Build `CREATE TABLE` for `table` at `destination`.
///
/// # Errors
///
/// Returns `DatabaseError::EmptyTable` if `table` has no rows, since types
/// cannot be inferred from nothing, and `DatabaseError::ValidationError` if
/// it has no columns
pub fn create_statement(
    table: &Table,
    destination: &QualifiedName,
    strict_length: bool,
) -> Result<String> {
    if table.is_empty() {
        return Err(DatabaseError::EmptyTable(destination.to_string()));
    }
    if table.columns().is_empty() {
        return Err(DatabaseError::validation(format!(
            "Cannot create {} without columns",
            destination
        )));
    }

    let definitions: Vec<String> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                "{} {}",
                quote_identifier(name),
                infer_column(table, i, strict_length).to_sql()
            )
        })
        .collect();

    Ok(format!(
        "CREATE TABLE {} ({})",
        destination.to_sql(),
        definitions.join(", ")
    ))
}

/// Build the `INSERT` used to load `columns` into `destination`, matching
/// columns by name.
pub fn insert_statement(columns: &[String], destination: &QualifiedName) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        destination.to_sql(),
        names.join(", "),
        placeholders
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn name(raw: &str) -> QualifiedName {
        QualifiedName::parse(raw).unwrap()
    }

    #[test]
    fn test_round_varchar() {
        assert_eq!(round_varchar(0), 32);
        assert_eq!(round_varchar(32), 32);
        assert_eq!(round_varchar(33), 64);
        assert_eq!(round_varchar(1025), 4096);
        assert_eq!(round_varchar(65535), 65535);
        assert_eq!(round_varchar(70000), 70000);
    }

    #[test]
    fn test_infer_from_first_non_null() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let table = Table::from_rows(
            ["id", "score", "day", "at", "flag", "raw"],
            vec![
                vec![
                    Value::Null,
                    Value::Null,
                    Value::Date(date),
                    Value::Timestamp(date.and_hms_opt(1, 2, 3).unwrap()),
                    Value::Boolean(true),
                    Value::Blob(vec![1, 2]),
                ],
                vec![
                    Value::Integer(1),
                    Value::Real(0.5),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Null,
                ],
            ],
        )
        .unwrap();

        let types: Vec<ColumnType> = (0..6).map(|i| infer_column(&table, i, false)).collect();
        assert_eq!(
            types,
            [
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::Date,
                ColumnType::Datetime,
                ColumnType::Boolean,
                ColumnType::Blob,
            ]
        );
    }

    #[test]
    fn test_text_width_rounding_and_strict() {
        let long = "x".repeat(40);
        let table = Table::from_rows(
            ["name"],
            vec![vec![Value::from("ab")], vec![Value::from(long.as_str())], vec![Value::Null]],
        )
        .unwrap();

        assert_eq!(infer_column(&table, 0, false), ColumnType::Varchar(64));
        assert_eq!(infer_column(&table, 0, true), ColumnType::Varchar(40));
    }

    #[test]
    fn test_all_null_column_is_text() {
        let table = Table::from_rows(["note"], vec![vec![Value::Null]]).unwrap();
        assert_eq!(infer_column(&table, 0, false), ColumnType::Varchar(32));
        assert_eq!(infer_column(&table, 0, true), ColumnType::Varchar(1));
    }

    #[test]
    fn test_create_statement() {
        let table = Table::from_rows(
            ["id", "label"],
            vec![vec![Value::Integer(1), Value::from("one")]],
        )
        .unwrap();

        let sql = create_statement(&table, &name("other.items"), true).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"other\".\"items\" (\"id\" integer, \"label\" varchar(3))"
        );
    }

    #[test]
    fn test_create_statement_rejects_empty_table() {
        let table = Table::from_rows(["id"], Vec::<Vec<Value>>::new()).unwrap();
        assert!(matches!(
            create_statement(&table, &name("items"), false),
            Err(DatabaseError::EmptyTable(t)) if t == "public.items"
        ));
    }

    #[test]
    fn test_insert_statement_names_columns() {
        let sql = insert_statement(&["b".to_string(), "a".to_string()], &name("items"));
        assert_eq!(
            sql,
            "INSERT INTO \"main\".\"items\" (\"b\", \"a\") VALUES (?, ?)"
        );
    }

    proptest! {
        #[test]
        fn prop_varchar_fits_longest_value(lens in proptest::collection::vec(0usize..70_000, 1..8)) {
            let rows = lens.iter().map(|n| vec![Value::Text("a".repeat(*n))]);
            let table = Table::from_rows(["text"], rows).unwrap();
            let longest = *lens.iter().max().unwrap();

            let ColumnType::Varchar(loose) = infer_column(&table, 0, false) else {
                panic!("text column inferred as non-text");
            };
            prop_assert!(loose >= longest);
            prop_assert!(VARCHAR_STEPS.contains(&loose) || loose == longest);
            prop_assert_eq!(infer_column(&table, 0, true), ColumnType::Varchar(longest.max(1)));
        }
    }
}
