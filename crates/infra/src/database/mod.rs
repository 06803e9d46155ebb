//! SQLite persistence layer
//!
//! One repository per core port, all sharing the pooled [`DbManager`].
//! Multi-row writes are funnelled through
//! [`SqliteAllocationRepository::apply`], which executes an entire
//! [`crewplan_domain::types::AllocationWriteBatch`] inside one transaction.

pub mod allocation_repository;
pub mod employee_repository;
pub mod manager;
pub mod project_repository;
pub mod task_repository;

pub use manager::DbManager;

use chrono::NaiveDate;

/// Serialize a date for storage (ISO `YYYY-MM-DD`, lexicographically
/// ordered, which the range index relies on).
pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a stored date, surfacing malformed values as column conversion
/// failures.
pub(crate) fn date_from_sql(value: String, column_index: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            column_index,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })
}

/// Deserialize a JSON column, surfacing malformed values as column
/// conversion failures.
pub(crate) fn json_from_sql<T: serde::de::DeserializeOwned>(
    value: String,
    column_index: usize,
) -> rusqlite::Result<T> {
    serde_json::from_str(&value).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            column_index,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })
}
