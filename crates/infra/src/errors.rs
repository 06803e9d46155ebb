//! Conversions from store errors into domain errors.

use crewplan_domain::ScheduleError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can
/// be converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ScheduleError);

impl From<InfraError> for ScheduleError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ScheduleError> for InfraError {
    fn from(value: ScheduleError) -> Self {
        InfraError(value)
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let mapped = match value {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => {
                        ScheduleError::Persistence("database is busy".into())
                    }
                    ErrorCode::DatabaseLocked => {
                        ScheduleError::Persistence("database is locked".into())
                    }
                    ErrorCode::ConstraintViolation => ScheduleError::Persistence(format!(
                        "constraint violation (code {}): {}",
                        err.extended_code, message
                    )),
                    _ => ScheduleError::Persistence(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                ScheduleError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                ScheduleError::Persistence(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                ScheduleError::Persistence(format!("invalid column type: {ty}"))
            }
            RE::InvalidQuery => ScheduleError::Persistence("invalid SQL query".into()),
            other => ScheduleError::Persistence(other.to_string()),
        };
        InfraError(mapped)
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(ScheduleError::Persistence(format!(
            "connection pool error: {value}"
        )))
    }
}

/// Map a blocking-task join failure into a domain error.
pub fn map_join_error(err: tokio::task::JoinError) -> ScheduleError {
    if err.is_cancelled() {
        ScheduleError::Internal("blocking repository task cancelled".into())
    } else {
        ScheduleError::Internal(format!("blocking repository task failed: {err}"))
    }
}
