use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("database query error: {0}")]
    Query(String),
    #[error("database migration error: {0}")]
    Migration(String),
    /// The transaction lost a race with a concurrent writer and can be retried.
    #[error("database transaction conflict: {0}")]
    Conflict(String),
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
}

impl From<diesel::result::Error> for DatabaseError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DatabaseError::UniqueViolation(info.message().to_string())
            }
            Error::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
                DatabaseError::Conflict(info.message().to_string())
            }
            Error::DatabaseError(_, info) if is_busy_message(info.message()) => {
                DatabaseError::Conflict(info.message().to_string())
            }
            other => DatabaseError::Query(other.to_string()),
        }
    }
}

// SQLite reports lock contention as a generic error carrying SQLITE_BUSY text.
fn is_busy_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("database is locked") || message.contains("database is busy")
}

#[cfg(test)]
mod tests {
    use super::{DatabaseError, is_busy_message};

    #[test]
    fn busy_messages_are_detected() {
        assert!(is_busy_message("database is locked"));
        assert!(is_busy_message("Database Is Busy"));
        assert!(!is_busy_message("no such table: account_links"));
    }

    #[test]
    fn not_found_maps_to_query_error() {
        let err = DatabaseError::from(diesel::result::Error::NotFound);
        assert!(matches!(err, DatabaseError::Query(_)));
    }
}
