//! Error types for sqlrecord

use thiserror::Error;

/// Result type alias for sqlrecord operations
pub type OrmResult<T> = Result<T, OrmError>;

/// SQLSTATE raised when a serializable transaction cannot be ordered.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE raised when the server breaks a deadlock by aborting a transaction.
const DEADLOCK_DETECTED: &str = "40P01";

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error reported by tokio-postgres
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Error reported by a driver in terms of a SQLSTATE code
    #[error("Database error [{code}]: {message}")]
    Database { code: String, message: String },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// More rows than the caller allowed for
    #[error("Too many rows: expected {expected}, got {got}")]
    TooManyRows { expected: usize, got: usize },

    /// INSERT/UPDATE/DELETE touched an unexpected number of rows
    #[error("Expected {expected} affected row(s), got {got}: {sql}")]
    RowCount { expected: u64, got: u64, sql: String },

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Concurrent transactions could not be serialized; the transaction may be retried
    #[error("Serialization conflict: {0}")]
    SerializationConflict(String),

    /// `transaction_with_retry` gave up
    #[error("Transaction failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<OrmError>,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Validation error (malformed query or invalid arguments), raised before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record mapping is misconfigured
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Transaction state misuse (nested start, commit without begin, ...)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a too-many-rows error
    pub fn too_many_rows(expected: usize, got: usize) -> Self {
        Self::TooManyRows { expected, got }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a mapping error
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a too-many-rows error
    pub fn is_too_many_rows(&self) -> bool {
        matches!(self, Self::TooManyRows { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Whether this error is (or wraps) a serialization/rollback-class conflict.
    pub fn is_serialization_conflict(&self) -> bool {
        match self {
            Self::SerializationConflict(_) => true,
            Self::Database { code, .. } => is_conflict_code(code),
            Self::Query(err) => err
                .code()
                .is_some_and(|state| is_conflict_code(state.code())),
            Self::RetriesExhausted { source, .. } => source.is_serialization_conflict(),
            _ => false,
        }
    }

    /// Classify a driver error by its SQLSTATE code.
    ///
    /// Drivers other than tokio-postgres use this to report failures with the same
    /// taxonomy as [`OrmError::from_db_error`].
    pub fn from_sqlstate(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "23505" => Self::UniqueViolation(message),
            "23503" => Self::ForeignKeyViolation(message),
            "23514" => Self::CheckViolation(message),
            SERIALIZATION_FAILURE | DEADLOCK_DETECTED => Self::SerializationConflict(message),
            _ => Self::Database {
                code: code.to_string(),
                message,
            },
        }
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                code if is_conflict_code(code) => {
                    return Self::SerializationConflict(message.to_string());
                }
                _ => {}
            }
        }
        Self::Query(err)
    }
}

fn is_conflict_code(code: &str) -> bool {
    code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_classification() {
        assert!(OrmError::from_sqlstate("23505", "dup").is_unique_violation());
        assert!(OrmError::from_sqlstate("40001", "x").is_serialization_conflict());
        assert!(OrmError::from_sqlstate("40P01", "x").is_serialization_conflict());
        assert!(!OrmError::from_sqlstate("42P01", "no table").is_serialization_conflict());
    }

    #[test]
    fn exhausted_retries_wrap_the_conflict() {
        let err = OrmError::RetriesExhausted {
            attempts: 3,
            source: Box::new(OrmError::SerializationConflict("busy".into())),
        };
        assert!(err.is_serialization_conflict());
        assert_eq!(
            err.to_string(),
            "Transaction failed after 3 attempt(s): Serialization conflict: busy"
        );
        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("Serialization conflict: busy"));
    }

    #[test]
    fn cardinality_errors_are_distinct() {
        let none = OrmError::not_found("person 7");
        let many = OrmError::too_many_rows(1, 3);
        assert!(none.is_not_found() && !none.is_too_many_rows());
        assert!(many.is_too_many_rows() && !many.is_not_found());
    }
}
