//! Error types for rollcall

use crate::value::BindError;
use std::error::Error as _;
use thiserror::Error;

/// Result type alias for rollcall operations
pub type DbResult<T> = Result<T, DbError>;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Error types for database and validation-rule operations
#[derive(Debug, Error)]
pub enum DbError {
    /// The database is unreachable or rejected the credentials. Never retried.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement could not be built or the driver rejected it.
    ///
    /// Carries the rendered SQL (with `?` placeholders) and the driver message.
    /// Only surfaced verbatim in development mode.
    #[error("Query error: {message} (sql: {sql})")]
    Query {
        sql: String,
        message: String,
        code: Option<String>,
    },

    /// A bound value could not be converted to the type the server expects for
    /// its placeholder, e.g. `"abc"` compared against an integer column.
    ///
    /// Raised client-side before the statement is sent.
    #[error("Bind error: {message} (sql: {sql})")]
    Bind { sql: String, message: String },

    /// A statement failed in production mode. Details were logged, not returned.
    #[error("Query failed")]
    QueryFailed { code: Option<String> },

    /// Nested `begin_transaction`, or `commit`/`roll_back` without an open transaction.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A validation rule string could not be parsed.
    #[error("Invalid validation rule: {0}")]
    InvalidRule(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Create a query error for a rendered statement.
    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            sql: sql.into(),
            message: message.into(),
            code: None,
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-rule error
    pub fn invalid_rule(message: impl Into<String>) -> Self {
        Self::InvalidRule(message.into())
    }

    /// Whether this error came from running (or rendering) a statement,
    /// in either error mode.
    pub fn is_query_failure(&self) -> bool {
        matches!(
            self,
            Self::Query { .. } | Self::QueryFailed { .. } | Self::Bind { .. }
        )
    }

    /// Whether a bound value could not be converted to its parameter type.
    pub fn is_bind_failure(&self) -> bool {
        matches!(self, Self::Bind { .. })
    }

    /// The SQLSTATE reported by the server, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Query { code, .. } | Self::QueryFailed { code } => code.as_deref(),
            _ => None,
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate() == Some(UNIQUE_VIOLATION)
    }

    /// Check if this is a foreign key violation error
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate() == Some(FOREIGN_KEY_VIOLATION)
    }

    /// Map a tokio_postgres error raised while running `sql`.
    ///
    /// A closed connection becomes [`DbError::Connection`] and a value that could not
    /// be encoded becomes [`DbError::Bind`]. Everything else is a [`DbError::Query`]
    /// carrying the server message and SQLSTATE when present.
    pub fn from_db_error(err: tokio_postgres::Error, sql: &str) -> Self {
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        if let Some(bind) = err.source().and_then(|s| s.downcast_ref::<BindError>()) {
            return Self::Bind {
                sql: sql.to_string(),
                message: bind.to_string(),
            };
        }

        match err.as_db_error() {
            Some(db_err) => {
                let message = match db_err.detail() {
                    Some(detail) => format!("{} ({detail})", db_err.message()),
                    None => db_err.message().to_string(),
                };
                Self::Query {
                    sql: sql.to_string(),
                    message,
                    code: Some(db_err.code().code().to_string()),
                }
            }
            None => Self::query(sql, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_display_includes_sql() {
        let err = DbError::query("SELECT * FROM users WHERE id = ?", "boom");
        assert_eq!(
            err.to_string(),
            "Query error: boom (sql: SELECT * FROM users WHERE id = ?)"
        );
        assert!(err.is_query_failure());
    }

    #[test]
    fn query_failed_hides_sql() {
        let err = DbError::QueryFailed {
            code: Some(UNIQUE_VIOLATION.to_string()),
        };
        assert_eq!(err.to_string(), "Query failed");
        assert!(err.is_unique_violation());
        assert!(!err.is_foreign_key_violation());
    }

    #[test]
    fn bind_errors_are_query_failures_without_sqlstate() {
        let err = DbError::Bind {
            sql: "SELECT * FROM classes WHERE id = ?".into(),
            message: "cannot bind text 'abc' to a parameter of type int4".into(),
        };
        assert!(err.is_bind_failure());
        assert!(err.is_query_failure());
        assert_eq!(err.sqlstate(), None);
        assert!(!DbError::query("SELECT 1", "boom").is_bind_failure());
    }

    #[test]
    fn non_query_errors_have_no_sqlstate() {
        let err = DbError::Transaction("no active transaction".into());
        assert_eq!(err.sqlstate(), None);
        assert!(!err.is_query_failure());
    }
}
