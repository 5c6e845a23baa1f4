//! Error types for dualdb.
//!
//! This module defines all error types using `thiserror`. Every failure is
//! surfaced to the immediate caller; nothing in this crate retries or swallows
//! an error.

use crate::models::QueryParam;
use thiserror::Error;

/// Numeric code for a rejected statement verb or shape.
pub const INVALID_QUERY: u32 = 10000;
/// Numeric code for a parameter arity or type mismatch.
pub const INVALID_PARAMS: u32 = 10010;
/// Numeric code for any failure reported by the database driver.
pub const DRIVER_FAILURE: u32 = 10020;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error("Statement failed: {message}")]
    Statement {
        message: String,
        /// Offending SQL text, as submitted
        sql: String,
        params: Vec<QueryParam>,
        /// e.g., "42S02" for an unknown table on MySQL
        sql_state: Option<String>,
    },

    #[error("Connection failed: {message}")]
    Driver { message: String, suggestion: String },

    #[error("Schema error: {message}")]
    Schema {
        message: String,
        /// Table concerned; empty for schema-file errors
        table: String,
    },
}

impl DbError {
    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create an invalid parameters error.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Create a statement failure carrying the SQL and parameters.
    pub fn statement(
        message: impl Into<String>,
        sql: impl Into<String>,
        params: &[QueryParam],
        sql_state: Option<String>,
    ) -> Self {
        Self::Statement {
            message: message.into(),
            sql: sql.into(),
            params: params.to_vec(),
            sql_state,
        }
    }

    /// Create a driver (connection) error with a helpful suggestion.
    pub fn driver(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, table: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            table: table.into(),
        }
    }

    /// Translate an sqlx error raised while running `sql`.
    ///
    /// Connection-level failures stay `Driver` errors; everything else the
    /// driver reports about the statement itself becomes `Statement`.
    pub fn from_sqlx(err: sqlx::Error, sql: &str, params: &[QueryParam]) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::driver(
                msg.to_string(),
                "Check the connection settings and credentials",
            ),
            sqlx::Error::Io(io_err) => DbError::driver(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::driver(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::driver(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::PoolTimedOut => DbError::driver(
                "Timed out acquiring a connection from the pool",
                "Increase DB_MAX_CONNECTIONS or DB_ACQUIRE_TIMEOUT",
            ),
            sqlx::Error::PoolClosed => {
                DbError::driver("Connection pool is closed", "Create a new connection pool")
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::statement(db_err.message(), sql, params, code)
            }
            other => DbError::statement(other.to_string(), sql, params, None),
        }
    }

    /// Numeric code matching the exception constants of the data-access layer.
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidQuery { .. } | Self::Schema { .. } => INVALID_QUERY,
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Statement { .. } | Self::Driver { .. } => DRIVER_FAILURE,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Driver { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// SQL text of a failed statement, for diagnostics.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Statement { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
