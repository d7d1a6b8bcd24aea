//! Error types for pgview
//!
//! Database failures fall into two kinds: the session could not be
//! established or verified (connection errors), or an open session rejected
//! a specific request (query errors). Configuration problems have their own
//! type. Everything is wrapped by [`PgviewError`] for callers that don't care.

use std::io;

/// Main error type for the pgview library
#[derive(Debug, thiserror::Error)]
pub enum PgviewError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors (export files, settings file)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A row filter referenced a column the result doesn't have
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A pivot can't be built from the given columns or values
    #[error("Invalid pivot: {0}")]
    InvalidPivot(String),
}

/// Which side of the session an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Could not establish or verify a database session
    Connection,
    /// A connected session rejected or failed a specific request
    Query,
}

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Failed to establish connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected to a database
    #[error("Not connected to database")]
    NotConnected,

    /// Table is not present in the catalog
    #[error("Table '{0}' not found in database")]
    TableNotFound(String),

    /// Caller passed an argument the operation can't accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::ConnectionFailed(_) => ErrorKind::Connection,
            DbError::NotConnected
            | DbError::TableNotFound(_)
            | DbError::InvalidArgument(_)
            | DbError::QueryFailed(_) => ErrorKind::Query,
        }
    }

    /// Build a query error from a driver error, keeping the server's own
    /// message (and detail/hint when present) rather than the generic
    /// "db error" display.
    pub(crate) fn query(e: tokio_postgres::Error) -> Self {
        DbError::QueryFailed(describe_pg_error(&e))
    }

    pub(crate) fn connection(e: tokio_postgres::Error) -> Self {
        DbError::ConnectionFailed(describe_pg_error(&e))
    }
}

fn describe_pg_error(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => {
            let mut msg = format!("{}: {}", db.severity(), db.message());
            if let Some(detail) = db.detail() {
                msg.push_str(&format!(" (detail: {})", detail));
            }
            if let Some(hint) = db.hint() {
                msg.push_str(&format!(" (hint: {})", hint));
            }
            msg
        }
        None => e.to_string(),
    }
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Settings file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Specialized Result type for pgview operations
pub type Result<T> = std::result::Result<T, PgviewError>;

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
