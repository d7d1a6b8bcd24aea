//! Database backend trait
//!
//! Defines the interface the connection manager and query service drive.
//! PostgreSQL is the only real backend; the trait is the seam that lets the
//! manager, the query service and the dashboard be tested without a server.

use crate::config::ConnectionConfig;
use crate::db::schema::ColumnInfo;
use crate::db::types::{QueryResults, SqlParam};
use crate::error::DbResult;

/// An open session with a database server
#[allow(async_fn_in_trait)]
pub trait Database: Sized {
    /// Establish a session
    ///
    /// # Errors
    /// Returns `DbError::ConnectionFailed` if the server can't be reached or
    /// rejects the credentials
    async fn connect(config: &ConnectionConfig) -> DbResult<Self>;

    /// Close the session. Never fails; a broken session is simply dropped.
    async fn close(self);

    /// Lightweight round-trip; returns the server version string
    async fn ping(&self) -> DbResult<String>;

    /// Names of the tables and views in `schema`, sorted by name
    async fn list_tables(&self, schema: &str) -> DbResult<Vec<String>>;

    /// Catalog column entries for `schema.table` in ordinal order.
    /// Empty when the table doesn't exist.
    async fn table_columns(&self, schema: &str, table: &str) -> DbResult<Vec<ColumnInfo>>;

    /// Execute a statement with positional parameters
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` if preparing, binding or executing fails
    async fn query(&self, sql: &str, params: &[SqlParam]) -> DbResult<QueryResults>;
}
