//! Catalog reads and statement execution
//!
//! A `QueryService` borrows the connection manager for the length of one
//! user action. Every operation checks the manager's state first, so calls
//! made while Disconnected fail with `DbError::NotConnected` before anything
//! touches the network.

use crate::db::manager::ConnectionManager;
use crate::db::postgres::PostgresProvider;
use crate::db::schema::{ColumnInfo, TableDescriptor};
use crate::db::types::{QueryResults, SqlParam};
use crate::db::Database;
use crate::error::{DbError, DbResult};
use tracing::{debug, info, warn};

/// Read operations against the connected database
pub struct QueryService<'a, D: Database = PostgresProvider> {
    manager: &'a ConnectionManager<D>,
    schema: String,
}

impl<'a, D: Database> QueryService<'a, D> {
    /// Query tables in `schema` through `manager`'s session
    pub fn new(manager: &'a ConnectionManager<D>, schema: impl Into<String>) -> Self {
        Self {
            manager,
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Table and view names in the schema, sorted
    pub async fn list_tables(&self) -> DbResult<Vec<String>> {
        let db = self.manager.handle()?;
        let tables = db.list_tables(&self.schema).await?;
        debug!("{} tables in schema {}", tables.len(), self.schema);
        Ok(tables)
    }

    /// Up to `limit` rows of `table_name`, in storage order.
    ///
    /// # Errors
    /// `DbError::InvalidArgument` for a zero limit, `DbError::TableNotFound`
    /// when the table isn't in the catalog
    pub async fn fetch_rows(&self, table_name: &str, limit: usize) -> DbResult<QueryResults> {
        let db = self.manager.handle()?;
        if limit == 0 {
            return Err(DbError::InvalidArgument(
                "row limit must be a positive integer".to_string(),
            ));
        }
        let limit = i64::try_from(limit)
            .map_err(|_| DbError::InvalidArgument(format!("row limit {} is too large", limit)))?;

        // Identifiers can't be bound as parameters, so only names the catalog
        // knows are ever spliced into SQL (and they are quoted even then).
        let tables = db.list_tables(&self.schema).await?;
        if !tables.iter().any(|t| t == table_name) {
            return Err(DbError::TableNotFound(table_name.to_string()));
        }

        let sql = select_rows_sql(&self.schema, table_name);
        let results = db
            .query(&sql, &[SqlParam::Integer(limit)])
            .await
            .inspect_err(|e| warn!("Fetching rows from {} failed: {}", table_name, e))?;
        info!(
            "Fetched {} rows x {} columns from {} in {:.1}ms",
            results.row_count,
            results.column_count(),
            table_name,
            results.execution_time.as_secs_f64() * 1000.0
        );
        Ok(results)
    }

    /// Column entries for `table_name` in ordinal order
    ///
    /// # Errors
    /// `DbError::TableNotFound` when the catalog has no columns for it
    pub async fn fetch_columns(&self, table_name: &str) -> DbResult<Vec<ColumnInfo>> {
        let db = self.manager.handle()?;
        let columns = db.table_columns(&self.schema, table_name).await?;
        if columns.is_empty() {
            return Err(DbError::TableNotFound(table_name.to_string()));
        }
        Ok(columns)
    }

    /// Name plus columns of `table_name`
    pub async fn describe_table(&self, table_name: &str) -> DbResult<TableDescriptor> {
        let columns = self.fetch_columns(table_name).await?;
        Ok(TableDescriptor::new(table_name, columns))
    }

    /// Run a statement with positional parameters (`$1`, `$2`, ...).
    ///
    /// The statement is not inspected: what it may do is up to the database
    /// role's privileges.
    pub async fn run_query(&self, sql: &str, params: &[SqlParam]) -> DbResult<QueryResults> {
        let db = self.manager.handle()?;
        if sql.trim().is_empty() {
            return Err(DbError::InvalidArgument("query is empty".to_string()));
        }
        let results = db
            .query(sql, params)
            .await
            .inspect_err(|e| warn!("Query failed: {}", e))?;
        info!(
            "Query returned {} rows in {:.1}ms",
            results.row_count,
            results.execution_time.as_secs_f64() * 1000.0
        );
        Ok(results)
    }
}

/// Quote an identifier for PostgreSQL: wrap in double quotes, double any
/// embedded quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `SELECT *` over a schema-qualified table with the limit as `$1`
pub(crate) fn select_rows_sql(schema: &str, table: &str) -> String {
    format!(
        "SELECT * FROM {}.{} LIMIT $1",
        quote_ident(schema),
        quote_ident(table)
    )
}
