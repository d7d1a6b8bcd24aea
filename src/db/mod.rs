//! Database access layer
//!
//! [`ConnectionManager`] owns the single session; [`QueryService`] borrows
//! it to read the catalog and run statements. Both are generic over the
//! [`Database`] backend so they can be exercised without a live server.

pub mod manager;
#[cfg(test)]
pub(crate) mod mock;
pub mod postgres;
pub mod provider;
pub mod query;
pub mod schema;
pub mod types;

// Re-export main types
pub use manager::{ConnectionManager, ConnectionState};
pub use postgres::PostgresProvider;
pub use provider::Database;
pub use query::QueryService;
pub use schema::{ColumnInfo, TableDescriptor};
pub use types::{CellValue, ColumnDef, DataType, QueryResults, Row, SqlParam};
