//! pgview - a small PostgreSQL dashboard data layer
//!
//! pgview connects to one PostgreSQL database, lists the tables in a schema,
//! shows their columns and first rows, and runs ad-hoc parameterized queries.
//! Fetched rows can be searched, pivoted, checked for missing values and
//! exported as CSV.
//!
//! # Architecture
//!
//! - [`config`]: Connection settings from the environment, user settings file
//! - [`db`]: Connection lifecycle, catalog reads and query execution
//! - [`filter`]: In-memory row search
//! - [`pivot`]: Crosstabs of fetched rows
//! - [`coverage`]: Missing-value counts per column
//! - [`export`]: CSV output
//! - [`app`]: Dashboard session driven by user actions
//! - [`error`]: Error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use pgview::config::ConnectionConfig;
//! use pgview::db::{ConnectionManager, QueryService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectionConfig::from_env()?;
//!
//! let mut manager: ConnectionManager = ConnectionManager::new();
//! manager.connect(&config).await?;
//!
//! let service = QueryService::new(&manager, "public");
//! for table in service.list_tables().await? {
//!     let rows = service.fetch_rows(&table, 10).await?;
//!     println!("{}: {} rows", table, rows.row_count);
//! }
//!
//! manager.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod coverage;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod logging;
pub mod pivot;

pub use error::{ConfigError, DbError, ErrorKind, PgviewError, Result};
