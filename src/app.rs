//! Dashboard session state
//!
//! The presentation layer turns each user interaction into an [`Action`] and
//! hands it to [`Dashboard::handle`]. The dashboard performs at most a few
//! round-trips, updates its state, and records the outcome as a status
//! message. Errors never escape: they become an Error-level status and the
//! session stays usable.

use crate::config::{ConnectionConfig, Settings};
use crate::coverage;
use crate::db::postgres::PostgresProvider;
use crate::db::{ColumnInfo, ConnectionManager, Database, QueryResults, QueryService, SqlParam};
use crate::error::{DbError, Result};
use crate::export;
use crate::filter::RowFilter;
use crate::pivot::{Aggregate, Pivot};
use std::path::PathBuf;
use tracing::{debug, warn};

/// One user interaction
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Connect,
    Disconnect,
    TestConnection,
    /// Reload the table list
    RefreshTables,
    /// Show the first rows of a table
    SelectTable(String),
    /// Load a table's columns without fetching rows
    DescribeTable(String),
    /// Change how many rows a table fetch returns
    SetRowLimit(usize),
    /// Filter the visible rows
    Search {
        text: String,
        column: Option<String>,
    },
    ClearSearch,
    /// Re-fetch the selected table
    Refresh,
    /// Run an ad-hoc statement
    RunQuery { sql: String, params: Vec<SqlParam> },
    /// Replace the visible rows with their crosstab
    Pivot {
        index: Vec<String>,
        column: String,
        value: String,
        aggregate: Aggregate,
    },
    /// Replace the visible rows with per-column missing-value counts
    Coverage,
    /// Save the visible rows as CSV (default file name when `None`)
    Export(Option<PathBuf>),
}

/// Status message with severity level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub level: StatusLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Main dashboard state
pub struct Dashboard<D: Database = PostgresProvider> {
    manager: ConnectionManager<D>,
    config: ConnectionConfig,
    settings: Settings,

    /// Tables in the configured schema (as of the last refresh)
    pub tables: Vec<String>,
    /// Table whose rows are shown; `None` after an ad-hoc query
    pub selected_table: Option<String>,
    /// Column metadata for the selected table
    pub columns: Vec<ColumnInfo>,
    /// Rows fetched by the last successful read, before filtering
    pub results: Option<QueryResults>,
    /// Active search
    pub filter: Option<RowFilter>,
    /// Rows fetched per table selection
    pub row_limit: usize,

    /// Status message to display
    pub status_message: Option<StatusMessage>,
}

impl<D: Database> Dashboard<D> {
    pub fn new(config: ConnectionConfig, settings: Settings) -> Self {
        Self {
            manager: ConnectionManager::new(),
            config,
            row_limit: settings.default_row_limit,
            settings,
            tables: Vec::new(),
            selected_table: None,
            columns: Vec::new(),
            results: None,
            filter: None,
            status_message: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn manager(&self) -> &ConnectionManager<D> {
        &self.manager
    }

    /// Perform one action. The outcome is left in `status_message`.
    pub async fn handle(&mut self, action: Action) {
        debug!("Handling {:?}", action);
        let outcome = match action {
            Action::Connect => self.connect().await,
            Action::Disconnect => {
                self.manager.disconnect().await;
                self.clear_data();
                Ok(("Disconnected".to_string(), StatusLevel::Info))
            }
            Action::TestConnection => Ok(self.test_connection().await),
            Action::RefreshTables => self.refresh_tables().await,
            Action::SelectTable(name) => self.select_table(name).await,
            Action::DescribeTable(name) => self.describe_table(name).await,
            Action::SetRowLimit(limit) => self.set_row_limit(limit),
            Action::Search { text, column } => {
                let mut filter = RowFilter::new(text);
                if let Some(column) = column {
                    filter = filter.in_column(column);
                }
                self.search(filter)
            }
            Action::ClearSearch => {
                self.filter = None;
                Ok(("Search cleared".to_string(), StatusLevel::Info))
            }
            Action::Refresh => self.refresh().await,
            Action::RunQuery { sql, params } => self.run_query(&sql, &params).await,
            Action::Pivot {
                index,
                column,
                value,
                aggregate,
            } => self.pivot(Pivot::new(index, column, value).aggregate(aggregate)),
            Action::Coverage => self.coverage(),
            Action::Export(path) => self.export(path),
        };

        match outcome {
            Ok((message, level)) => self.set_status(message, level),
            Err(e) => {
                warn!("{}", e);
                self.set_status(e.to_string(), StatusLevel::Error);
            }
        }
    }

    /// Current results with the active search applied
    pub fn visible_results(&self) -> Option<QueryResults> {
        let results = self.results.as_ref()?;
        match &self.filter {
            // A filter that no longer fits the results shows nothing
            Some(filter) => filter.apply(results).ok(),
            None => Some(results.clone()),
        }
    }

    pub fn set_status(&mut self, message: String, level: StatusLevel) {
        self.status_message = Some(StatusMessage { message, level });
    }

    fn service(&self) -> QueryService<'_, D> {
        QueryService::new(&self.manager, self.settings.schema.clone())
    }

    fn clear_data(&mut self) {
        self.tables.clear();
        self.selected_table = None;
        self.columns.clear();
        self.results = None;
        self.filter = None;
    }

    async fn connect(&mut self) -> Result<(String, StatusLevel)> {
        self.clear_data();
        self.manager.connect(&self.config).await?;
        let loaded = match self.manager.server_version().await {
            Ok(version) => self.service().list_tables().await.map(|t| (version, t)),
            Err(e) => Err(e),
        };
        let (version, tables) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                // A session we can't read from is closed again
                self.manager.disconnect().await;
                return Err(e.into());
            }
        };
        self.tables = tables;
        Ok((
            format!(
                "Connected to {} ({}), {} tables",
                self.config.display_name(),
                version,
                self.tables.len()
            ),
            StatusLevel::Success,
        ))
    }

    async fn test_connection(&self) -> (String, StatusLevel) {
        if self.manager.test_connection().await {
            ("Connection is alive".to_string(), StatusLevel::Success)
        } else if self.manager.is_connected() {
            ("Connection check failed".to_string(), StatusLevel::Error)
        } else {
            ("Not connected".to_string(), StatusLevel::Warning)
        }
    }

    async fn refresh_tables(&mut self) -> Result<(String, StatusLevel)> {
        self.tables = self.service().list_tables().await?;
        Ok((
            format!("{} tables", self.tables.len()),
            StatusLevel::Info,
        ))
    }

    async fn select_table(&mut self, name: String) -> Result<(String, StatusLevel)> {
        let (columns, results) = {
            let service = self.service();
            let columns = service.fetch_columns(&name).await?;
            let results = service.fetch_rows(&name, self.row_limit).await?;
            (columns, results)
        };
        let message = format!(
            "{}: {} rows, {} columns",
            name,
            results.row_count,
            results.column_count()
        );
        self.selected_table = Some(name);
        self.columns = columns;
        self.results = Some(results);
        self.filter = None;
        Ok((message, StatusLevel::Success))
    }

    async fn describe_table(&mut self, name: String) -> Result<(String, StatusLevel)> {
        let descriptor = self.service().describe_table(&name).await?;
        let message = format!("{}: {} columns", descriptor.name, descriptor.column_count());
        self.columns = descriptor.columns;
        Ok((message, StatusLevel::Info))
    }

    fn set_row_limit(&mut self, limit: usize) -> Result<(String, StatusLevel)> {
        if limit == 0 {
            return Err(DbError::InvalidArgument(
                "row limit must be a positive integer".to_string(),
            )
            .into());
        }
        self.row_limit = limit;
        Ok((format!("Row limit set to {}", limit), StatusLevel::Info))
    }

    fn search(&mut self, filter: RowFilter) -> Result<(String, StatusLevel)> {
        let Some(results) = &self.results else {
            return Ok(("Nothing to search".to_string(), StatusLevel::Warning));
        };
        let matched = filter.apply(results)?;
        let message = format!("{} of {} rows match", matched.row_count, results.row_count);
        self.filter = (!filter.is_empty()).then_some(filter);
        Ok((message, StatusLevel::Info))
    }

    async fn refresh(&mut self) -> Result<(String, StatusLevel)> {
        match self.selected_table.clone() {
            Some(table) => {
                let filter = self.filter.take();
                let outcome = self.select_table(table).await?;
                // Keep the search if it still applies to the new columns
                if let Some(filter) = filter {
                    if let Some(results) = &self.results {
                        if filter.apply(results).is_ok() {
                            self.filter = Some(filter);
                        }
                    }
                }
                Ok(outcome)
            }
            None => self.refresh_tables().await,
        }
    }

    async fn run_query(&mut self, sql: &str, params: &[SqlParam]) -> Result<(String, StatusLevel)> {
        let results = self.service().run_query(sql, params).await?;
        let message = format!(
            "{} rows in {:.1}ms",
            results.row_count,
            results.execution_time.as_secs_f64() * 1000.0
        );
        self.show_derived(results);
        Ok((message, StatusLevel::Success))
    }

    /// Make `results` the current table, detached from any selected table
    fn show_derived(&mut self, results: QueryResults) {
        self.selected_table = None;
        self.columns.clear();
        self.results = Some(results);
        self.filter = None;
    }

    fn pivot(&mut self, pivot: Pivot) -> Result<(String, StatusLevel)> {
        let Some(results) = self.visible_results() else {
            return Ok(("Nothing to pivot".to_string(), StatusLevel::Warning));
        };
        let matrix = pivot.apply(&results)?;
        let message = format!(
            "Pivot: {} rows x {} columns",
            matrix.row_count,
            matrix.column_count()
        );
        self.show_derived(matrix);
        Ok((message, StatusLevel::Success))
    }

    fn coverage(&mut self) -> Result<(String, StatusLevel)> {
        let Some(results) = self.visible_results() else {
            return Ok(("Nothing to measure".to_string(), StatusLevel::Warning));
        };
        let table = coverage::coverage_results(&results);
        let message = format!(
            "Coverage of {} columns over {} rows",
            table.row_count, results.row_count
        );
        self.show_derived(table);
        Ok((message, StatusLevel::Success))
    }

    fn export(&self, path: Option<PathBuf>) -> Result<(String, StatusLevel)> {
        let Some(results) = self.visible_results() else {
            return Ok(("Nothing to export".to_string(), StatusLevel::Warning));
        };
        let path = path.unwrap_or_else(|| {
            self.settings
                .export_path(&export::default_file_name(self.selected_table.as_deref()))
        });
        export::write_csv(&results, &path)?;
        Ok((
            format!("Exported {} rows to {}", results.row_count, path.display()),
            StatusLevel::Success,
        ))
    }
}
