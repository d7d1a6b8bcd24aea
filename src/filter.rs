//! Row search over fetched results
//!
//! Filtering is purely in-memory: it narrows what is already on screen and
//! never goes back to the database.

use crate::db::types::{QueryResults, Row};
use crate::error::{PgviewError, Result};

/// Substring search across a result's cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    /// Text to look for
    pub needle: String,
    /// Restrict matching to this column
    pub column: Option<String>,
    pub case_sensitive: bool,
}

impl RowFilter {
    /// Case-insensitive search across every column
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
            column: None,
            case_sensitive: false,
        }
    }

    pub fn in_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// A filter with no search text keeps every row
    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// Rows of `results` that match, with the same columns.
    ///
    /// # Errors
    /// `PgviewError::UnknownColumn` when the filter names a column the
    /// results don't have
    pub fn apply(&self, results: &QueryResults) -> Result<QueryResults> {
        let column = match &self.column {
            Some(name) => Some(
                results
                    .column_index(name)
                    .ok_or_else(|| PgviewError::UnknownColumn(name.clone()))?,
            ),
            None => None,
        };

        if self.is_empty() {
            return Ok(results.clone());
        }

        let needle = self.normalize(&self.needle);
        let rows: Vec<Row> = results
            .rows
            .iter()
            .filter(|row| self.row_matches(row, column, &needle))
            .cloned()
            .collect();

        Ok(QueryResults::new(
            results.columns.clone(),
            rows,
            results.execution_time,
        ))
    }

    fn row_matches(&self, row: &Row, column: Option<usize>, needle: &str) -> bool {
        let cell_matches = |idx: usize| {
            row.values
                .get(idx)
                .filter(|cell| !cell.is_null())
                .is_some_and(|cell| self.normalize(&cell.to_plain_string()).contains(needle))
        };
        match column {
            Some(idx) => cell_matches(idx),
            None => (0..row.values.len()).any(cell_matches),
        }
    }

    fn normalize(&self, s: &str) -> String {
        if self.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    }
}
