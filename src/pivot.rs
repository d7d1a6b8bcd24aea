//! Crosstab over fetched results
//!
//! Groups rows by one or more index columns and spreads a value column over
//! one output column per distinct value of the pivot column. Cells with no
//! contributing value are NULL, so they export as blanks. Like the row
//! filter, this only reshapes what was already fetched.

use crate::db::types::{CellValue, ColumnDef, QueryResults, Row};
use crate::error::{PgviewError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;
use std::collections::HashMap;

/// How values landing in the same cell are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregate {
    /// First non-NULL value in fetch order
    #[default]
    First,
    /// Numeric total of the non-NULL values
    Sum,
}

/// Crosstab definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pivot {
    /// Columns identifying an output row
    pub index: Vec<String>,
    /// Column whose distinct values become output columns
    pub column: String,
    /// Column whose values fill the cells
    pub value: String,
    pub aggregate: Aggregate,
}

struct Group {
    key: Vec<CellValue>,
    cells: HashMap<usize, Acc>,
}

impl Pivot {
    pub fn new(index: Vec<String>, column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            index,
            column: column.into(),
            value: value.into(),
            aggregate: Aggregate::First,
        }
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Build the crosstab of `results`.
    ///
    /// Output rows are sorted by index values and pivot columns by header
    /// value. Rows with a NULL index or pivot value are left out.
    ///
    /// # Errors
    /// `PgviewError::UnknownColumn` for a column the results don't have,
    /// `PgviewError::InvalidPivot` for an empty index or a non-numeric value
    /// under `Aggregate::Sum`
    pub fn apply(&self, results: &QueryResults) -> Result<QueryResults> {
        if self.index.is_empty() {
            return Err(PgviewError::InvalidPivot(
                "at least one index column is required".to_string(),
            ));
        }
        let lookup = |name: &str| {
            results
                .column_index(name)
                .ok_or_else(|| PgviewError::UnknownColumn(name.to_string()))
        };
        let index_cols = self
            .index
            .iter()
            .map(|name| lookup(name))
            .collect::<Result<Vec<usize>>>()?;
        let pivot_col = lookup(&self.column)?;
        let value_col = lookup(&self.value)?;

        let mut groups: Vec<Group> = Vec::new();
        let mut group_pos: HashMap<Vec<String>, usize> = HashMap::new();
        let mut headers: Vec<CellValue> = Vec::new();
        let mut header_pos: HashMap<String, usize> = HashMap::new();

        for row in &results.rows {
            let key: Vec<CellValue> = index_cols.iter().map(|&i| row.values[i].clone()).collect();
            let header = &row.values[pivot_col];
            if header.is_null() || key.iter().any(CellValue::is_null) {
                continue;
            }

            let h = *header_pos
                .entry(header.to_plain_string())
                .or_insert_with(|| {
                    headers.push(header.clone());
                    headers.len() - 1
                });

            let key_text: Vec<String> = key.iter().map(CellValue::to_plain_string).collect();
            let g = match group_pos.get(&key_text) {
                Some(&g) => g,
                None => {
                    groups.push(Group {
                        key,
                        cells: HashMap::new(),
                    });
                    group_pos.insert(key_text, groups.len() - 1);
                    groups.len() - 1
                }
            };

            let value = &row.values[value_col];
            if value.is_null() {
                continue;
            }
            groups[g]
                .cells
                .entry(h)
                .or_default()
                .add(value, self.aggregate)
                .map_err(|msg| PgviewError::InvalidPivot(format!("{}: {}", self.value, msg)))?;
        }

        groups.sort_by(|a, b| cmp_keys(&a.key, &b.key));
        let mut order: Vec<usize> = (0..headers.len()).collect();
        order.sort_by(|&a, &b| cmp_cells(&headers[a], &headers[b]));

        let value_type = results.columns[value_col].data_type.clone();
        let mut columns: Vec<ColumnDef> = index_cols
            .iter()
            .map(|&i| results.columns[i].clone())
            .collect();
        columns.extend(order.iter().map(|&h| ColumnDef {
            name: headers[h].to_plain_string(),
            data_type: value_type.clone(),
        }));

        let rows = groups
            .into_iter()
            .map(|mut group| {
                let mut values = group.key;
                values.extend(order.iter().map(|h| {
                    group
                        .cells
                        .remove(h)
                        .map_or(CellValue::Null, Acc::into_cell)
                }));
                Row { values }
            })
            .collect();

        Ok(QueryResults::new(columns, rows, results.execution_time))
    }
}

/// Running value of one output cell
#[derive(Debug, Default)]
enum Acc {
    #[default]
    Empty,
    First(CellValue),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
}

impl Acc {
    fn add(&mut self, value: &CellValue, aggregate: Aggregate) -> std::result::Result<(), String> {
        match aggregate {
            Aggregate::First => {
                if matches!(self, Acc::Empty) {
                    *self = Acc::First(value.clone());
                }
            }
            Aggregate::Sum => {
                let term = Acc::number(value)?;
                *self = std::mem::take(self).plus(term)?;
            }
        }
        Ok(())
    }

    fn number(value: &CellValue) -> std::result::Result<Acc, String> {
        match value {
            CellValue::Integer(n) => Ok(Acc::Int(*n)),
            CellValue::Float(f) => Ok(Acc::Float(*f)),
            // NUMERIC arrives as text
            CellValue::Text(s) => s
                .trim()
                .parse::<Decimal>()
                .map(Acc::Decimal)
                .map_err(|_| format!("'{}' is not a number", s)),
            other => Err(format!("'{}' is not a number", other.to_plain_string())),
        }
    }

    fn plus(self, term: Acc) -> std::result::Result<Acc, String> {
        Ok(match (self, term) {
            (Acc::Empty, t) => t,
            (Acc::Int(a), Acc::Int(b)) => match a.checked_add(b) {
                Some(n) => Acc::Int(n),
                None => Acc::Decimal(Decimal::from(a) + Decimal::from(b)),
            },
            (a @ Acc::Float(_), b) | (a, b @ Acc::Float(_)) => Acc::Float(a.as_f64() + b.as_f64()),
            (a, b) => a
                .as_decimal()
                .checked_add(b.as_decimal())
                .map(Acc::Decimal)
                .ok_or_else(|| "sum is out of range".to_string())?,
        })
    }

    fn as_f64(&self) -> f64 {
        match self {
            Acc::Int(n) => *n as f64,
            Acc::Float(f) => *f,
            Acc::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
            Acc::Empty | Acc::First(_) => 0.0,
        }
    }

    fn as_decimal(&self) -> Decimal {
        match self {
            Acc::Int(n) => Decimal::from(*n),
            Acc::Decimal(d) => *d,
            _ => Decimal::ZERO,
        }
    }

    fn into_cell(self) -> CellValue {
        match self {
            Acc::Empty => CellValue::Null,
            Acc::First(v) => v,
            Acc::Int(n) => CellValue::Integer(n),
            Acc::Float(f) => CellValue::Float(f),
            Acc::Decimal(d) => CellValue::Text(d.to_string()),
        }
    }
}

fn cmp_cells(a: &CellValue, b: &CellValue) -> Ordering {
    match (a, b) {
        (CellValue::Integer(x), CellValue::Integer(y)) => x.cmp(y),
        (CellValue::Float(x), CellValue::Float(y)) => x.total_cmp(y),
        _ => a.to_plain_string().cmp(&b.to_plain_string()),
    }
}

fn cmp_keys(a: &[CellValue], b: &[CellValue]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| cmp_cells(x, y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}
