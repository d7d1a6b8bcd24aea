//! Missing-value counts per column
//!
//! A cell is missing when it is NULL or text that is empty after trimming.

use crate::db::types::{CellValue, ColumnDef, DataType, QueryResults, Row};

/// How many of a column's cells hold a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCoverage {
    pub column: String,
    pub total: usize,
    pub missing: usize,
}

impl ColumnCoverage {
    pub fn present(&self) -> usize {
        self.total - self.missing
    }
}

pub fn is_blank(cell: &CellValue) -> bool {
    match cell {
        CellValue::Null => true,
        CellValue::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Coverage of every column of `results`, in column order
pub fn column_coverage(results: &QueryResults) -> Vec<ColumnCoverage> {
    results
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| ColumnCoverage {
            column: column.name.clone(),
            total: results.row_count,
            missing: results
                .rows
                .iter()
                .filter(|row| row.values.get(i).is_none_or(is_blank))
                .count(),
        })
        .collect()
}

/// Coverage as a result table (`column`, `total`, `missing`, `present`)
pub fn coverage_results(results: &QueryResults) -> QueryResults {
    let count = |n: usize| CellValue::Integer(i64::try_from(n).unwrap_or(i64::MAX));
    let columns = vec![
        ColumnDef {
            name: "column".to_string(),
            data_type: DataType::Text,
        },
        ColumnDef {
            name: "total".to_string(),
            data_type: DataType::BigInt,
        },
        ColumnDef {
            name: "missing".to_string(),
            data_type: DataType::BigInt,
        },
        ColumnDef {
            name: "present".to_string(),
            data_type: DataType::BigInt,
        },
    ];
    let rows = column_coverage(results)
        .into_iter()
        .map(|c| Row {
            values: vec![
                CellValue::Text(c.column.clone()),
                count(c.total),
                count(c.missing),
                count(c.present()),
            ],
        })
        .collect();
    QueryResults::new(columns, rows, results.execution_time)
}
