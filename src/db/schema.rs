//! Table metadata read from the catalog
//!
//! Nothing here is cached: descriptors are rebuilt from `information_schema`
//! every time they're requested.

use crate::db::types::DataType;

/// A table and its columns, in ordinal order
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    /// Table name
    pub name: String,
    /// Columns in this table
    pub columns: Vec<ColumnInfo>,
}

/// One column entry from the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Type name as the catalog declares it (e.g. "character varying")
    pub declared_type: String,
    /// Parsed logical type
    pub data_type: DataType,
    /// Declared maximum length for character types
    pub max_length: Option<i32>,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// 1-based position within the table
    pub ordinal_position: i32,
}

impl ColumnInfo {
    /// Build a column entry from raw catalog fields.
    pub fn from_catalog(
        name: String,
        declared_type: String,
        max_length: Option<i32>,
        is_nullable: &str,
        ordinal_position: i32,
    ) -> Self {
        let data_type = match max_length {
            Some(n) => DataType::from_catalog_name(&format!("{}({})", declared_type, n)),
            None => DataType::from_catalog_name(&declared_type),
        };
        Self {
            name,
            declared_type,
            data_type,
            max_length,
            // information_schema spells it YES / NO
            nullable: is_nullable.eq_ignore_ascii_case("yes"),
            ordinal_position,
        }
    }
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}
