//! CSV export of query results
//!
//! [`to_csv`] is pure serialization; [`write_csv`] puts the text on disk.

use crate::db::types::QueryResults;
use crate::error::Result;
use std::path::Path;
use tracing::info;

/// Serialize query results as RFC 4180 CSV with a header row.
pub fn to_csv(results: &QueryResults) -> String {
    let mut out = String::new();

    write_record(&mut out, results.columns.iter().map(|c| c.name.clone()));
    for row in &results.rows {
        write_record(&mut out, row.values.iter().map(|cell| cell.to_plain_string()));
    }

    out
}

/// Write `results` as CSV to `path`, replacing any existing file.
pub fn write_csv(results: &QueryResults, path: &Path) -> Result<()> {
    std::fs::write(path, to_csv(results))?;
    info!("Exported {} rows to {}", results.row_count, path.display());
    Ok(())
}

/// File name an export of `table` (or an ad-hoc query) is saved under
pub fn default_file_name(table: Option<&str>) -> String {
    let stem: String = table
        .unwrap_or("query")
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("{}.csv", stem)
}

fn write_record(out: &mut String, fields: impl Iterator<Item = String>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        csv_escape_into(out, &field);
    }
    out.push('\n');
}

/// Quote a field if it contains `,` `"` or a newline (RFC 4180).
fn csv_escape_into(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
