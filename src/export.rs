//! Result export and rendering.
//!
//! Serializes a query result to CSV (the spreadsheet hand-off format for
//! engineering staff), JSON, or an aligned text table for terminal output.

use crate::db::QueryResult;
use crate::error::{OrawatchError, Result};
use std::path::Path;

/// Renders a result as CSV with a header row.
pub fn to_csv_string(result: &QueryResult) -> String {
    let mut csv = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .map(|c| escape_csv_field(&c.name))
        .collect();
    csv.push_str(&header.join(","));
    csv.push('\n');

    for row in &result.rows {
        let line: Vec<String> = row
            .iter()
            .map(|v| escape_csv_field(&v.to_display_string()))
            .collect();
        csv.push_str(&line.join(","));
        csv.push('\n');
    }

    csv
}

/// Writes a result as CSV to the given path.
pub fn write_csv(result: &QueryResult, path: &Path) -> Result<()> {
    std::fs::write(path, to_csv_string(result)).map_err(|e| {
        OrawatchError::unexpected(format!("Failed to write CSV to {}: {e}", path.display()))
    })
}

/// Escapes a CSV field: quoted if it contains a comma, quote or newline.
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Renders a result as pretty-printed JSON.
pub fn to_json_string(result: &QueryResult) -> Result<String> {
    serde_json::to_string_pretty(result)
        .map_err(|e| OrawatchError::unexpected(format!("Failed to serialize result: {e}")))
}

/// Renders a result as an aligned text table for terminal output.
pub fn to_text_table(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return format!("{} row(s) affected\n", result.row_count);
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.name.len()).collect();
    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_display_string()).collect())
        .collect();
    for row in &rendered {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<width$}", c.name, width = *w))
        .collect();
    out.push_str(&header.join(" | "));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');

    for row in &rendered {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect();
        out.push_str(&line.join(" | "));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnInfo, QueryResult, Value};
    use pretty_assertions::assert_eq;

    fn sample_result() -> QueryResult {
        QueryResult::with_data(
            vec![
                ColumnInfo::new("LOT_ID", "VARCHAR2"),
                ColumnInfo::new("NOTE", "VARCHAR2"),
            ],
            vec![
                vec![Value::from("L-001"), Value::from("plain")],
                vec![Value::from("L-002"), Value::from("has, comma")],
                vec![Value::from("L-003"), Value::from("say \"hi\"")],
                vec![Value::from("L-004"), Value::Null],
            ],
        )
    }

    #[test]
    fn test_csv_header_and_escaping() {
        let csv = to_csv_string(&sample_result());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "LOT_ID,NOTE");
        assert_eq!(lines[1], "L-001,plain");
        assert_eq!(lines[2], "L-002,\"has, comma\"");
        assert_eq!(lines[3], "L-003,\"say \"\"hi\"\"\"");
        assert_eq!(lines[4], "L-004,");
    }

    #[test]
    fn test_write_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&sample_result(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("LOT_ID,NOTE\n"));
        assert_eq!(content.lines().count(), 5);
    }

    #[test]
    fn test_json_shape() {
        let json = to_json_string(&sample_result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["row_count"], 4);
        assert_eq!(value["columns"][0]["name"], "LOT_ID");
        assert_eq!(value["rows"][0][0], "L-001");
        assert!(value["rows"][3][1].is_null());
    }

    #[test]
    fn test_text_table_alignment() {
        let table = to_text_table(&sample_result());
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("LOT_ID | NOTE"));
        assert!(lines[1].starts_with("------"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_text_table_for_statement_result() {
        let mut result = QueryResult::new();
        result.row_count = 7;
        assert_eq!(to_text_table(&result), "7 row(s) affected\n");
    }
}
