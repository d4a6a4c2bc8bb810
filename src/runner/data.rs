//! Data-file parsing for data-driven runs.
//!
//! A data file supplies one variable row per iteration: CSV files map header
//! names to field values, JSON files are arrays of flat objects. All values
//! are carried as strings; they enter the run as local variables.

use super::error::RunnerError;
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;

/// One row of data-file variables.
pub type DataRow = HashMap<String, String>;

/// Parses data-file content into ordered rows.
///
/// The format is chosen by the filename extension when one is given
/// (`.json` / `.csv`); otherwise JSON is tried first and CSV used as the
/// fallback.
pub fn parse_data_file(filename: Option<&str>, content: &str) -> Result<Vec<DataRow>, RunnerError> {
    match filename.map(extension) {
        Some(Some("json")) => parse_json(content),
        Some(Some("csv")) => parse_csv(content),
        _ => parse_json(content).or_else(|_| parse_csv(content)),
    }
}

fn extension(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext)
}

/// Parses a JSON array of flat objects. Non-string scalar values are
/// rendered with their JSON representation.
fn parse_json(content: &str) -> Result<Vec<DataRow>, RunnerError> {
    let parsed: serde_json::Value = serde_json::from_str(content)
        .map_err(|err| RunnerError::Validation(format!("invalid JSON data file: {}", err)))?;

    let items = match parsed {
        serde_json::Value::Array(items) => items,
        _ => {
            return Err(RunnerError::Validation(
                "JSON data file must be an array of objects".to_string(),
            ))
        }
    };

    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let object = match item {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(RunnerError::Validation(format!(
                    "JSON data row {} is not an object: {}",
                    index + 1,
                    other
                )))
            }
        };

        let mut row = DataRow::new();
        for (key, value) in object {
            let rendered = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            row.insert(key, rendered);
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Parses CSV with a header row; every field becomes a string variable.
fn parse_csv(content: &str) -> Result<Vec<DataRow>, RunnerError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| RunnerError::Validation(format!("invalid CSV data file: {}", err)))?
        .clone();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            RunnerError::Validation(format!("invalid CSV data row {}: {}", index + 1, err))
        })?;

        let mut row = DataRow::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), field.to_string());
        }
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_rows() {
        let content = r#"[
            {"username": "alice", "age": 30},
            {"username": "bob", "active": true}
        ]"#;

        let rows = parse_data_file(Some("users.json"), content).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("username").map(String::as_str), Some("alice"));
        assert_eq!(rows[0].get("age").map(String::as_str), Some("30"));
        assert_eq!(rows[1].get("active").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_parse_csv_rows() {
        let content = "username, role\nalice, admin\nbob, viewer\n";

        let rows = parse_data_file(Some("users.csv"), content).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("username").map(String::as_str), Some("alice"));
        assert_eq!(rows[0].get("role").map(String::as_str), Some("admin"));
        assert_eq!(rows[1].get("role").map(String::as_str), Some("viewer"));
    }

    #[test]
    fn test_unknown_extension_tries_json_then_csv() {
        let json_rows = parse_data_file(None, r#"[{"a": "1"}]"#).unwrap();
        assert_eq!(json_rows.len(), 1);

        let csv_rows = parse_data_file(Some("rows.data"), "a,b\n1,2\n").unwrap();
        assert_eq!(csv_rows.len(), 1);
        assert_eq!(csv_rows[0].get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_json_must_be_array_of_objects() {
        assert!(matches!(
            parse_data_file(Some("d.json"), r#"{"a": 1}"#),
            Err(RunnerError::Validation(_))
        ));
        assert!(matches!(
            parse_data_file(Some("d.json"), r#"[1, 2]"#),
            Err(RunnerError::Validation(_))
        ));
    }

    #[test]
    fn test_csv_short_rows_are_tolerated() {
        let rows = parse_data_file(Some("d.csv"), "a,b,c\n1,2\n").unwrap();
        assert_eq!(rows[0].len(), 2);
        assert!(rows[0].get("c").is_none());
    }
}
