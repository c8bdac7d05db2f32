//! CSV export of listed records

use serde_json::Value;
use std::io::Write;
use std::path::Path;

use crate::error::{DeskError, Result};

/// Write `records` as CSV with a header row of every top-level key, in the
/// order keys are first seen. Returns the number of data rows written.
pub fn write_csv<W: Write>(records: &[Value], writer: W) -> Result<usize> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        let object = record
            .as_object()
            .ok_or_else(|| DeskError::invalid_input("Only JSON objects can be exported"))?;
        for key in object.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    let mut csv = csv::Writer::from_writer(writer);
    if columns.is_empty() {
        csv.flush()?;
        return Ok(0);
    }

    csv.write_record(&columns)?;
    for record in records {
        let row = columns.iter().map(|column| cell(record.get(column)));
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(records.len())
}

pub fn export_to_path(records: &[Value], path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)
        .map_err(|e| DeskError::io_from_error(format!("Creating {}", path.display()), e))?;
    write_csv(records, file)
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::test_helpers::create_temp_dir;
    use serde_json::json;

    #[test]
    fn test_header_is_union_of_keys() {
        let records = vec![
            json!({"question": "Why?", "answer": "Because"}),
            json!({"question": "How, exactly?", "order": 2, "tags": ["a"]}),
        ];
        let mut out = Vec::new();

        let rows = write_csv(&records, &mut out).unwrap();

        assert_eq!(rows, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // serde_json maps iterate in key order
        assert_eq!(lines[0], "answer,question,order,tags");
        assert_eq!(lines[1], "Because,Why?,,");
        assert_eq!(lines[2], ",\"How, exactly?\",2,\"[\"\"a\"\"]\"");
    }

    #[test]
    fn test_empty_and_invalid_input() {
        let mut out = Vec::new();
        assert_eq!(write_csv(&[], &mut out).unwrap(), 0);
        assert!(out.is_empty());

        let err = write_csv(&[json!([1, 2])], Vec::new()).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidInput);
    }

    #[test]
    fn test_export_to_path() {
        let dir = create_temp_dir();
        let path = dir.path().join("faqs.csv");

        let rows = export_to_path(&[json!({"question": "Q", "answer": "A"})], &path).unwrap();

        assert_eq!(rows, 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("answer,question"));
    }
}
