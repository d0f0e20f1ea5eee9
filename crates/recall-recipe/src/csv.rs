//! CSV rendering for row sets.

use serde_json::Value;

/// Render rows as CSV text. The header is the union of row keys in
/// first-seen order; nested values are emitted as compact JSON; scalar rows
/// fall under a single `value` column. Empty input yields the empty string.
pub fn rows_to_csv(rows: &[Value]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        match row {
            Value::Object(map) => {
                for key in map.keys() {
                    if !headers.iter().any(|h| h == key) {
                        headers.push(key.clone());
                    }
                }
            }
            _ => {
                if !headers.iter().any(|h| h == "value") {
                    headers.push("value".to_string());
                }
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    if let Err(err) = write_rows(&mut writer, &headers, rows) {
        tracing::debug!(error = %err, "csv rendering failed");
        return String::new();
    }
    match writer.into_inner() {
        Ok(bytes) => String::from_utf8(bytes).unwrap_or_default(),
        Err(err) => {
            tracing::debug!(error = %err, "csv rendering failed");
            String::new()
        }
    }
}

fn write_rows(
    writer: &mut csv::Writer<Vec<u8>>,
    headers: &[String],
    rows: &[Value],
) -> Result<(), csv::Error> {
    writer.write_record(headers)?;
    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|header| match row {
                Value::Object(map) => map.get(header).map(cell_text).unwrap_or_default(),
                scalar if header == "value" => cell_text(scalar),
                _ => String::new(),
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}
