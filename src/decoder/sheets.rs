//! Google Sheets API v4 spreadsheet responses (`includeGridData=true`).

use super::json::parse_payload;
use super::table;
use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::query::Query;
use serde_json::{Map, Value};

/// Decode the first grid of the first sheet.
///
/// The first row holds the column names. Blank header cells are named
/// `Field N` after their 1-based position.
pub fn decode(payload: &Value, query: &Query) -> Result<Frame> {
    let document = parse_payload(payload)?;
    let grid = document
        .pointer("/sheets/0/data/0")
        .ok_or_else(|| FrameError::decode("google-sheets", "response has no grid data"))?;

    let empty = Vec::new();
    let rows = grid
        .get("rowData")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let Some((header, body)) = rows.split_first() else {
        return Ok(Frame::new(query.ref_id()));
    };

    let names = table::unique_names(
        cells(header)
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell_value(cell) {
                Value::String(s) if !s.trim().is_empty() => s,
                Value::Null | Value::String(_) => format!("Field {}", i + 1),
                other => other.to_string(),
            }),
        false,
    );

    let records: Vec<Value> = body
        .iter()
        .map(|row| {
            let values = cells(row);
            let mut record = Map::new();
            for (i, name) in names.iter().enumerate() {
                let value = values.get(i).map(cell_value).unwrap_or(Value::Null);
                record.insert(name.clone(), value);
            }
            Value::Object(record)
        })
        .collect();

    let mut frame = table::build_frame(query.ref_id(), &records, query.columns());
    if records.is_empty() && query.columns().is_empty() {
        frame.fields = names
            .into_iter()
            .map(|n| crate::frame::Field::new(n, crate::frame::FieldType::String))
            .collect();
    }
    Ok(frame)
}

fn cells(row: &Value) -> &[Value] {
    row.get("values")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn cell_value(cell: &Value) -> Value {
    if let Some(effective) = cell.get("effectiveValue") {
        for key in ["numberValue", "boolValue", "stringValue"] {
            if let Some(v) = effective.get(key) {
                return v.clone();
            }
        }
    }
    cell.get("formattedValue").cloned().unwrap_or(Value::Null)
}
