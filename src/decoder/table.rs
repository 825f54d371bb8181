//! Row-to-frame conversion shared by every decoder.
//!
//! Decoders reduce their payload to a list of rows (JSON objects) and hand
//! them here. With declared columns, each column is looked up by selector and
//! converted to its declared type. Without, columns are the union of the row
//! keys (nested objects flattened to `a.b`) with types inferred from the data.

use super::select_path;
use crate::frame::{Field, FieldType, Frame};
use crate::query::{Column, ColumnType};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};

static NULL: Value = Value::Null;

/// Build a frame named `name` from `rows`.
pub(crate) fn build_frame(name: &str, rows: &[Value], columns: &[Column]) -> Frame {
    let mut frame = Frame::new(name);
    if columns.is_empty() {
        let flat: Vec<Map<String, Value>> = rows.iter().map(flatten_row).collect();
        for key in union_keys(&flat) {
            let values: Vec<Value> = flat
                .iter()
                .map(|r| r.get(&key).cloned().unwrap_or(Value::Null))
                .collect();
            let field_type = infer_type(&values);
            frame.fields.push(Field::new(key, field_type).with_values(values));
        }
    } else {
        for column in columns {
            let values = rows
                .iter()
                .map(|r| {
                    let cell = lookup(r, &column.selector);
                    convert(cell, column.column_type)
                })
                .collect();
            frame
                .fields
                .push(Field::new(column.display_name(), column.column_type.into()).with_values(values));
        }
    }
    frame
}

/// Wrap non-object rows so every row is an object.
pub(crate) fn rows_of(root: &Value) -> Vec<Value> {
    match root {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(_) => item.clone(),
                other => single_value_row(other.clone()),
            })
            .collect(),
        Value::Object(_) => vec![root.clone()],
        Value::Null => Vec::new(),
        other => vec![single_value_row(other.clone())],
    }
}

fn single_value_row(value: Value) -> Value {
    let mut row = Map::new();
    row.insert("value".to_string(), value);
    Value::Object(row)
}

/// Column names across all rows, in first-seen order.
pub(crate) fn union_keys(rows: &[Map<String, Value>]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

/// Make column names distinct by suffixing repeats: `a`, `a 1`, `a 2`.
///
/// With `ignore_ascii_case`, names differing only by ASCII case count as
/// repeats, matching how SQLite compares identifiers.
pub(crate) fn unique_names<I, S>(names: I, ignore_ascii_case: bool) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let taken = |out: &[String], candidate: &str| {
        out.iter().any(|n| {
            if ignore_ascii_case {
                n.eq_ignore_ascii_case(candidate)
            } else {
                n == candidate
            }
        })
    };
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.into();
        let mut candidate = name.clone();
        let mut n = 1;
        while taken(&out, &candidate) {
            candidate = format!("{} {}", name, n);
            n += 1;
        }
        out.push(candidate);
    }
    out
}

/// Flatten nested objects into dotted keys. Arrays are kept whole.
pub(crate) fn flatten_row(row: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    match row {
        Value::Object(map) => flatten_into(&mut out, "", map),
        other => {
            out.insert("value".to_string(), other.clone());
        }
    }
    out
}

fn flatten_into(out: &mut Map<String, Value>, prefix: &str, map: &Map<String, Value>) {
    for (key, value) in map {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(out, &full, inner),
            _ => {
                out.insert(full, value.clone());
            }
        }
    }
}

fn lookup<'a>(row: &'a Value, selector: &str) -> &'a Value {
    if let Some(v) = row.get(selector) {
        return v;
    }
    select_path(row, selector).unwrap_or(&NULL)
}

/// Most specific field type that fits every non-null value.
pub(crate) fn infer_type(values: &[Value]) -> FieldType {
    let mut inferred: Option<FieldType> = None;
    for value in values {
        let t = match value {
            Value::Null => continue,
            Value::Bool(_) => FieldType::Boolean,
            Value::Number(_) => FieldType::Number,
            Value::String(_) => FieldType::String,
            Value::Array(_) | Value::Object(_) => FieldType::Json,
        };
        match inferred {
            None => inferred = Some(t),
            Some(prev) if prev == t => {}
            Some(_) => return FieldType::Json,
        }
    }
    inferred.unwrap_or(FieldType::String)
}

/// Convert a cell to the declared column type. Unconvertible cells are null.
pub(crate) fn convert(value: &Value, column_type: ColumnType) -> Value {
    match (column_type, value) {
        (_, Value::Null) => Value::Null,
        (ColumnType::String, Value::String(s)) => Value::String(s.clone()),
        (ColumnType::String, other) => Value::String(other.to_string()),
        (ColumnType::Number, Value::Number(n)) => Value::Number(n.clone()),
        (ColumnType::Number, Value::String(s)) => parse_number(s).unwrap_or(Value::Null),
        (ColumnType::Number, _) => Value::Null,
        (ColumnType::Boolean, Value::Bool(b)) => Value::Bool(*b),
        (ColumnType::Boolean, Value::Number(n)) => {
            n.as_f64().map(|f| Value::Bool(f != 0.0)).unwrap_or(Value::Null)
        }
        (ColumnType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Value::Bool(true),
            "false" | "0" | "no" => Value::Bool(false),
            _ => Value::Null,
        },
        (ColumnType::Boolean, _) => Value::Null,
        (ColumnType::Timestamp, Value::Number(n)) => {
            n.as_i64().map(Value::from).unwrap_or(Value::Null)
        }
        (ColumnType::Timestamp, Value::String(s)) => {
            parse_timestamp(s).map(Value::from).unwrap_or(Value::Null)
        }
        (ColumnType::Timestamp, _) => Value::Null,
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Epoch milliseconds from RFC 3339, common date formats, or a numeric string.
pub(crate) fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis());
    }
    s.parse::<i64>().ok()
}
