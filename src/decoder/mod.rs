//! # Format decoders
//!
//! Each decoder turns one payload format into a [`Frame`](crate::Frame).
//! Decoders are synchronous and pure; the [`Router`](crate::Router) decides
//! which one runs for a query.
//!
//! | Decoder | Formats | Payload |
//! |---------|---------|---------|
//! | [`json::decode`] | JSON, GraphQL | JSON value (or JSON text) |
//! | [`delimited::decode`] | CSV, TSV | text |
//! | [`markup::decode`] | XML, HTML | text |
//! | [`sheets::decode`] | Google Sheets API v4 | JSON value |
//! | [`sqlite::decode`] | SQL over JSON | JSON text |

pub mod delimited;
pub mod json;
pub mod markup;
pub mod sheets;
pub mod sqlite;
mod table;

use serde_json::Value;

/// Follow a dot path (`data.items.0.name`) into a JSON value.
///
/// A leading `$` or `$.` is ignored and `items[0]` is read as `items.0`.
/// An empty path selects the value itself.
///
/// # Examples
///
/// ```
/// use query_frames::decoder::select_path;
/// use serde_json::json;
///
/// let v = json!({"data": {"items": [{"id": 7}]}});
/// assert_eq!(select_path(&v, "$.data.items[0].id"), Some(&json!(7)));
/// assert_eq!(select_path(&v, "data.missing"), None);
/// ```
pub fn select_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);
    let normalized = path.replace('[', ".").replace(']', "");
    let mut current = value;
    for segment in normalized.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Short name of a JSON value's shape, for error messages.
pub fn payload_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
