//! JSON and GraphQL responses.
//!
//! The root selector picks the part of the document that holds the rows:
//! an array of objects becomes one row per object, a single object one row,
//! and scalars a single `value` column.

use super::{select_path, table};
use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::query::{Column, Query};
use serde_json::Value;
use std::borrow::Cow;

/// Decode a JSON payload into a frame named after the query.
///
/// A `Value::String` payload is parsed as JSON text first.
///
/// # Examples
///
/// ```
/// use query_frames::decoder::json;
/// use query_frames::query::{ParserMode, Query, QueryType};
/// use serde_json::json;
///
/// let query = Query::builder(QueryType::Json, "https://example.com")
///     .parser(ParserMode::Backend)
///     .root_selector("users")
///     .build()
///     .unwrap();
/// let frame = json::decode(&json!({"users": [{"id": 1}, {"id": 2}]}), &query).unwrap();
/// assert_eq!(frame.row_count(), 2);
/// ```
pub fn decode(payload: &Value, query: &Query) -> Result<Frame> {
    let document = parse_payload(payload)?;
    frame_from_value(
        "json",
        &document,
        query.root_selector(),
        query.columns(),
        query.ref_id(),
    )
}

/// Borrow structured payloads, parse textual ones.
pub(crate) fn parse_payload(payload: &Value) -> Result<Cow<'_, Value>> {
    match payload {
        Value::String(text) => Ok(Cow::Owned(serde_json::from_str(text)?)),
        other => Ok(Cow::Borrowed(other)),
    }
}

/// Build a frame from the part of `document` under `root_selector`.
pub(crate) fn frame_from_value(
    format: &'static str,
    document: &Value,
    root_selector: &str,
    columns: &[Column],
    name: &str,
) -> Result<Frame> {
    let root = select_path(document, root_selector).ok_or_else(|| {
        FrameError::decode(
            format,
            format!("root selector '{}' matched nothing", root_selector),
        )
    })?;
    let rows = table::rows_of(root);
    Ok(table::build_frame(name, &rows, columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FieldType;
    use crate::query::{ColumnType, ParserMode, QueryType};
    use serde_json::json;

    fn query(root: &str) -> Query {
        Query::builder(QueryType::Json, "https://example.com")
            .ref_id("A")
            .parser(ParserMode::Backend)
            .root_selector(root)
            .build()
            .unwrap()
    }

    #[test]
    fn single_object_is_one_row() {
        let frame = decode(&json!({"a": 1}), &query("")).unwrap();
        assert_eq!(frame.name, "A");
        assert_eq!(frame.row_count(), 1);
        assert_eq!(frame.field("a").unwrap().values, vec![json!(1)]);
        assert_eq!(frame.field("a").unwrap().field_type, FieldType::Number);
    }

    #[test]
    fn array_of_objects() {
        let frame = decode(&json!([{"x": 1}, {"x": 2}, {"y": "z"}]), &query("")).unwrap();
        assert_eq!(frame.row_count(), 3);
        assert_eq!(frame.fields.len(), 2);
    }

    #[test]
    fn root_selector() {
        let payload = json!({"data": {"users": [{"name": "ann"}]}});
        let frame = decode(&payload, &query("data.users")).unwrap();
        assert_eq!(frame.field("name").unwrap().values, vec![json!("ann")]);
    }

    #[test]
    fn missing_root_selector_is_error() {
        let err = decode(&json!({"a": 1}), &query("nope")).unwrap_err();
        assert!(matches!(err, FrameError::Decode { format: "json", .. }));
    }

    #[test]
    fn text_payload_is_parsed() {
        let frame = decode(&json!(r#"[{"a": true}]"#), &query("")).unwrap();
        assert_eq!(frame.field("a").unwrap().values, vec![json!(true)]);
    }

    #[test]
    fn invalid_text_payload() {
        let err = decode(&json!("not json"), &query("")).unwrap_err();
        assert!(matches!(err, FrameError::Json(_)));
    }

    #[test]
    fn scalar_array_becomes_value_column() {
        let frame = decode(&json!([1, 2, 3]), &query("")).unwrap();
        assert_eq!(frame.fields.len(), 1);
        assert_eq!(frame.fields[0].name, "value");
        assert_eq!(frame.row_count(), 3);
    }

    #[test]
    fn declared_columns() {
        let q = Query::builder(QueryType::Json, "https://example.com")
            .parser(ParserMode::Backend)
            .column(crate::query::Column::new("price").with_type(ColumnType::Number))
            .build()
            .unwrap();
        let frame = decode(&json!([{"price": "9.5", "skip": 1}]), &q).unwrap();
        assert_eq!(frame.fields.len(), 1);
        assert_eq!(frame.fields[0].values, vec![json!(9.5)]);
    }
}
