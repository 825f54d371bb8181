//! CSV and TSV text.
//!
//! The first record is the header. Cells stay strings unless the query
//! declares typed columns.

use super::table;
use crate::error::Result;
use crate::frame::Frame;
use crate::query::{Query, QueryType};
use serde_json::{Map, Value};

/// Decode delimited text into a frame named after the query.
///
/// The delimiter is `,` for CSV and a tab for TSV unless the query's CSV
/// options override it.
pub fn decode(text: &str, query: &Query) -> Result<Frame> {
    let options = query.csv_options();
    let default_delimiter = if query.kind() == QueryType::Tsv {
        b'\t'
    } else {
        b','
    };
    // Query validation guarantees ASCII here.
    let delimiter = options.delimiter.map(|c| c as u8).unwrap_or(default_delimiter);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(options.relax_column_count)
        .comment(options.comment.map(|c| c as u8))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = table::unique_names(reader.headers()?.iter(), false);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Map::new();
        for (idx, header) in headers.iter().enumerate() {
            let cell = record
                .get(idx)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null);
            row.insert(header.clone(), cell);
        }
        rows.push(Value::Object(row));
    }

    let mut frame = table::build_frame(query.ref_id(), &rows, query.columns());
    if frame.fields.is_empty() && query.columns().is_empty() {
        // Header-only input still has a layout.
        for header in headers {
            frame
                .fields
                .push(crate::frame::Field::new(header, crate::frame::FieldType::String));
        }
    }
    Ok(frame)
}
