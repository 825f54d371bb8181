//! Tabular result container.
//!
//! A [`Frame`] is a list of equally long, typed columns plus a [`FrameMeta`]
//! block. Cell values are kept as `serde_json::Value` so decoders for every
//! format share one representation.

use crate::diagnostics::CustomMeta;
use crate::query::{ColumnType, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of a frame column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// Epoch milliseconds.
    Time,
    /// Arrays, objects, or mixed values.
    Json,
}

impl From<ColumnType> for FieldType {
    fn from(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::String => FieldType::String,
            ColumnType::Number => FieldType::Number,
            ColumnType::Boolean => FieldType::Boolean,
            ColumnType::Timestamp => FieldType::Time,
        }
    }
}

/// A named, typed column. `Value::Null` marks a missing cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub values: Vec<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            values: Vec::new(),
        }
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Frame-level metadata. Always present on a frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMeta {
    /// The request URL that was (or would have been) executed.
    pub executed_query_string: String,
    /// Execution diagnostics, attached by the pipeline on every exit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomMeta>,
}

/// Tabular output of a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    pub name: String,
    pub fields: Vec<Field>,
    pub meta: FrameMeta,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// An empty frame shaped after the query's declared columns.
    ///
    /// Lets callers render a stable, empty layout when a query fails before
    /// any data arrives.
    pub fn placeholder(query: &Query) -> Self {
        let fields = query
            .columns()
            .iter()
            .map(|c| Field::new(c.display_name(), c.column_type.into()))
            .collect();
        Self {
            name: query.ref_id().to_string(),
            fields,
            meta: FrameMeta::default(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of rows (length of the longest column).
    pub fn row_count(&self) -> usize {
        self.fields.iter().map(Field::len).max().unwrap_or(0)
    }

    /// A copy of this frame keeping only the given rows, in order.
    ///
    /// Metadata is carried over unchanged.
    pub fn select_rows(&self, rows: &[usize]) -> Frame {
        let fields = self
            .fields
            .iter()
            .map(|f| Field {
                name: f.name.clone(),
                field_type: f.field_type,
                values: rows
                    .iter()
                    .map(|&i| f.values.get(i).cloned().unwrap_or(Value::Null))
                    .collect(),
            })
            .collect();
        Frame {
            name: self.name.clone(),
            fields,
            meta: self.meta.clone(),
        }
    }
}
