//! Post-processing of decoded frames.
//!
//! After a `backend` route decodes a payload, the pipeline hands the frame to
//! the [`PostProcessor`] installed on the [`ExecCtx`]. The default,
//! [`FilterPostProcessor`], keeps the rows that satisfy every filter of the
//! query.

use crate::error::{FrameError, Result};
use crate::exec_ctx::ExecCtx;
use crate::frame::{Field, Frame};
use crate::query::{Filter, FilterOperator, Query};
use async_trait::async_trait;
use serde_json::Value;

/// Transforms a decoded frame.
///
/// Implementations must be `Send + Sync` so one context can serve
/// concurrent executions.
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Produce the post-processed frame. The input frame is left untouched so
    /// the caller keeps it if this fails.
    async fn apply(&self, ctx: &ExecCtx, frame: &Frame, query: &Query) -> Result<Frame>;

    /// Human-readable name, reported in events.
    fn name(&self) -> &'static str;
}

/// Keeps rows matching all of the query's filters.
///
/// String operators compare the cell's text form. Numeric operators parse
/// both the cell and the first operand as `f64`; cells that are not numbers
/// never match.
///
/// # Example
///
/// ```
/// use query_frames::postprocess::{FilterPostProcessor, PostProcessor};
/// use query_frames::query::{Filter, FilterOperator, ParserMode, Query, QueryType};
/// use query_frames::{ExecCtx, Field, FieldType, Frame};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let query = Query::builder(QueryType::Json, "https://example.com")
///     .parser(ParserMode::Backend)
///     .filter(Filter::new("age", FilterOperator::GreaterThan, "18"))
///     .build()
///     .unwrap();
/// let frame = Frame::new("A").with_field(
///     Field::new("age", FieldType::Number).with_values(vec![json!(12), json!(40)]),
/// );
/// let out = FilterPostProcessor
///     .apply(&ExecCtx::default(), &frame, &query)
///     .await
///     .unwrap();
/// assert_eq!(out.row_count(), 1);
/// # });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterPostProcessor;

#[async_trait]
impl PostProcessor for FilterPostProcessor {
    async fn apply(&self, _ctx: &ExecCtx, frame: &Frame, query: &Query) -> Result<Frame> {
        if query.filters().is_empty() {
            return Ok(frame.clone());
        }

        let mut checks = Vec::with_capacity(query.filters().len());
        for filter in query.filters() {
            let field = frame.field(&filter.field).ok_or_else(|| {
                FrameError::PostProcess(format!("unknown filter field '{}'", filter.field))
            })?;
            checks.push((field, Predicate::compile(filter)?));
        }

        let keep: Vec<usize> = (0..frame.row_count())
            .filter(|&row| checks.iter().all(|(field, p)| p.test(cell(field, row))))
            .collect();
        Ok(frame.select_rows(&keep))
    }

    fn name(&self) -> &'static str {
        "filter"
    }
}

/// Returns the frame unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPostProcessor;

#[async_trait]
impl PostProcessor for NoopPostProcessor {
    async fn apply(&self, _ctx: &ExecCtx, frame: &Frame, _query: &Query) -> Result<Frame> {
        Ok(frame.clone())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

static NULL: Value = Value::Null;

fn cell(field: &Field, row: usize) -> &Value {
    field.values.get(row).unwrap_or(&NULL)
}

enum Predicate<'a> {
    Text(FilterOperator, &'a [String]),
    Number(FilterOperator, f64),
}

impl<'a> Predicate<'a> {
    fn compile(filter: &'a Filter) -> Result<Self> {
        if !filter.operator.is_numeric() {
            let needs_operand = !matches!(filter.operator, FilterOperator::In | FilterOperator::NotIn);
            if needs_operand && filter.value.is_empty() {
                return Err(FrameError::PostProcess(format!(
                    "filter on '{}' has no value",
                    filter.field
                )));
            }
            return Ok(Predicate::Text(filter.operator, &filter.value));
        }
        let operand = filter.value.first().map(String::as_str).unwrap_or("");
        let number = operand.trim().parse::<f64>().map_err(|_| {
            FrameError::PostProcess(format!(
                "filter on '{}' needs a numeric value, got '{}'",
                filter.field, operand
            ))
        })?;
        Ok(Predicate::Number(filter.operator, number))
    }

    fn test(&self, value: &Value) -> bool {
        match self {
            Predicate::Text(op, operands) => {
                let text = text_of(value);
                let first = operands.first().map(String::as_str).unwrap_or("");
                match op {
                    FilterOperator::Equals => text == first,
                    FilterOperator::NotEquals => text != first,
                    FilterOperator::Contains => text.contains(first),
                    FilterOperator::NotContains => !text.contains(first),
                    FilterOperator::StartsWith => text.starts_with(first),
                    FilterOperator::EndsWith => text.ends_with(first),
                    FilterOperator::In => operands.iter().any(|o| *o == text),
                    FilterOperator::NotIn => !operands.iter().any(|o| *o == text),
                    _ => false,
                }
            }
            Predicate::Number(op, rhs) => {
                let Some(lhs) = number_of(value) else {
                    return false;
                };
                match op {
                    FilterOperator::NumberEquals => lhs == *rhs,
                    FilterOperator::NumberNotEquals => lhs != *rhs,
                    FilterOperator::LessThan => lhs < *rhs,
                    FilterOperator::LessThanOrEqual => lhs <= *rhs,
                    FilterOperator::GreaterThan => lhs > *rhs,
                    FilterOperator::GreaterThanOrEqual => lhs >= *rhs,
                    _ => false,
                }
            }
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
