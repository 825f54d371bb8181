//! Execution diagnostics attached to every returned frame.
//!
//! [`CustomMeta`] records what happened during one query execution: the raw
//! upstream payload, the status code, how long the fetch took, the query
//! itself and the error text (empty on success). [`Annotation`] is the one
//! place that writes it, so every exit path of the pipeline produces the
//! same, complete record.

use crate::fetch::FetchClient;
use crate::error::FrameError;
use crate::frame::Frame;
use crate::query::Query;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::time::Duration;

/// Duration reported for every execution against a mock client.
///
/// Keeps recorded fixtures stable regardless of real timing.
pub const MOCK_DURATION: Duration = Duration::from_millis(123);

static NO_PAYLOAD: Value = Value::Null;

/// Diagnostics for one query execution.
///
/// # Example
///
/// ```
/// use query_frames::diagnostics::CustomMeta;
/// use query_frames::query::{Query, QueryType};
/// use std::time::Duration;
///
/// let meta = CustomMeta {
///     data: serde_json::json!({"a": 1}),
///     response_code_from_server: 200,
///     duration: Duration::from_millis(40),
///     query: Query::builder(QueryType::Json, "https://example.com").build().unwrap(),
///     error: String::new(),
/// };
/// assert!(meta.ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMeta {
    /// Raw upstream payload, for inspection and client-side parsing.
    pub data: Value,
    /// Status code returned by the server (0 when no request was made).
    pub response_code_from_server: u16,
    /// Elapsed fetch time, serialized in milliseconds.
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// The query that produced this frame.
    pub query: Query,
    /// Error text. Empty means success.
    pub error: String,
}

impl CustomMeta {
    /// Quick check: did the execution succeed?
    pub fn ok(&self) -> bool {
        self.error.is_empty()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// The upstream values every exit path writes onto its frame.
///
/// Built once per execution, right after the fetch, and applied through
/// [`apply`](Self::apply) on whichever frame is returned.
#[derive(Debug, Clone)]
pub struct Annotation<'a> {
    executed_url: String,
    status_code: u16,
    duration: Duration,
    payload: &'a Value,
    query: &'a Query,
}

impl<'a> Annotation<'a> {
    /// Capture the upstream values of a fetch.
    ///
    /// The executed URL comes from the client, and the duration is replaced
    /// by [`MOCK_DURATION`] when the client runs in mock mode.
    pub fn new(
        client: &dyn FetchClient,
        query: &'a Query,
        payload: &'a Value,
        status_code: u16,
        duration: Duration,
    ) -> Self {
        let duration = if client.is_mock() {
            MOCK_DURATION
        } else {
            duration
        };
        Self {
            executed_url: client.executed_url(query),
            status_code,
            duration,
            payload,
            query,
        }
    }

    /// Annotation for an execution that never reached the fetch.
    pub fn unfetched(client: &dyn FetchClient, query: &'a Query) -> Self {
        Self::new(client, query, &NO_PAYLOAD, 0, Duration::ZERO)
    }

    pub fn executed_url(&self) -> &str {
        &self.executed_url
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Write the executed query string and diagnostics onto `frame`.
    ///
    /// Overwrites whatever was there, so applying twice is the same as
    /// applying once.
    pub fn apply(&self, frame: &mut Frame, error: Option<&FrameError>) {
        frame.meta.executed_query_string = self.executed_url.clone();
        frame.meta.custom = Some(CustomMeta {
            data: self.payload.clone(),
            response_code_from_server: self.status_code,
            duration: self.duration,
            query: self.query.clone(),
            error: error.map(|e| e.to_string()).unwrap_or_default(),
        });
    }
}
