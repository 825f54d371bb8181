//! Mock fetch client for testing without a network.
//!
//! [`MockClient`] returns pre-configured payloads in order and runs in mock
//! mode, so the pipeline reports the fixed
//! [`MOCK_DURATION`](crate::diagnostics::MOCK_DURATION) instead of real
//! timings.
//!
//! # Example
//!
//! ```
//! use query_frames::fetch::MockClient;
//! use serde_json::json;
//!
//! let mock = MockClient::fixed(json!({"a": 1}));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{executed_url, FetchClient, FetchResponse};
use crate::error::FrameError;
use crate::exec_ctx::ExecCtx;
use crate::query::Query;

/// A test client that returns canned payloads in order.
///
/// Cycles back to the beginning when all payloads have been consumed.
#[derive(Debug)]
pub struct MockClient {
    responses: Vec<Value>,
    index: AtomicUsize,
    status_code: u16,
    duration: Duration,
    failure: Option<String>,
    mock_mode: bool,
}

impl MockClient {
    /// Create a mock client with the given canned payloads.
    pub fn new(responses: Vec<Value>) -> Self {
        assert!(!responses.is_empty(), "MockClient requires at least one response");
        Self {
            responses,
            index: AtomicUsize::new(0),
            status_code: 200,
            duration: Duration::ZERO,
            failure: None,
            mock_mode: true,
        }
    }

    /// Create a mock that always returns the same payload.
    pub fn fixed(payload: Value) -> Self {
        Self::new(vec![payload])
    }

    /// Status code reported with every payload. Non-2xx codes fail the fetch.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Duration the client reports (overridden by the pipeline in mock mode).
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Make every fetch fail with `message`, still returning the payload.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Turn mock mode off, so reported durations reach the diagnostics as-is.
    pub fn with_mock_mode(mut self, enabled: bool) -> Self {
        self.mock_mode = enabled;
        self
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    fn next_response(&self) -> Value {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        self.responses[idx].clone()
    }
}

#[async_trait]
impl FetchClient for MockClient {
    async fn get_results(
        &self,
        ctx: &ExecCtx,
        _query: &Query,
        _headers: &HashMap<String, String>,
    ) -> FetchResponse {
        if let Err(e) = ctx.check_cancelled() {
            return FetchResponse::failed(e, Value::Null, 0, Duration::ZERO);
        }
        let payload = self.next_response();
        if let Some(ref message) = self.failure {
            return FetchResponse::failed(
                FrameError::Other(message.clone()),
                payload,
                self.status_code,
                self.duration,
            );
        }
        if !(200..300).contains(&self.status_code) {
            let body = match &payload {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return FetchResponse::failed(
                FrameError::HttpError {
                    status: self.status_code,
                    body,
                },
                payload,
                self.status_code,
                self.duration,
            );
        }
        FetchResponse::ok(payload, self.status_code, self.duration)
    }

    fn executed_url(&self, query: &Query) -> String {
        executed_url(query)
    }

    fn is_mock(&self) -> bool {
        self.mock_mode
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryType;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn query() -> Query {
        Query::builder(QueryType::Json, "https://example.com/a").build().unwrap()
    }

    #[tokio::test]
    async fn test_mock_fixed_response() {
        let mock = MockClient::fixed(json!({"a": 1}));
        let resp = mock
            .get_results(&ExecCtx::default(), &query(), &HashMap::new())
            .await;
        assert!(resp.is_ok());
        assert_eq!(resp.payload, json!({"a": 1}));
        assert_eq!(resp.status_code, 200);
        assert!(mock.is_mock());
    }

    #[tokio::test]
    async fn test_mock_cycles_responses() {
        let mock = MockClient::new(vec![json!("first"), json!("second")]);
        let ctx = ExecCtx::default();
        let headers = HashMap::new();
        let r1 = mock.get_results(&ctx, &query(), &headers).await;
        let r2 = mock.get_results(&ctx, &query(), &headers).await;
        let r3 = mock.get_results(&ctx, &query(), &headers).await;
        assert_eq!(r1.payload, "first");
        assert_eq!(r2.payload, "second");
        assert_eq!(r3.payload, "first"); // cycles
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_failure_keeps_payload_and_status() {
        let mock = MockClient::fixed(json!("partial"))
            .with_status(504)
            .with_duration(Duration::from_secs(30))
            .failing("context deadline exceeded");
        let resp = mock
            .get_results(&ExecCtx::default(), &query(), &HashMap::new())
            .await;
        assert_eq!(resp.error.unwrap().to_string(), "context deadline exceeded");
        assert_eq!(resp.payload, "partial");
        assert_eq!(resp.status_code, 504);
        assert_eq!(resp.duration, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_mock_error_status() {
        let mock = MockClient::fixed(json!("not found")).with_status(404);
        let resp = mock
            .get_results(&ExecCtx::default(), &query(), &HashMap::new())
            .await;
        assert!(matches!(
            resp.error,
            Some(FrameError::HttpError { status: 404, ref body }) if body == "not found"
        ));
    }

    #[tokio::test]
    async fn test_mock_respects_cancellation() {
        let ctx = ExecCtx::builder()
            .cancellation(Some(Arc::new(AtomicBool::new(true))))
            .build();
        let mock = MockClient::fixed(json!(1));
        let resp = mock.get_results(&ctx, &query(), &HashMap::new()).await;
        assert!(matches!(resp.error, Some(FrameError::Cancelled)));
        assert_eq!(mock.calls(), 0);
    }
}
