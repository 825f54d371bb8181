//! Query execution.
//!
//! [`execute_with_post_processing`] runs one query end to end: fetch, route,
//! decode, optionally post-process, annotate. Every exit goes through the
//! same [`Annotation`], so the returned frame always carries its executed
//! URL and diagnostics, whether the query succeeded or not.

use crate::diagnostics::Annotation;
use crate::error::{FrameError, Result};
use crate::events::Event;
use crate::exec_ctx::ExecCtx;
use crate::fetch::{FetchClient, FetchResponse};
use crate::frame::Frame;
use crate::query::{ParserMode, Query};
use serde_json::Value;
use std::collections::HashMap;

/// The outcome of one execution.
///
/// `frame` is always usable: on failure it is the best frame available (the
/// placeholder, or the decoded frame when only post-processing failed) with
/// the error text recorded in its diagnostics.
#[derive(Debug)]
pub struct FrameResponse {
    pub frame: Frame,
    pub error: Option<FrameError>,
}

impl FrameResponse {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Drop the annotated frame on failure.
    pub fn into_result(self) -> Result<Frame> {
        match self.error {
            None => Ok(self.frame),
            Some(e) => Err(e),
        }
    }
}

/// Execute `query` with post-processing enabled.
pub async fn execute(
    ctx: &ExecCtx,
    query: &Query,
    client: &dyn FetchClient,
    headers: &HashMap<String, String>,
) -> FrameResponse {
    execute_with_post_processing(ctx, query, client, headers, true).await
}

/// Execute `query` against `client`.
///
/// Post-processing runs only for `backend` queries, and only when
/// `post_processing` is set.
///
/// # Example
///
/// ```
/// use query_frames::fetch::MockClient;
/// use query_frames::pipeline::execute_with_post_processing;
/// use query_frames::query::{ParserMode, Query, QueryType};
/// use query_frames::ExecCtx;
/// use serde_json::json;
/// use std::collections::HashMap;
///
/// # tokio_test::block_on(async {
/// let query = Query::builder(QueryType::Json, "https://example.com/api")
///     .ref_id("A")
///     .parser(ParserMode::Backend)
///     .build()
///     .unwrap();
/// let client = MockClient::fixed(json!([{"a": 1}, {"a": 2}]));
/// let response =
///     execute_with_post_processing(&ExecCtx::default(), &query, &client, &HashMap::new(), true)
///         .await;
/// assert!(response.is_ok());
/// assert_eq!(response.frame.row_count(), 2);
/// # });
/// ```
pub async fn execute_with_post_processing(
    ctx: &ExecCtx,
    query: &Query,
    client: &dyn FetchClient,
    headers: &HashMap<String, String>,
    post_processing: bool,
) -> FrameResponse {
    let mut frame = Frame::placeholder(query);

    if let Err(error) = ctx.check_cancelled() {
        Annotation::unfetched(client, query).apply(&mut frame, Some(&error));
        return FrameResponse {
            frame,
            error: Some(error),
        };
    }

    ctx.emit(Event::FetchStart {
        ref_id: query.ref_id().to_string(),
        url: client.executed_url(query),
    });
    let FetchResponse {
        payload,
        status_code,
        duration,
        error,
    } = client.get_results(ctx, query, headers).await;

    let annotation = Annotation::new(client, query, &payload, status_code, duration);
    ctx.emit(Event::FetchEnd {
        ref_id: query.ref_id().to_string(),
        status_code,
        duration: annotation.duration(),
        ok: error.is_none(),
    });

    if let Some(error) = error {
        annotation.apply(&mut frame, Some(&error));
        return FrameResponse {
            frame,
            error: Some(error),
        };
    }

    let (mut frame, error) = dispatch(ctx, query, &payload, frame, post_processing).await;
    if let Some(ref e) = error {
        ctx.emit(Event::DispatchFailed {
            ref_id: query.ref_id().to_string(),
            error: e.to_string(),
        });
    }
    annotation.apply(&mut frame, error.as_ref());
    FrameResponse { frame, error }
}

/// Route, decode and post-process. Returns the best frame plus the first
/// error, if any.
async fn dispatch(
    ctx: &ExecCtx,
    query: &Query,
    payload: &Value,
    placeholder: Frame,
    post_processing: bool,
) -> (Frame, Option<FrameError>) {
    let Some(route) = ctx.router.select(query) else {
        let error = FrameError::InvalidQuery(format!(
            "no route for type '{}' with parser '{}'",
            query.kind(),
            query.parser()
        ));
        return (placeholder, Some(error));
    };
    ctx.emit(Event::RouteSelected {
        ref_id: query.ref_id().to_string(),
        route: route.name(),
    });

    let frame = match route.decode(payload, query) {
        Ok(frame) => frame,
        Err(e) => return (placeholder, Some(e)),
    };

    if !post_processing || query.parser() != ParserMode::Backend {
        return (frame, None);
    }
    if let Err(e) = ctx.check_cancelled() {
        return (frame, Some(e));
    }

    let processed = ctx.post_processor.apply(ctx, &frame, query).await;
    ctx.emit(Event::PostProcessed {
        ref_id: query.ref_id().to_string(),
        processor: ctx.post_processor.name(),
        ok: processed.is_ok(),
    });
    match processed {
        Ok(processed) => (processed, None),
        Err(e) => (frame, Some(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MOCK_DURATION;
    use crate::events::EventHandler;
    use crate::fetch::MockClient;
    use crate::postprocess::PostProcessor;
    use crate::query::{Column, Filter, FilterOperator, QueryType};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Event>>);

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.0.lock().unwrap().clone()
        }

        fn routes(&self) -> Vec<&'static str> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::RouteSelected { route, .. } => Some(route),
                    _ => None,
                })
                .collect()
        }

        fn failures(&self) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, Event::DispatchFailed { .. }))
                .count()
        }
    }

    impl EventHandler for Recorder {
        fn on_event(&self, event: Event) {
            self.0.lock().unwrap().push(event);
        }
    }

    struct FailingPostProcessor;

    #[async_trait]
    impl PostProcessor for FailingPostProcessor {
        async fn apply(&self, _ctx: &ExecCtx, _frame: &Frame, _query: &Query) -> Result<Frame> {
            Err(anyhow::anyhow!("transform exploded").into())
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    /// Real-mode client returning one scripted response.
    struct ScriptedClient {
        status_code: u16,
        duration: Duration,
    }

    #[async_trait]
    impl FetchClient for ScriptedClient {
        async fn get_results(
            &self,
            _ctx: &ExecCtx,
            _query: &Query,
            headers: &HashMap<String, String>,
        ) -> FetchResponse {
            FetchResponse::ok(json!([headers]), self.status_code, self.duration)
        }

        fn executed_url(&self, _query: &Query) -> String {
            "scripted://source".to_string()
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn ctx_with(recorder: &Arc<Recorder>) -> ExecCtx {
        ExecCtx::builder()
            .event_handler(recorder.clone() as Arc<dyn EventHandler>)
            .build()
    }

    fn query(kind: QueryType, parser: ParserMode) -> crate::query::QueryBuilder {
        Query::builder(kind, "https://example.com/api")
            .ref_id("A")
            .parser(parser)
    }

    #[tokio::test]
    async fn test_json_backend_success() {
        let recorder = Arc::new(Recorder::default());
        let q = query(QueryType::Json, ParserMode::Backend).build().unwrap();
        let client = MockClient::fixed(json!({"a": 1}));

        let response = execute(&ctx_with(&recorder), &q, &client, &HashMap::new()).await;

        assert!(response.is_ok());
        assert_eq!(response.frame.row_count(), 1);
        assert_eq!(response.frame.meta.executed_query_string, "https://example.com/api");
        let meta = response.frame.meta.custom.as_ref().unwrap();
        assert_eq!(meta.response_code_from_server, 200);
        assert_eq!(meta.error, "");
        assert_eq!(meta.data, json!({"a": 1}));
        assert_eq!(meta.query, q);
        assert_eq!(recorder.routes(), vec!["json-backend"]);
        assert_eq!(recorder.failures(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_client_values() {
        let recorder = Arc::new(Recorder::default());
        let q = query(QueryType::Json, ParserMode::Backend)
            .column(Column::new("a"))
            .build()
            .unwrap();
        let client = MockClient::fixed(Value::Null)
            .failing("timeout awaiting response headers")
            .with_status(0)
            .with_duration(Duration::from_secs(30))
            .with_mock_mode(false);

        let response = execute(&ctx_with(&recorder), &q, &client, &HashMap::new()).await;

        assert!(matches!(
            &response.error,
            Some(FrameError::Other(msg)) if msg == "timeout awaiting response headers"
        ));
        let meta = response.frame.meta.custom.clone().unwrap();
        assert_eq!(meta.error, "timeout awaiting response headers");
        assert_eq!(meta.response_code_from_server, 0);
        assert_eq!(meta.duration, Duration::from_secs(30));
        assert_eq!(response.frame.fields, Frame::placeholder(&q).fields);
        assert_eq!(response.frame.row_count(), 0);
        assert!(recorder.routes().is_empty());
        assert_eq!(recorder.failures(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_blank_query_selects_everything() {
        let q = query(QueryType::Json, ParserMode::Sqlite).build().unwrap();
        assert_eq!(q.sqlite_query(), "");
        assert_eq!(q.resolved_sqlite_query(), "SELECT * FROM input");

        let client = MockClient::fixed(json!([{"x": 1}, {"x": 2}]));
        let response = execute(&ExecCtx::default(), &q, &client, &HashMap::new()).await;

        let frame = tokio_test::assert_ok!(response.into_result());
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.field("x").unwrap().values, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_mock_mode_reports_sentinel_duration() {
        let q = query(QueryType::Json, ParserMode::Backend).build().unwrap();
        let client = MockClient::fixed(json!([])).with_duration(Duration::from_secs(9));
        let response = execute(&ExecCtx::default(), &q, &client, &HashMap::new()).await;
        let meta = response.frame.meta.custom.unwrap();
        assert_eq!(meta.duration, MOCK_DURATION);
    }

    #[tokio::test]
    async fn test_real_client_duration_and_headers() {
        let q = query(QueryType::Json, ParserMode::Backend).build().unwrap();
        let client = ScriptedClient {
            status_code: 201,
            duration: Duration::from_millis(250),
        };
        let mut headers = HashMap::new();
        headers.insert("x-trace".to_string(), "t1".to_string());

        let response = execute(&ExecCtx::default(), &q, &client, &headers).await;

        assert!(response.is_ok());
        assert_eq!(response.frame.meta.executed_query_string, "scripted://source");
        assert_eq!(response.frame.field("x-trace").unwrap().values, vec![json!("t1")]);
        let meta = response.frame.meta.custom.unwrap();
        assert_eq!(meta.duration, Duration::from_millis(250));
        assert_eq!(meta.response_code_from_server, 201);
    }

    #[tokio::test]
    async fn test_csv_with_structured_payload_is_explicit_error() {
        let recorder = Arc::new(Recorder::default());
        let q = query(QueryType::Csv, ParserMode::Backend)
            .column(Column::new("a"))
            .build()
            .unwrap();
        let client = MockClient::fixed(json!({"a": 1}));

        let response = execute(&ctx_with(&recorder), &q, &client, &HashMap::new()).await;

        assert!(matches!(
            response.error,
            Some(FrameError::UnsupportedPayload {
                route: "csv-backend",
                ..
            })
        ));
        assert_eq!(response.frame.fields, Frame::placeholder(&q).fields);
        let meta = response.frame.meta.custom.as_ref().unwrap();
        assert!(meta.error.contains("expects a string payload"));
        assert_eq!(meta.data, json!({"a": 1}));
        assert_eq!(recorder.failures(), 1);
    }

    #[tokio::test]
    async fn test_csv_text_payload() {
        let q = query(QueryType::Csv, ParserMode::Backend).build().unwrap();
        let client = MockClient::fixed(json!("city,pop\nOslo,709000\nBergen,291000\n"));
        let response = execute(&ExecCtx::default(), &q, &client, &HashMap::new()).await;
        assert!(response.is_ok());
        assert_eq!(response.frame.row_count(), 2);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let q = query(QueryType::Json, ParserMode::Backend).build().unwrap();
        let client = MockClient::fixed(json!("upstream down")).with_status(503);
        let response = execute(&ExecCtx::default(), &q, &client, &HashMap::new()).await;
        assert!(matches!(
            response.error,
            Some(FrameError::HttpError { status: 503, .. })
        ));
        let meta = response.frame.meta.custom.unwrap();
        assert_eq!(meta.response_code_from_server, 503);
        assert_eq!(meta.data, json!("upstream down"));
    }

    #[tokio::test]
    async fn test_filters_apply_only_when_requested() {
        let q = query(QueryType::Json, ParserMode::Backend)
            .filter(Filter::new("n", FilterOperator::GreaterThan, "1"))
            .build()
            .unwrap();
        let client = MockClient::fixed(json!([{"n": 1}, {"n": 2}, {"n": 3}]));
        let ctx = ExecCtx::default();

        let filtered = execute_with_post_processing(&ctx, &q, &client, &HashMap::new(), true).await;
        assert_eq!(filtered.frame.row_count(), 2);

        let raw = execute_with_post_processing(&ctx, &q, &client, &HashMap::new(), false).await;
        assert_eq!(raw.frame.row_count(), 3);
    }

    #[tokio::test]
    async fn test_post_processing_failure_keeps_decoded_frame() {
        let recorder = Arc::new(Recorder::default());
        let ctx = ExecCtx::builder()
            .event_handler(recorder.clone() as Arc<dyn EventHandler>)
            .post_processor(Arc::new(FailingPostProcessor))
            .build();
        let q = query(QueryType::Json, ParserMode::Backend).build().unwrap();
        let client = MockClient::fixed(json!([{"a": 1}]));

        let response = execute(&ctx, &q, &client, &HashMap::new()).await;

        assert!(matches!(&response.error, Some(FrameError::Other(m)) if m == "transform exploded"));
        assert_eq!(response.frame.row_count(), 1);
        assert_eq!(
            response.frame.meta.custom.as_ref().unwrap().error,
            "transform exploded"
        );
        assert_eq!(recorder.failures(), 1);
        assert!(recorder.events().contains(&Event::PostProcessed {
            ref_id: "A".to_string(),
            processor: "failing",
            ok: false,
        }));
    }

    /// Decodes one row, then raises the cancellation flag.
    struct CancellingRoute(Arc<AtomicBool>);

    impl crate::Route for CancellingRoute {
        fn name(&self) -> &'static str {
            "cancelling"
        }

        fn matches(&self, _query: &Query) -> bool {
            true
        }

        fn decode(&self, _payload: &Value, query: &Query) -> Result<Frame> {
            self.0.store(true, Ordering::SeqCst);
            let mut frame = Frame::new(query.ref_id());
            frame.fields.push(
                crate::frame::Field::new("a", crate::frame::FieldType::Number)
                    .with_values(vec![json!(1)]),
            );
            Ok(frame)
        }
    }

    #[tokio::test]
    async fn test_cancel_after_decode_skips_post_processing() {
        let recorder = Arc::new(Recorder::default());
        let cancel = Arc::new(AtomicBool::new(false));
        let ctx = ExecCtx::builder()
            .cancellation(Some(cancel.clone()))
            .event_handler(recorder.clone() as Arc<dyn EventHandler>)
            .post_processor(Arc::new(FailingPostProcessor))
            .router(crate::Router::new().push(Box::new(CancellingRoute(cancel.clone()))))
            .build();
        let q = query(QueryType::Json, ParserMode::Backend).build().unwrap();
        let client = MockClient::fixed(json!([{"a": 1}]));

        let response = execute_with_post_processing(&ctx, &q, &client, &HashMap::new(), true).await;

        assert!(cancel.load(Ordering::SeqCst));
        assert!(matches!(response.error, Some(FrameError::Cancelled)));
        assert_eq!(response.frame.row_count(), 1);
        assert_eq!(response.frame.field("a").unwrap().values, vec![json!(1)]);
        assert_eq!(
            response.frame.meta.custom.as_ref().unwrap().error,
            "Query execution was cancelled"
        );
        assert_eq!(recorder.routes(), vec!["cancelling"]);
        assert_eq!(recorder.failures(), 1);
        assert!(!recorder
            .events()
            .iter()
            .any(|e| matches!(e, Event::PostProcessed { .. })));
    }

    #[tokio::test]
    async fn test_client_side_parser_passes_payload_through() {
        let ctx = ExecCtx::builder()
            .post_processor(Arc::new(FailingPostProcessor))
            .build();
        let q = query(QueryType::Json, ParserMode::Uql)
            .column(Column::new("a"))
            .build()
            .unwrap();
        let client = MockClient::fixed(json!([{"a": 1}]));

        let response = execute(&ctx, &q, &client, &HashMap::new()).await;

        assert!(response.is_ok());
        assert_eq!(response.frame.fields, Frame::placeholder(&q).fields);
        assert_eq!(
            response.frame.meta.custom.unwrap().data,
            json!([{"a": 1}])
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let cancel = Arc::new(AtomicBool::new(true));
        let ctx = ExecCtx::builder().cancellation(Some(cancel)).build();
        let q = query(QueryType::Json, ParserMode::Backend).build().unwrap();
        let client = MockClient::fixed(json!({"a": 1}));

        let response = execute(&ctx, &q, &client, &HashMap::new()).await;

        assert!(matches!(response.error, Some(FrameError::Cancelled)));
        assert_eq!(client.calls(), 0);
        let meta = response.frame.meta.custom.unwrap();
        assert_eq!(meta.response_code_from_server, 0);
        assert_eq!(meta.data, Value::Null);
        assert_eq!(response.frame.meta.executed_query_string, "https://example.com/api");
    }

    #[tokio::test]
    async fn test_cancellation_is_not_sticky_across_contexts() {
        let cancel = Arc::new(AtomicBool::new(false));
        let ctx = ExecCtx::builder().cancellation(Some(cancel.clone())).build();
        let q = query(QueryType::Json, ParserMode::Backend).build().unwrap();
        let client = MockClient::fixed(json!({"a": 1}));

        assert!(execute(&ctx, &q, &client, &HashMap::new()).await.is_ok());
        cancel.store(true, Ordering::Relaxed);
        assert!(!execute(&ctx, &q, &client, &HashMap::new()).await.is_ok());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_every_route_runs_once() {
        let cases = [
            (QueryType::Json, ParserMode::Backend, json!({"a": 1}), "json-backend"),
            (QueryType::GraphQl, ParserMode::Backend, json!({"a": 1}), "json-backend"),
            (QueryType::Tsv, ParserMode::Backend, json!("a\tb\n1\t2"), "csv-backend"),
            (QueryType::Xml, ParserMode::Backend, json!("<a><b>1</b></a>"), "xml-backend"),
            (QueryType::Json, ParserMode::Sqlite, json!([{"a": 1}]), "json-sqlite"),
            (QueryType::Html, ParserMode::Groq, json!("<p>x</p>"), "client-side"),
            (
                QueryType::GoogleSheets,
                ParserMode::Simple,
                json!({"sheets": [{"data": [{"rowData": []}]}]}),
                "google-sheets",
            ),
        ];
        for (kind, parser, payload, expected) in cases {
            let recorder = Arc::new(Recorder::default());
            let q = query(kind, parser).build().unwrap();
            let client = MockClient::fixed(payload);
            let response = execute(&ctx_with(&recorder), &q, &client, &HashMap::new()).await;
            assert!(response.is_ok(), "{}: {:?}", expected, response.error);
            assert_eq!(recorder.routes(), vec![expected]);
            assert!(response.frame.meta.custom.is_some());
        }
    }

    #[tokio::test]
    async fn test_google_sheets_failure_is_annotated() {
        let q = Query::builder(QueryType::GoogleSheets, "sheet-id")
            .ref_id("G")
            .build()
            .unwrap();
        let client = MockClient::fixed(json!({"unexpected": true}));
        let response = execute(&ExecCtx::default(), &q, &client, &HashMap::new()).await;
        assert!(matches!(response.error, Some(FrameError::Decode { .. })));
        let meta = response.frame.meta.custom.unwrap();
        assert!(!meta.error.is_empty());
        assert!(response
            .frame
            .meta
            .executed_query_string
            .starts_with("https://sheets.googleapis.com/v4/spreadsheets/sheet-id"));
    }

    #[tokio::test]
    async fn test_empty_router_reports_invalid_query() {
        let ctx = ExecCtx::builder().router(crate::Router::new()).build();
        let q = query(QueryType::Json, ParserMode::Backend).build().unwrap();
        let client = MockClient::fixed(json!({}));
        let response = execute(&ctx, &q, &client, &HashMap::new()).await;
        assert!(matches!(response.error, Some(FrameError::InvalidQuery(_))));
        assert!(response.frame.meta.custom.is_some());
    }

    #[tokio::test]
    async fn test_annotation_is_idempotent() {
        let q = query(QueryType::Json, ParserMode::Backend).build().unwrap();
        let client = MockClient::fixed(json!({"a": 1}));
        let response = execute(&ExecCtx::default(), &q, &client, &HashMap::new()).await;

        let payload = json!({"a": 1});
        let annotation = Annotation::new(&client, &q, &payload, 200, Duration::ZERO);
        let mut again = response.frame.clone();
        annotation.apply(&mut again, None);
        annotation.apply(&mut again, None);
        assert_eq!(again, response.frame);
    }
}
