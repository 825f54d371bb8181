//! Route selection.
//!
//! [`Router`] holds an ordered list of [`Route`]s. For each query the first
//! route whose [`Route::matches`] returns true decodes the payload, so
//! exactly one decoder runs per query.
//!
//! [`Router::standard`] covers every `type` × `parser` combination a
//! validated [`Query`] can hold. Custom routes can be pushed in front of or
//! behind it by building a router by hand.

use crate::decoder::{delimited, json, markup, payload_kind, sheets, sqlite};
use crate::error::{FrameError, Result};
use crate::frame::Frame;
use crate::query::{ParserMode, Query, QueryType};
use serde_json::Value;

/// A matcher plus decoder.
pub trait Route: Send + Sync {
    /// Stable name, reported in events.
    fn name(&self) -> &'static str;

    /// Whether this route handles `query`.
    fn matches(&self, query: &Query) -> bool;

    /// Turn the fetched payload into a frame.
    fn decode(&self, payload: &Value, query: &Query) -> Result<Frame>;
}

/// Ordered list of routes; the first match wins.
///
/// # Example
///
/// ```
/// use query_frames::query::{ParserMode, Query, QueryType};
/// use query_frames::Router;
///
/// let router = Router::standard();
/// let query = Query::builder(QueryType::Csv, "https://example.com/a.csv")
///     .parser(ParserMode::Backend)
///     .build()
///     .unwrap();
/// assert_eq!(router.select(&query).map(|r| r.name()), Some("csv-backend"));
/// ```
pub struct Router {
    routes: Vec<Box<dyn Route>>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// The built-in routes, in precedence order.
    pub fn standard() -> Self {
        Self::new()
            .push(Box::new(GoogleSheetsRoute))
            .push(Box::new(JsonBackendRoute))
            .push(Box::new(CsvBackendRoute))
            .push(Box::new(XmlBackendRoute))
            .push(Box::new(JsonSqliteRoute))
            .push(Box::new(ClientSideRoute))
    }

    /// Add a route at the end (builder style).
    pub fn push(mut self, route: Box<dyn Route>) -> Self {
        self.routes.push(route);
        self
    }

    /// Add a route at the end (mutation style).
    pub fn add(&mut self, route: Box<dyn Route>) {
        self.routes.push(route);
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the router has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route that matches `query`.
    pub fn select(&self, query: &Query) -> Option<&dyn Route> {
        self.routes
            .iter()
            .find(|route| route.matches(query))
            .map(|route| route.as_ref())
    }

    /// Route names in precedence order.
    pub fn route_names(&self) -> Vec<&'static str> {
        self.routes.iter().map(|r| r.name()).collect()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.route_names())
            .finish()
    }
}

fn require_text<'a>(route: &'static str, payload: &'a Value) -> Result<&'a str> {
    payload
        .as_str()
        .ok_or_else(|| FrameError::UnsupportedPayload {
            route,
            expected: "string",
            found: payload_kind(payload),
        })
}

struct GoogleSheetsRoute;

impl Route for GoogleSheetsRoute {
    fn name(&self) -> &'static str {
        "google-sheets"
    }

    fn matches(&self, query: &Query) -> bool {
        query.kind() == QueryType::GoogleSheets
    }

    fn decode(&self, payload: &Value, query: &Query) -> Result<Frame> {
        sheets::decode(payload, query)
    }
}

struct JsonBackendRoute;

impl Route for JsonBackendRoute {
    fn name(&self) -> &'static str {
        "json-backend"
    }

    fn matches(&self, query: &Query) -> bool {
        query.parser() == ParserMode::Backend
            && matches!(query.kind(), QueryType::Json | QueryType::GraphQl)
    }

    fn decode(&self, payload: &Value, query: &Query) -> Result<Frame> {
        json::decode(payload, query)
    }
}

struct CsvBackendRoute;

impl Route for CsvBackendRoute {
    fn name(&self) -> &'static str {
        "csv-backend"
    }

    fn matches(&self, query: &Query) -> bool {
        query.parser() == ParserMode::Backend && query.kind().is_delimited()
    }

    fn decode(&self, payload: &Value, query: &Query) -> Result<Frame> {
        let text = require_text(self.name(), payload)?;
        delimited::decode(text, query)
    }
}

struct XmlBackendRoute;

impl Route for XmlBackendRoute {
    fn name(&self) -> &'static str {
        "xml-backend"
    }

    fn matches(&self, query: &Query) -> bool {
        query.parser() == ParserMode::Backend && query.kind().is_markup()
    }

    fn decode(&self, payload: &Value, query: &Query) -> Result<Frame> {
        let text = require_text(self.name(), payload)?;
        markup::decode(text, query)
    }
}

struct JsonSqliteRoute;

impl Route for JsonSqliteRoute {
    fn name(&self) -> &'static str {
        "json-sqlite"
    }

    fn matches(&self, query: &Query) -> bool {
        query.parser() == ParserMode::Sqlite && query.kind() == QueryType::Json
    }

    fn decode(&self, payload: &Value, query: &Query) -> Result<Frame> {
        // Payloads are JSON values, strings included.
        let body = serde_json::to_string(payload).map_err(|source| FrameError::Serialization {
            context: "error while marshaling the response object".to_string(),
            source,
        })?;
        sqlite::decode(
            &body,
            query.resolved_sqlite_query(),
            query.root_selector(),
            query.ref_id(),
        )
    }
}

/// `simple`, `uql` and `groq` are evaluated by the caller; the raw payload
/// travels in the diagnostics.
struct ClientSideRoute;

impl Route for ClientSideRoute {
    fn name(&self) -> &'static str {
        "client-side"
    }

    fn matches(&self, query: &Query) -> bool {
        query.parser().is_client_side()
    }

    fn decode(&self, _payload: &Value, query: &Query) -> Result<Frame> {
        Ok(Frame::placeholder(query))
    }
}
