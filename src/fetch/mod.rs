//! Fetch clients and the normalized fetch response.
//!
//! The [`FetchClient`] trait abstracts over where a query's payload comes
//! from. It returns a [`FetchResponse`] that carries the payload, status
//! code and elapsed time even when the fetch failed, so the pipeline can
//! always report them. Built-in implementations: [`HttpClient`] and
//! [`MockClient`].
//!
//! ```text
//! Query ──► FetchClient::get_results() ──► FetchResponse ──► Router
//!                     │
//!          ┌──────────┴──────────┐
//!      HttpClient            MockClient
//!   reqwest, streamed     canned payloads,
//!        body              mock mode
//! ```

pub mod http;
pub mod mock;

pub use http::{HttpClient, HttpClientBuilder};
pub use mock::MockClient;

use crate::error::{FrameError, Result};
use crate::exec_ctx::ExecCtx;
use crate::query::{Query, QueryType};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Outcome of one fetch.
///
/// `payload`, `status_code` and `duration` are filled in on failure too:
/// whatever the client got before the error.
#[derive(Debug)]
pub struct FetchResponse {
    /// Decoded JSON for JSON-family types, `Value::String` for text types.
    pub payload: Value,
    /// HTTP status code (0 when no response arrived).
    pub status_code: u16,
    /// Time spent on the whole exchange.
    pub duration: Duration,
    /// `None` on success.
    pub error: Option<FrameError>,
}

impl FetchResponse {
    pub fn ok(payload: Value, status_code: u16, duration: Duration) -> Self {
        Self {
            payload,
            status_code,
            duration,
            error: None,
        }
    }

    pub fn failed(error: FrameError, payload: Value, status_code: u16, duration: Duration) -> Self {
        Self {
            payload,
            status_code,
            duration,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Abstraction over payload sources.
///
/// This trait is object-safe and designed to be used as `&dyn FetchClient`.
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// Fetch the payload for `query`.
    ///
    /// `headers` are caller-supplied request headers; they take precedence
    /// over the query's own. Implementations should honour the context's
    /// cancellation flag.
    async fn get_results(
        &self,
        ctx: &ExecCtx,
        query: &Query,
        headers: &HashMap<String, String>,
    ) -> FetchResponse;

    /// The URL that [`get_results`](Self::get_results) requests for `query`.
    ///
    /// Pure: performs no I/O.
    fn executed_url(&self, query: &Query) -> String;

    /// Whether this client runs in mock mode, where reported durations are
    /// replaced by a fixed sentinel.
    fn is_mock(&self) -> bool {
        false
    }

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Build the request URL for a query, including its query params.
///
/// Google Sheets queries treat `url` as the spreadsheet id and target the
/// Sheets API with grid data included.
pub fn request_url(query: &Query) -> Result<Url> {
    let mut url = if query.kind() == QueryType::GoogleSheets {
        let mut url = Url::parse(&format!("{}/{}", SHEETS_API_BASE, query.url().trim()))
            .map_err(|e| FrameError::InvalidQuery(format!("invalid spreadsheet id: {}", e)))?;
        let sheet = query.spreadsheet();
        let range = match (sheet.sheet_name.as_deref(), sheet.range.as_deref()) {
            (Some(name), Some(range)) => Some(format!("{}!{}", name, range)),
            (Some(name), None) => Some(name.to_string()),
            (None, Some(range)) => Some(range.to_string()),
            (None, None) => None,
        };
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("includeGridData", "true");
            if let Some(range) = range {
                pairs.append_pair("ranges", &range);
            }
        }
        url
    } else {
        Url::parse(query.url().trim())
            .map_err(|e| FrameError::InvalidQuery(format!("invalid url '{}': {}", query.url(), e)))?
    };

    let params = &query.url_options().params;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for kv in params {
            pairs.append_pair(&kv.key, &kv.value);
        }
    }
    Ok(url)
}

/// String form of [`request_url`], falling back to the raw query URL when
/// it does not parse.
pub fn executed_url(query: &Query) -> String {
    request_url(query)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| query.url().to_string())
}
