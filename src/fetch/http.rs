//! HTTP fetch client built on `reqwest`.
//!
//! [`HttpClient`] turns a [`Query`] into a GET or POST request, streams the
//! body while watching the context's cancellation flag, and decodes JSON
//! bodies for JSON-family query types. Text types (CSV, TSV, XML, HTML) are
//! returned as `Value::String`.

use super::{executed_url, request_url, FetchClient, FetchResponse};
use crate::error::FrameError;
use crate::exec_ctx::ExecCtx;
use crate::query::{HttpMethod, KeyValue, Query, QueryType};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A failed exchange, with whatever arrived before the failure.
struct Failure {
    error: FrameError,
    payload: Value,
    status_code: u16,
}

impl From<FrameError> for Failure {
    fn from(error: FrameError) -> Self {
        Failure {
            error,
            payload: Value::Null,
            status_code: 0,
        }
    }
}

/// Fetch client for URL sources.
///
/// # Header precedence
///
/// Client default headers, then the query's `url_options.headers`, then the
/// caller's headers; later entries replace earlier ones with the same name.
///
/// # Body encoding
///
/// Bodies are read as UTF-8. Bytes that are not valid UTF-8 (a Latin-1 CSV,
/// say) are replaced with U+FFFD and a `debug` event is logged.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    default_headers: Vec<KeyValue>,
}

impl HttpClient {
    /// Create a new builder.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder {
            client: None,
            timeout: None,
            user_agent: None,
            default_headers: Vec::new(),
        }
    }

    fn build_request(
        &self,
        query: &Query,
        headers: &HashMap<String, String>,
    ) -> std::result::Result<RequestBuilder, FrameError> {
        let url = request_url(query)?;
        let options = query.url_options();

        let mut merged: Vec<(String, String)> = Vec::new();
        for kv in self.default_headers.iter().chain(options.headers.iter()) {
            set_header(&mut merged, &kv.key, &kv.value);
        }
        let mut caller: Vec<_> = headers.iter().collect();
        caller.sort();
        for (k, v) in caller {
            set_header(&mut merged, k, v);
        }

        let mut request = match options.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => {
                let has_content_type = merged
                    .iter()
                    .any(|(k, _)| k.eq_ignore_ascii_case("content-type"));
                let mut request = self.client.post(url).body(request_body(query));
                if !has_content_type && query.kind().is_json_family() {
                    request = request.header("Content-Type", "application/json");
                }
                request
            }
        };
        for (k, v) in &merged {
            request = request.header(k.as_str(), v.as_str());
        }
        Ok(request)
    }

    async fn exchange(
        &self,
        ctx: &ExecCtx,
        query: &Query,
        headers: &HashMap<String, String>,
    ) -> std::result::Result<(Value, u16), Failure> {
        ctx.check_cancelled()?;
        let request = self.build_request(query, headers)?;
        let resp = request.send().await.map_err(FrameError::Request)?;
        let status = resp.status();
        let status_code = status.as_u16();

        let mut stream = resp.bytes_stream();
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            if ctx.is_cancelled() {
                return Err(Failure {
                    error: FrameError::Cancelled,
                    payload: Value::Null,
                    status_code,
                });
            }
            let chunk = chunk.map_err(|e| Failure {
                error: FrameError::Request(e),
                payload: Value::Null,
                status_code,
            })?;
            body.extend_from_slice(&chunk);
        }
        let text = body_text(&body, query);

        if !status.is_success() {
            return Err(Failure {
                error: FrameError::HttpError {
                    status: status_code,
                    body: text.clone(),
                },
                payload: Value::String(text),
                status_code,
            });
        }

        if query.kind().is_json_family() {
            match serde_json::from_str::<Value>(&text) {
                Ok(payload) => Ok((payload, status_code)),
                Err(e) => Err(Failure {
                    error: FrameError::Json(e),
                    payload: Value::String(text),
                    status_code,
                }),
            }
        } else {
            Ok((Value::String(text), status_code))
        }
    }
}

/// Body as text. Invalid UTF-8 sequences become U+FFFD.
fn body_text(body: &[u8], query: &Query) -> String {
    match String::from_utf8_lossy(body) {
        Cow::Borrowed(text) => text.to_string(),
        Cow::Owned(text) => {
            tracing::debug!(
                ref_id = %query.ref_id(),
                bytes = body.len(),
                "response body is not valid UTF-8, invalid sequences replaced"
            );
            text
        }
    }
}

/// Insert or replace a header, matching names case-insensitively.
fn set_header(headers: &mut Vec<(String, String)>, key: &str, value: &str) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    headers.push((key.to_string(), value.to_string()));
}

/// Body sent on POST: GraphQL documents are wrapped as `{"query": ...}`.
fn request_body(query: &Query) -> String {
    let options = query.url_options();
    match (&options.graphql_query, query.kind()) {
        (Some(document), QueryType::GraphQl) => json!({ "query": document }).to_string(),
        _ => options.body.clone().unwrap_or_default(),
    }
}

#[async_trait]
impl FetchClient for HttpClient {
    async fn get_results(
        &self,
        ctx: &ExecCtx,
        query: &Query,
        headers: &HashMap<String, String>,
    ) -> FetchResponse {
        let started = Instant::now();
        match self.exchange(ctx, query, headers).await {
            Ok((payload, status_code)) => {
                FetchResponse::ok(payload, status_code, started.elapsed())
            }
            Err(failure) => FetchResponse::failed(
                failure.error,
                failure.payload,
                failure.status_code,
                started.elapsed(),
            ),
        }
    }

    fn executed_url(&self, query: &Query) -> String {
        executed_url(query)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    client: Option<Client>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    default_headers: Vec<KeyValue>,
}

impl HttpClientBuilder {
    /// Set the HTTP client. If not set, a client is built from the other
    /// settings; if set, `timeout` and `user_agent` are ignored.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the request timeout. Default: 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push(KeyValue::new(key, value));
        self
    }

    /// Build the client.
    pub fn build(self) -> crate::error::Result<HttpClient> {
        let client = match self.client {
            Some(client) => client,
            None => {
                let mut builder =
                    Client::builder().timeout(self.timeout.unwrap_or(Duration::from_secs(60)));
                if let Some(ua) = self.user_agent {
                    builder = builder.user_agent(ua);
                }
                builder.build().map_err(|e| {
                    FrameError::InvalidConfig(format!("failed to build HTTP client: {}", e))
                })?
            }
        };
        Ok(HttpClient {
            client,
            default_headers: self.default_headers,
        })
    }
}
