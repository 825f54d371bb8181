use thiserror::Error;

/// Errors produced while fetching, decoding, or post-processing a query.
///
/// Every variant is recoverable by the caller. The pipeline returns these
/// next to a frame rather than in place of one; see
/// [`FrameResponse`](crate::pipeline::FrameResponse).
#[derive(Error, Debug)]
pub enum FrameError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server answered with a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 404, 500).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The execution context was cancelled via its cancellation flag.
    #[error("Query execution was cancelled")]
    Cancelled,

    /// The query combines a type and parser that cannot work together.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid client or context configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A route expected one payload representation and got another.
    #[error("route '{route}' expects a {expected} payload, got {found}")]
    UnsupportedPayload {
        /// Name of the route that rejected the payload.
        route: &'static str,
        /// Representation the route needs (e.g. `"string"`).
        expected: &'static str,
        /// Representation that arrived (e.g. `"object"`).
        found: &'static str,
    },

    /// A decoder could not turn the payload into a frame.
    #[error("failed to decode {format} response: {message}")]
    Decode {
        /// Format being decoded (e.g. `"json"`, `"google-sheets"`).
        format: &'static str,
        /// What went wrong.
        message: String,
    },

    /// Delimited text could not be read.
    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    /// Markup could not be read.
    #[error("XML parsing failed: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The embedded SQL engine rejected the data or the query.
    #[error("SQLite query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A payload could not be serialized back to text.
    #[error("{context}: {source}")]
    Serialization {
        /// What was being serialized.
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The post-processing stage failed.
    #[error("post-processing failed: {0}")]
    PostProcess(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl FrameError {
    /// Shorthand for a [`FrameError::Decode`].
    pub(crate) fn decode(format: &'static str, message: impl Into<String>) -> Self {
        FrameError::Decode {
            format,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for FrameError {
    fn from(err: anyhow::Error) -> Self {
        FrameError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_payload_message() {
        let err = FrameError::UnsupportedPayload {
            route: "csv-backend",
            expected: "string",
            found: "object",
        };
        assert_eq!(
            err.to_string(),
            "route 'csv-backend' expects a string payload, got object"
        );
    }

    #[test]
    fn test_serialization_keeps_context() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = FrameError::Serialization {
            context: "error while marshaling the response object".into(),
            source,
        };
        assert!(err
            .to_string()
            .starts_with("error while marshaling the response object: "));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_anyhow() {
        let err: FrameError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, FrameError::Other(ref m) if m == "boom"));
    }
}
