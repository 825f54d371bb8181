//! # Query Frames
//!
//! Execute declarative URL queries and turn the payloads into annotated
//! tabular frames.
//!
//! A [`Query`] names a source (`json`, `csv`, `tsv`, `xml`, `html`,
//! `graphql`, `google-sheets`) and a parser mode. The pipeline fetches the
//! payload through a [`FetchClient`], picks exactly one decoder through the
//! [`Router`], optionally post-processes the frame, and always returns a
//! [`Frame`] carrying the executed URL and a [`CustomMeta`] diagnostics
//! block, including on failure.
//!
//! ## Core Concepts
//!
//! - **[`Query`]**: validated at construction; invalid `type` × `parser`
//!   combinations never reach the pipeline.
//! - **[`FetchClient`]**: object-safe trait for payload sources.
//!   [`HttpClient`] talks HTTP, [`MockClient`] returns canned payloads.
//! - **[`ExecCtx`]**: cancellation flag, event handler, post-processor and
//!   router shared by executions.
//! - **[`Router`]**: ordered routes, first match decodes.
//! - **[`FrameResponse`]**: the annotated frame plus the error, if any.
//!
//! ## Quick Start
//!
//! ```no_run
//! use query_frames::query::{ParserMode, Query, QueryType};
//! use query_frames::{pipeline, ExecCtx, HttpClient};
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::builder().user_agent("query-frames").build()?;
//!     let query = Query::builder(QueryType::Csv, "https://example.com/cities.csv")
//!         .ref_id("A")
//!         .parser(ParserMode::Backend)
//!         .build()?;
//!
//!     let ctx = ExecCtx::default();
//!     let response = pipeline::execute(&ctx, &query, &client, &HashMap::new()).await;
//!     println!("{} rows", response.frame.row_count());
//!     if let Some(meta) = &response.frame.meta.custom {
//!         println!("status {} in {:?}", meta.response_code_from_server, meta.duration);
//!     }
//!     Ok(())
//! }
//! ```

pub mod decoder;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod fetch;
pub mod frame;
pub mod pipeline;
pub mod postprocess;
pub mod query;
pub mod router;

pub use diagnostics::{Annotation, CustomMeta, MOCK_DURATION};
pub use error::{FrameError, Result};
pub use events::{Event, EventHandler, FnEventHandler, TracingEventHandler};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use fetch::{FetchClient, FetchResponse, HttpClient, HttpClientBuilder, MockClient};
pub use frame::{Field, FieldType, Frame, FrameMeta};
pub use pipeline::{execute, execute_with_post_processing, FrameResponse};
pub use postprocess::{FilterPostProcessor, NoopPostProcessor, PostProcessor};
pub use query::{ParserMode, Query, QueryBuilder, QueryType};
pub use router::{Route, Router};
