//! Execution context shared across query executions.
//!
//! [`ExecCtx`] carries the cancellation handle, the event handler used for
//! logging, the post-processor and the router. Build it once and share it
//! across concurrent executions; it holds no per-query state.

use crate::events::{Event, EventHandler, TracingEventHandler};
use crate::postprocess::{FilterPostProcessor, PostProcessor};
use crate::router::Router;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared execution context for the pipeline.
///
/// # Example
///
/// ```
/// use query_frames::ExecCtx;
/// use std::sync::atomic::AtomicBool;
/// use std::sync::Arc;
///
/// let cancel = Arc::new(AtomicBool::new(false));
/// let ctx = ExecCtx::builder()
///     .cancellation(Some(cancel.clone()))
///     .build();
/// assert!(!ctx.is_cancelled());
/// ```
pub struct ExecCtx {
    /// Optional cancellation flag, checked before fetching and before
    /// post-processing, and by clients while reading a body.
    pub cancellation: Option<Arc<AtomicBool>>,
    /// Receives lifecycle events. Default: [`TracingEventHandler`].
    pub event_handler: Arc<dyn EventHandler>,
    /// Applied after `backend` routes. Default: [`FilterPostProcessor`].
    pub post_processor: Arc<dyn PostProcessor>,
    /// Picks the decoder for each query. Default: [`Router::standard`].
    pub router: Arc<Router>,
}

impl ExecCtx {
    /// Create a new builder.
    pub fn builder() -> ExecCtxBuilder {
        ExecCtxBuilder {
            cancellation: None,
            event_handler: None,
            post_processor: None,
            router: None,
        }
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Return an error if cancellation has been requested.
    pub fn check_cancelled(&self) -> crate::error::Result<()> {
        if self.is_cancelled() {
            return Err(crate::FrameError::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn emit(&self, event: Event) {
        self.event_handler.on_event(event);
    }
}

impl Default for ExecCtx {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("post_processor", &self.post_processor.name())
            .field("routes", &self.router.route_names())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    cancellation: Option<Arc<AtomicBool>>,
    event_handler: Option<Arc<dyn EventHandler>>,
    post_processor: Option<Arc<dyn PostProcessor>>,
    router: Option<Arc<Router>>,
}

impl ExecCtxBuilder {
    /// Set the cancellation flag.
    pub fn cancellation(mut self, cancel: Option<Arc<AtomicBool>>) -> Self {
        self.cancellation = cancel;
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set the post-processor.
    pub fn post_processor(mut self, processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }

    /// Replace the standard router.
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(Arc::new(router));
        self
    }

    /// Build the execution context.
    pub fn build(self) -> ExecCtx {
        ExecCtx {
            cancellation: self.cancellation,
            event_handler: self
                .event_handler
                .unwrap_or_else(|| Arc::new(TracingEventHandler)),
            post_processor: self
                .post_processor
                .unwrap_or_else(|| Arc::new(FilterPostProcessor)),
            router: self.router.unwrap_or_else(|| Arc::new(Router::standard())),
        }
    }
}
