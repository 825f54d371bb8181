//! Event hooks for query execution.
//!
//! The pipeline reports what it does through an [`EventHandler`] injected on
//! the [`ExecCtx`](crate::ExecCtx) instead of writing to a global logger.
//! [`TracingEventHandler`] is the default and forwards everything to
//! `tracing`; tests and embedders can swap in their own handler.

use std::time::Duration;

/// Events emitted during query execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The fetch is about to start.
    FetchStart {
        /// Query ref id.
        ref_id: String,
        /// URL the client will request.
        url: String,
    },
    /// The fetch returned.
    FetchEnd {
        ref_id: String,
        status_code: u16,
        duration: Duration,
        /// Whether the client reported no error.
        ok: bool,
    },
    /// The router picked a route for the payload.
    RouteSelected {
        ref_id: String,
        /// Route name (e.g. `"json-backend"`).
        route: &'static str,
    },
    /// Post-processing ran over the decoded frame.
    PostProcessed {
        ref_id: String,
        /// Name of the post-processor.
        processor: &'static str,
        ok: bool,
    },
    /// Decoding or post-processing failed.
    DispatchFailed {
        ref_id: String,
        /// Error text as recorded in the diagnostics.
        error: String,
    },
}

/// Handler for execution events.
///
/// # Example
///
/// ```
/// use query_frames::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         if let Event::DispatchFailed { ref_id, error } = event {
///             eprintln!("[{}] {}", ref_id, error);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the pipeline emits an event.
    fn on_event(&self, event: Event);
}

/// Forwards events to the `tracing` crate.
///
/// Dispatch failures are logged at `error`, everything else at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventHandler;

impl EventHandler for TracingEventHandler {
    fn on_event(&self, event: Event) {
        match event {
            Event::FetchStart { ref_id, url } => {
                tracing::debug!(ref_id = %ref_id, url = %url, "fetching query");
            }
            Event::FetchEnd {
                ref_id,
                status_code,
                duration,
                ok,
            } => {
                tracing::debug!(
                    ref_id = %ref_id,
                    status_code,
                    duration_ms = duration.as_millis() as u64,
                    ok,
                    "fetch finished"
                );
            }
            Event::RouteSelected { ref_id, route } => {
                tracing::debug!(ref_id = %ref_id, route, "route selected");
            }
            Event::PostProcessed {
                ref_id,
                processor,
                ok,
            } => {
                tracing::debug!(ref_id = %ref_id, processor, ok, "post-processing finished");
            }
            Event::DispatchFailed { ref_id, error } => {
                tracing::error!(ref_id = %ref_id, error = %error, "error getting response for query");
            }
        }
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use query_frames::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::RouteSelected { route, .. } = event {
///         println!("decoding with {}", route);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_fn_handler_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = FnEventHandler(move |e: Event| sink.lock().unwrap().push(e));
        handler.on_event(Event::RouteSelected {
            ref_id: "A".into(),
            route: "csv-backend",
        });
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], Event::RouteSelected { route: "csv-backend", .. }));
    }

    #[test]
    fn test_tracing_handler_without_subscriber() {
        // No subscriber installed: must be a silent no-op.
        TracingEventHandler.on_event(Event::DispatchFailed {
            ref_id: "A".into(),
            error: "boom".into(),
        });
    }
}
