//! Event system for generation lifecycle and streaming hooks.
//!
//! Provides an optional, non-intrusive way to observe generation. The
//! generator emits events when a request starts, when chunks arrive, when the
//! transport backs off, and when it finishes; the series orchestrator adds
//! per-episode and end-of-series events. Implement [`EventHandler`] to feed
//! a progress display or streaming UI.

use std::sync::Arc;
use uuid::Uuid;

/// Events emitted during generation.
#[derive(Debug, Clone)]
pub enum Event {
    /// A generation request has started.
    GenerationStart {
        /// Human-readable label for the request (topic or episode title).
        label: String,
        /// Name of the schema descriptor requested.
        schema: String,
    },
    /// A chunk of model output arrived.
    Chunk {
        label: String,
        chunk: String,
    },
    /// A transport-level retry after a transient failure.
    TransportRetry {
        label: String,
        /// The attempt that failed (1-indexed).
        attempt: u32,
        /// Delay before the next attempt in milliseconds.
        delay_ms: u64,
        /// Error description.
        reason: String,
    },
    /// A generation request has finished.
    GenerationEnd {
        label: String,
        /// Whether a document was produced.
        ok: bool,
    },
    /// A series episode is about to be generated.
    EpisodeStart {
        series_id: Uuid,
        index: usize,
        title: String,
    },
    /// A series episode finished, successfully or not.
    EpisodeEnd {
        series_id: Uuid,
        index: usize,
        ok: bool,
    },
    /// Every episode of a series has been attempted.
    SeriesEnd {
        series_id: Uuid,
        success_count: usize,
        failure_count: usize,
    },
}

/// Handler for generation lifecycle events.
///
/// This is entirely optional; generation works without an event handler.
///
/// # Example
///
/// ```
/// use script_pipeline::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::Chunk { chunk, .. } => print!("{}", chunk),
///             Event::EpisodeEnd { index, ok, .. } => println!("[episode {}] ok={}", index, ok),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use script_pipeline::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::Chunk { chunk, .. } = event {
///         print!("{}", chunk);
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
    use std::sync::Mutex;

    #[test]
    fn test_emit_without_handler_is_noop() {
        emit(
            &None,
            Event::GenerationEnd {
                label: "x".into(),
                ok: true,
            },
        );
    }

    #[test]
    fn test_fn_handler_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler(move |event: Event| {
            if let Event::Chunk { chunk, .. } = event {
                sink.lock().unwrap().push(chunk);
            }
        }));
        let handler = Some(handler);
        emit(&handler, Event::Chunk { label: "a".into(), chunk: "one".into() });
        emit(&handler, Event::Chunk { label: "a".into(), chunk: "two".into() });
        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
    }
}
