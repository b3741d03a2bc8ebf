//! Tracing a task's execution.
//!
//! [`TraceLayer`] opens a span around everything below it, stores that span
//! in the task context under [`TASK_SPAN`] and records how the task ended.
//! [`handle_task_with_tracing`] picks the span up from the context and opens
//! its own child span for the actual work.
//!
//! ```rust
//! # use taskctx::layers::tracing::{handle_task_with_tracing, TraceLayer};
//! # use taskctx_core::mux::ServeMux;
//! let mut mux = ServeMux::new();
//! mux.use_layer(TraceLayer::new())
//!     .handle_func("email:deliver", handle_task_with_tracing);
//! ```
mod make_span;

use std::time::Instant;

use futures::future::BoxFuture;
use taskctx_core::{context::Key, error::BoxDynError, handler::Handler, task::Task};
use tower_layer::Layer;
use tracing::{Instrument, Level, Span};

pub use self::make_span::{DefaultMakeSpan, MakeSpan};

const DEFAULT_MESSAGE_LEVEL: Level = Level::INFO;

/// Context key holding the span opened by [`Trace`]
pub static TASK_SPAN: Key<Span> = Key::new("task_span");

/// [`Layer`] that adds high level [tracing] to a [`Handler`].
///
/// [tracing]: https://crates.io/crates/tracing
#[derive(Debug, Clone)]
pub struct TraceLayer<M = DefaultMakeSpan> {
    make_span: M,
}

impl TraceLayer {
    /// Create a new [`TraceLayer`].
    pub fn new() -> Self {
        Self {
            make_span: DefaultMakeSpan::new(),
        }
    }
}

impl Default for TraceLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> TraceLayer<M> {
    /// Customize how to make [`Span`]s that all task handling will be wrapped in.
    ///
    /// `NewMakeSpan` is expected to implement [`MakeSpan`].
    pub fn make_span_with<NewMakeSpan>(self, make_span: NewMakeSpan) -> TraceLayer<NewMakeSpan> {
        TraceLayer { make_span }
    }
}

impl<S, M: Clone> Layer<S> for TraceLayer<M> {
    type Service = Trace<S, M>;

    fn layer(&self, inner: S) -> Self::Service {
        Trace {
            inner,
            make_span: self.make_span.clone(),
        }
    }
}

/// Middleware that adds high level [`tracing`](https://crates.io/crates/tracing) to a task handler.
#[derive(Debug, Clone)]
pub struct Trace<S, M = DefaultMakeSpan> {
    inner: S,
    make_span: M,
}

impl<S, M> Handler for Trace<S, M>
where
    S: Handler,
    M: MakeSpan + Send + Sync + 'static,
{
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        let span = self.make_span.make_span(task);
        let ctx = task.context().with(&TASK_SPAN, span.clone());
        let mut scoped = task.with_context(ctx);
        let start = Instant::now();
        let record = span.clone();
        Box::pin(
            async move {
                let res = self.inner.process_task(&mut scoped).await;
                let done_in = start.elapsed();
                match &res {
                    Ok(()) => tracing::debug!(parent: &record, ?done_in, "task finished"),
                    Err(e) => tracing::error!(parent: &record, ?done_in, error = %e, "task failed"),
                }
                res
            }
            .instrument(span),
        )
    }
}

/// Does its work inside a `handling_task` span nested in the middleware span
pub fn handle_task_with_tracing(task: &mut Task) -> BoxFuture<'_, Result<(), BoxDynError>> {
    let parent = task
        .context()
        .value(&TASK_SPAN)
        .cloned()
        .unwrap_or_else(Span::current);
    let task_id = task.id().map(|id| id.to_string()).unwrap_or_default();
    let span = tracing::info_span!(
        parent: &parent,
        "handling_task",
        task_type = %task.type_name(),
        task_id = %task_id,
    );
    Box::pin(
        async move {
            tracing::info!("started process");
            // do some work
            tracing::info!("done process");
            Ok(())
        }
        .instrument(span),
    )
}
