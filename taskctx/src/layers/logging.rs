//! Attaching a logger to the task context.
//!
//! [`LoggerLayer`] builds a [`Logger`] for each task and stores it under
//! [`TASK_LOGGER`]. Handlers fetch it with [`Logger::from_context`] so every
//! record they emit carries the task's fields.
use futures::future::BoxFuture;
use taskctx_core::{
    context::{Context, Key},
    error::BoxDynError,
    handler::Handler,
    task::Task,
};
use tower_layer::Layer;
use tracing::Span;

/// Context key holding the task's [`Logger`]
pub static TASK_LOGGER: Key<Logger> = Key::new("task_logger");

/// A logger bound to a single task
#[derive(Debug, Clone)]
pub struct Logger {
    span: Span,
}

impl Logger {
    /// A logger whose records are attributed to `span`
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// A logger that adds nothing to the records it emits
    pub fn disabled() -> Self {
        Self { span: Span::none() }
    }

    /// The logger stored in `ctx`, or a disabled one when none was attached
    pub fn from_context(ctx: &Context) -> Self {
        ctx.value(&TASK_LOGGER)
            .cloned()
            .unwrap_or_else(Self::disabled)
    }

    /// Run `f` with this logger's span entered
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }

    /// The underlying span
    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Attaches a [`Logger`] to every task before calling the inner handler
#[derive(Debug, Clone, Default)]
pub struct LoggerLayer;

impl LoggerLayer {
    /// Create a new [`LoggerLayer`]
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for LoggerLayer {
    type Service = WithLogger<S>;

    fn layer(&self, inner: S) -> Self::Service {
        WithLogger { inner }
    }
}

/// Service produced by [`LoggerLayer`]
#[derive(Debug, Clone)]
pub struct WithLogger<S> {
    inner: S,
}

impl<S: Handler> Handler for WithLogger<S> {
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        let span = tracing::info_span!("task_logger", task_type = %task.type_name());
        let ctx = task.context().with(&TASK_LOGGER, Logger::new(span));
        let mut scoped = task.with_context(ctx);
        Box::pin(async move { self.inner.process_task(&mut scoped).await })
    }
}

/// Logs `running task` through the task's [`Logger`]
pub fn handle_task_with_logging(task: &mut Task) -> BoxFuture<'_, Result<(), BoxDynError>> {
    Box::pin(async move {
        let logger = Logger::from_context(task.context());
        let task_id = task.id().map(|id| id.to_string()).unwrap_or_default();
        logger.in_scope(|| {
            tracing::info!(task_type = task.type_name(), task_id = %task_id, "running task");
        });
        Ok(())
    })
}
