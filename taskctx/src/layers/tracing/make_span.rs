use taskctx_core::task::Task;
use tracing::{Level, Span};

use super::DEFAULT_MESSAGE_LEVEL;

/// Trait used to generate [`Span`]s from tasks. [`Trace`] wraps all task handling in this
/// span.
///
/// [`Span`]: tracing::Span
/// [`Trace`]: super::Trace
pub trait MakeSpan {
    /// Make a span from a task.
    fn make_span(&self, task: &Task) -> Span;
}

impl MakeSpan for Span {
    fn make_span(&self, _task: &Task) -> Span {
        self.clone()
    }
}

impl<F> MakeSpan for F
where
    F: Fn(&Task) -> Span,
{
    fn make_span(&self, task: &Task) -> Span {
        self(task)
    }
}

/// The default way [`Span`]s will be created for [`Trace`].
///
/// [`Span`]: tracing::Span
/// [`Trace`]: super::Trace
#[derive(Debug, Clone)]
pub struct DefaultMakeSpan {
    level: Level,
}

impl DefaultMakeSpan {
    /// Create a new `DefaultMakeSpan`.
    pub fn new() -> Self {
        Self {
            level: DEFAULT_MESSAGE_LEVEL,
        }
    }

    /// Set the [`Level`] used for the [tracing span].
    ///
    /// Defaults to [`Level::INFO`].
    ///
    /// [tracing span]: https://docs.rs/tracing/latest/tracing/#spans
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Default for DefaultMakeSpan {
    fn default() -> Self {
        Self::new()
    }
}

impl MakeSpan for DefaultMakeSpan {
    fn make_span(&self, task: &Task) -> Span {
        // The level is part of the callsite's static metadata, hence one arm per level.
        let task_type = task.type_name();
        let task_id = task.id().map(|id| id.to_string()).unwrap_or_default();
        macro_rules! make_span {
            ($level:expr) => {
                tracing::span!(
                    $level,
                    "middleware_task",
                    task_type = %task_type,
                    task_id = %task_id
                )
            };
        }

        match self.level {
            Level::ERROR => make_span!(Level::ERROR),
            Level::WARN => make_span!(Level::WARN),
            Level::INFO => make_span!(Level::INFO),
            Level::DEBUG => make_span!(Level::DEBUG),
            Level::TRACE => make_span!(Level::TRACE),
        }
    }
}
