//! Getting a value *back* from the handler.
//!
//! The handler stores [`TASK_RESULT`] with [`Task::set_context`], replacing the
//! context of the very task the middleware holds. [`ReturnValueLayer`] reads
//! the key once the inner call has returned, whether it succeeded or not.
//!
//! This only works while nothing between the two hands the handler a copy of
//! the task: a middleware that delegates with [`Task::with_context`] hides
//! whatever the handler writes from everything above it.
use std::{fmt, sync::Arc};

use futures::future::BoxFuture;
use taskctx_core::{context::Key, error::BoxDynError, handler::Handler, task::Task};
use tower_layer::Layer;

/// Context key the handler writes its result under
pub static TASK_RESULT: Key<String> = Key::new("task_result");

type OnValue = Arc<dyn Fn(&Task, Option<&String>) + Send + Sync>;

/// Reads [`TASK_RESULT`] after the inner handler returns
#[derive(Clone)]
pub struct ReturnValueLayer {
    on_value: OnValue,
}

impl ReturnValueLayer {
    /// Log the returned value
    pub fn new() -> Self {
        Self::on_value(|task, value| {
            tracing::info!(task_type = task.type_name(), value = ?value, "task returned");
        })
    }

    /// Hand the returned value to `f` instead of logging it
    pub fn on_value<F>(f: F) -> Self
    where
        F: Fn(&Task, Option<&String>) + Send + Sync + 'static,
    {
        Self {
            on_value: Arc::new(f),
        }
    }
}

impl Default for ReturnValueLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReturnValueLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnValueLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for ReturnValueLayer {
    type Service = ReturnValue<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ReturnValue {
            inner,
            on_value: self.on_value.clone(),
        }
    }
}

/// Service produced by [`ReturnValueLayer`]
#[derive(Clone)]
pub struct ReturnValue<S> {
    inner: S,
    on_value: OnValue,
}

impl<S: fmt::Debug> fmt::Debug for ReturnValue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnValue")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S: Handler> Handler for ReturnValue<S> {
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        Box::pin(async move {
            let res = self.inner.process_task(task).await;
            (self.on_value)(task, task.context().value(&TASK_RESULT));
            res
        })
    }
}

/// Stores `"value from task"` under [`TASK_RESULT`] in the caller's task
pub fn handle_return_value(task: &mut Task) -> BoxFuture<'_, Result<(), BoxDynError>> {
    Box::pin(async move {
        let ctx = task
            .context()
            .with(&TASK_RESULT, "value from task".to_owned());
        task.set_context(ctx);
        Ok(())
    })
}
