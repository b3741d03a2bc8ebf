//! Passing a value *down* to the handler.
//!
//! [`PassValueLayer`] derives a new context carrying [`MIDDLEWARE_VALUE`] and
//! hands the inner handler a task holding that context. The caller's task is
//! not modified.
use futures::future::BoxFuture;
use taskctx_core::{context::Key, error::BoxDynError, handler::Handler, task::Task};
use tower_layer::Layer;

/// Context key the middleware writes before delegating
pub static MIDDLEWARE_VALUE: Key<String> = Key::new("myKey");

/// Writes a value into the context before calling the inner handler
#[derive(Debug, Clone)]
pub struct PassValueLayer {
    value: String,
}

impl PassValueLayer {
    /// Pass the default `"value from middleware"`
    pub fn new() -> Self {
        Self::with_value("value from middleware")
    }

    /// Pass a custom value
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Default for PassValueLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for PassValueLayer {
    type Service = PassValue<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PassValue {
            inner,
            value: self.value.clone(),
        }
    }
}

/// Service produced by [`PassValueLayer`]
#[derive(Debug, Clone)]
pub struct PassValue<S> {
    inner: S,
    value: String,
}

impl<S: Handler> Handler for PassValue<S> {
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        let ctx = task.context().with(&MIDDLEWARE_VALUE, self.value.clone());
        let mut scoped = task.with_context(ctx);
        Box::pin(async move { self.inner.process_task(&mut scoped).await })
    }
}

/// Reads and logs the value [`PassValueLayer`] put into the context
pub fn handle_pass_value(task: &mut Task) -> BoxFuture<'_, Result<(), BoxDynError>> {
    Box::pin(async move {
        let value = task.context().value(&MIDDLEWARE_VALUE);
        tracing::info!(value = ?value, "middleware value");
        Ok(())
    })
}
