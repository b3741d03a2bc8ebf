//! Routing tasks to handlers through an ordered middleware chain.
//!
//! [`ServeMux`] matches the type of each task against the registered
//! patterns and calls the matching handler wrapped in every middleware that
//! was registered with [`ServeMux::use_layer`] or [`ServeMux::use_fn`].
//!
//! # Order
//!
//! Middleware registered first sees the task first and the result last.
//! For middlewares `[m1, m2]` around handler `h`, a call runs `m1` pre-logic,
//! `m2` pre-logic, `h`, `m2` post-logic and finally `m1` post-logic.
//!
//! # Matching
//!
//! A pattern matches every task type it is a prefix of, and the longest
//! matching pattern wins, so `email:` handles `email:welcome` unless a more
//! specific `email:welcome` pattern is registered.
use std::{collections::BTreeMap, fmt, sync::Arc};

use futures::future::BoxFuture;
use tower_layer::Layer;

use crate::{
    error::{BoxDynError, HandlerNotFound},
    handler::{handler_fn, BoxHandler, Handler},
    task::Task,
};

type Middleware = Arc<dyn Fn(BoxHandler) -> BoxHandler + Send + Sync>;

/// A task multiplexer with a middleware chain.
#[derive(Default)]
pub struct ServeMux {
    routes: BTreeMap<String, BoxHandler>,
    middleware: Vec<Middleware>,
}

impl ServeMux {
    /// Create an empty mux
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for task types starting with `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is empty or already registered.
    pub fn handle<H: Handler>(&mut self, pattern: impl Into<String>, handler: H) -> &mut Self {
        let pattern = pattern.into();
        assert!(!pattern.trim().is_empty(), "taskctx: invalid pattern");
        assert!(
            !self.routes.contains_key(&pattern),
            "taskctx: multiple registrations for `{pattern}`"
        );
        self.routes.insert(pattern, Arc::new(handler));
        self
    }

    /// Register a function as the handler for `pattern`. See [`ServeMux::handle`].
    pub fn handle_func<F>(&mut self, pattern: impl Into<String>, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>>
            + Send
            + Sync
            + 'static,
    {
        self.handle(pattern, handler_fn(f))
    }

    /// Append a [`Layer`] to the middleware chain
    pub fn use_layer<L>(&mut self, layer: L) -> &mut Self
    where
        L: Layer<BoxHandler> + Send + Sync + 'static,
        L::Service: Handler,
    {
        self.middleware
            .push(Arc::new(move |inner: BoxHandler| -> BoxHandler {
                Arc::new(layer.layer(inner))
            }));
        self
    }

    /// Append a middleware function to the chain
    pub fn use_fn<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// The pattern and handler a task of type `task_type` is routed to
    pub fn route(&self, task_type: &str) -> Option<(&str, &BoxHandler)> {
        if let Some((pattern, handler)) = self.routes.get_key_value(task_type) {
            return Some((pattern.as_str(), handler));
        }
        self.routes
            .iter()
            .filter(|(pattern, _)| task_type.starts_with(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(pattern, handler)| (pattern.as_str(), handler))
    }

    /// The routed handler for `task_type` wrapped in the whole middleware chain
    pub fn handler(&self, task_type: &str) -> BoxHandler {
        let handler = match self.route(task_type) {
            Some((_, handler)) => handler.clone(),
            None => Arc::new(NotFound),
        };
        self.middleware
            .iter()
            .rev()
            .fold(handler, |inner, middleware| middleware(inner))
    }
}

impl Handler for ServeMux {
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        let handler = self.handler(task.type_name());
        Box::pin(async move { handler.process_task(task).await })
    }
}

impl fmt::Debug for ServeMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeMux")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

struct NotFound;

impl Handler for NotFound {
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        let err = HandlerNotFound {
            task_type: task.type_name().to_owned(),
        };
        Box::pin(async move { Err(err.into()) })
    }
}
