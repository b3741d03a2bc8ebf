//! The [`Handler`] trait and helpers for building handlers from functions.
//!
//! A handler receives the task as `&mut Task`. The exclusive borrow lasts for
//! the whole call, so a context replaced with [`Task::set_context`] deep in the
//! chain is what every caller sees once the call returns.
//!
//! Middleware are plain [`tower_layer::Layer`]s whose service implements
//! [`Handler`]:
//!
//! ```rust
//! # use futures::future::BoxFuture;
//! # use taskctx_core::{error::BoxDynError, handler::Handler, task::Task};
//! # use tower_layer::Layer;
//! struct Noop<S>(S);
//!
//! impl<S: Handler> Handler for Noop<S> {
//!     fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
//!         self.0.process_task(task)
//!     }
//! }
//!
//! struct NoopLayer;
//!
//! impl<S> Layer<S> for NoopLayer {
//!     type Service = Noop<S>;
//!     fn layer(&self, inner: S) -> Self::Service {
//!         Noop(inner)
//!     }
//! }
//! ```
use std::{fmt, sync::Arc};

use futures::future::BoxFuture;

use crate::{error::BoxDynError, task::Task};

/// Processes a [`Task`].
///
/// Returning an error signals failure; the error is propagated unchanged to
/// every enclosing middleware and finally to the server.
pub trait Handler: Send + Sync + 'static {
    /// Process the task
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>>;
}

/// A type erased [`Handler`]
pub type BoxHandler = Arc<dyn Handler>;

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        (**self).process_task(task)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        (**self).process_task(task)
    }
}

/// A [`Handler`] backed by a function. See [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

/// Build a [`Handler`] from a function taking `&mut Task`.
///
/// ```rust
/// # use futures::future::BoxFuture;
/// # use taskctx_core::{error::BoxDynError, handler::handler_fn, task::Task};
/// fn handle(task: &mut Task) -> BoxFuture<'_, Result<(), BoxDynError>> {
///     Box::pin(async move {
///         println!("processing {}", task.type_name());
///         Ok(())
///     })
/// }
///
/// let handler = handler_fn(handle);
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> + Send + Sync + 'static,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> + Send + Sync + 'static,
{
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        (self.f)(task)
    }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}
