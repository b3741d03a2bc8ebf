#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub
)]
//! # taskctx-core
//!
//! The pieces a task worker is made of: the [`Task`](task::Task) and its
//! immutable execution [`Context`](context::Context), the
//! [`Handler`](handler::Handler) trait, the [`ServeMux`](mux::ServeMux) that
//! routes tasks through an ordered middleware chain, and a small runtime
//! ([`Client`](client::Client), [`MemoryBroker`](broker::MemoryBroker),
//! [`Server`](server::Server)) to enqueue and process tasks.
//!
//! Middleware are [`tower_layer::Layer`]s whose service implements
//! [`Handler`](handler::Handler). Values travel *down* the chain by handing a
//! task carrying a derived context to the inner handler, and *up* the chain by
//! replacing the context of the shared `&mut Task` in place.

pub mod broker;
/// Enqueueing tasks
pub mod client;
/// Server configuration
pub mod config;
pub mod context;
/// Errors raised by the runtime
pub mod error;
pub mod handler;
pub mod mux;
/// Queue polling order
pub mod queue;
pub mod server;
pub mod task;

/// Common imports
pub mod prelude {
    pub use crate::{
        broker::{Broker, MemoryBroker, TaskMessage},
        client::{Client, EnqueueOptions, TaskInfo},
        config::Config,
        context::{Context, Key},
        error::{BoxDynError, HandlerNotFound},
        handler::{handler_fn, BoxHandler, Handler},
        mux::ServeMux,
        server::Server,
        task::{Task, TaskId, TaskMetadata},
    };
}
