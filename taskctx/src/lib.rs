#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub
)]
//! taskctx collects middleware patterns for background task workers built on
//! [`taskctx_core`].
//!
//! Each pattern pairs a [`Layer`](tower_layer::Layer) with the handler that
//! relies on it:
//!
//! - [`PassValueLayer`](layers::PassValueLayer) passes a value *down* to the handler.
//! - [`ReturnValueLayer`](layers::ReturnValueLayer) reads a value the handler
//!   wrote, once it has returned.
//! - [`TraceLayer`](layers::TraceLayer) wraps task handling in a span.
//! - [`PrometheusLayer`](layers::PrometheusLayer) counts processed tasks.
//! - [`LoggerLayer`](layers::LoggerLayer) attaches a logger to the context.
//!
//! ### Example
//! ```rust
//! use taskctx::{
//!     layers::{return_value::handle_return_value, ReturnValueLayer},
//!     tasks::TYPE_EMAIL_DELIVERY,
//! };
//! use taskctx_core::mux::ServeMux;
//!
//! let mut mux = ServeMux::new();
//! mux.use_layer(ReturnValueLayer::new())
//!     .handle_func(TYPE_EMAIL_DELIVERY, handle_return_value);
//! ```

/// Middleware for task handlers
pub mod layers;
pub mod patterns;
pub mod tasks;
pub mod telemetry;

#[cfg(test)]
mod test_util;

/// Common imports
pub mod prelude {
    pub use crate::{
        layers::{LoggerLayer, PassValueLayer, PrometheusLayer, ReturnValueLayer, TraceLayer},
        patterns::{build_mux, Pattern},
        tasks::{new_email_delivery_task, EmailDeliveryPayload, TYPE_EMAIL_DELIVERY},
        telemetry::{LogFormat, Telemetry, TelemetryConfig},
    };
    pub use taskctx_core::prelude::*;
}
