/// Logging through a per task logger
pub mod logging;
/// Passing values down to the handler
pub mod pass_value;
/// Prometheus metrics
pub mod prometheus;
/// Getting values back from the handler
pub mod return_value;
/// Tracing spans around task handling
pub mod tracing;

pub use self::{
    logging::LoggerLayer, pass_value::PassValueLayer, prometheus::PrometheusLayer,
    return_value::ReturnValueLayer, tracing::TraceLayer,
};
