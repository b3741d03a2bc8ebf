//! Recording task metrics.
//!
//! [`TaskMetrics`] owns its own Prometheus recorder instead of installing a
//! global one, so it is created once at start up and handed to every
//! [`PrometheusLayer`] that should report into it.
use std::{fmt, sync::Arc, time::Instant};

use futures::future::BoxFuture;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use taskctx_core::{error::BoxDynError, handler::Handler, task::Task};
use tower_layer::Layer;

/// Counter incremented once per processed task
pub const PROCESSED_TASKS: &str = "processed_tasks_total";
/// Histogram of task handling time in seconds
pub const TASK_DURATION: &str = "task_duration_seconds";

/// A Prometheus recorder and the handle used to render it
#[derive(Clone)]
pub struct TaskMetrics {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl TaskMetrics {
    /// Create an empty registry
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        Self {
            recorder: Arc::new(recorder),
            handle,
        }
    }

    /// Record one processed task
    pub fn record(&self, task_type: &str, status: &'static str, seconds: f64) {
        let task_type = task_type.to_owned();
        metrics::with_local_recorder(&*self.recorder, || {
            metrics::counter!(PROCESSED_TASKS, "task_type" => task_type.clone()).increment(1);
            metrics::histogram!(TASK_DURATION, "task_type" => task_type, "status" => status)
                .record(seconds);
        });
    }

    /// Render everything recorded so far in the Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for TaskMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskMetrics").finish_non_exhaustive()
    }
}

/// A layer to support prometheus metrics
#[derive(Debug, Clone)]
pub struct PrometheusLayer {
    metrics: TaskMetrics,
}

impl PrometheusLayer {
    /// Report into `metrics`
    pub fn new(metrics: TaskMetrics) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for PrometheusLayer {
    type Service = PrometheusService<S>;

    fn layer(&self, service: S) -> Self::Service {
        PrometheusService {
            service,
            metrics: self.metrics.clone(),
        }
    }
}

/// This service implements the metric collection behavior
#[derive(Debug, Clone)]
pub struct PrometheusService<S> {
    service: S,
    metrics: TaskMetrics,
}

impl<S: Handler> Handler for PrometheusService<S> {
    fn process_task<'a>(&'a self, task: &'a mut Task) -> BoxFuture<'a, Result<(), BoxDynError>> {
        Box::pin(async move {
            let start = Instant::now();
            let res = self.service.process_task(task).await;
            let status = if res.is_ok() { "Ok" } else { "Err" };
            self.metrics
                .record(task.type_name(), status, start.elapsed().as_secs_f64());
            res
        })
    }
}
