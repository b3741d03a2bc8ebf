//! Polls a [`Broker`] and dispatches tasks to a [`Handler`].
//!
//! ```rust,no_run
//! # use taskctx_core::{broker::MemoryBroker, config::Config, mux::ServeMux, server::Server};
//! # async fn run(mux: ServeMux) -> Result<(), taskctx_core::error::ServerError> {
//! let config = Config::default()
//!     .concurrency(10)
//!     .queues([("critical", 6), ("default", 3), ("low", 1)]);
//!
//! Server::new(MemoryBroker::new(), config).run(mux).await
//! # }
//! ```
//!
//! For every dequeued message the server builds a fresh [`Context`] carrying
//! [`TaskMetadata`] and a deadline, runs the handler under that deadline and
//! reports failures. Retrying failed tasks is not supported; a failed task is
//! reported to the error handler and dropped.
use std::{
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::FutureExt;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    broker::{Broker, TaskMessage},
    config::Config,
    context::Context,
    error::{BoxDynError, DeadlineExceeded, PanicError, ServerError},
    handler::{BoxHandler, Handler},
    queue::QueueSelector,
    task::{Task, TaskMetadata, TASK_METADATA},
};

type ErrorHandler = Arc<dyn Fn(&Task, &BoxDynError) + Send + Sync>;

/// Runs tasks from a broker with bounded concurrency
pub struct Server<B> {
    broker: Arc<B>,
    config: Config,
    on_error: Option<ErrorHandler>,
}

impl<B> fmt::Debug for Server<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("broker", &std::any::type_name::<B>())
            .field("config", &self.config)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl<B: Broker> Server<B> {
    /// Create a server. The config is normalized first.
    pub fn new(broker: B, config: Config) -> Self {
        Self {
            broker: Arc::new(broker),
            config: config.normalized(),
            on_error: None,
        }
    }

    /// The effective configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Called with the task and the error whenever processing fails
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Task, &BoxDynError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Run until the process receives ctrl-c
    pub async fn run<H: Handler>(self, handler: H) -> Result<(), ServerError> {
        let (tx, rx) = tokio::sync::oneshot::channel::<std::io::Error>();
        let signal = async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                let _ = tx.send(e);
            }
        };
        self.run_until(handler, signal).await?;
        match rx.await {
            Ok(e) => Err(ServerError::Signal(e)),
            Err(_) => Ok(()),
        }
    }

    /// Run until `shutdown` resolves, then drain in-flight tasks
    pub async fn run_until<H, F>(self, handler: H, shutdown: F) -> Result<(), ServerError>
    where
        H: Handler,
        F: Future<Output = ()>,
    {
        let handler: BoxHandler = Arc::new(handler);
        let limiter = Arc::new(Semaphore::new(self.config.concurrency));
        let mut selector = QueueSelector::new(&self.config.queues, self.config.strict_priority);
        let mut in_flight = JoinSet::new();
        tokio::pin!(shutdown);

        tracing::info!(
            concurrency = self.config.concurrency,
            queues = ?self.config.queues,
            strict = self.config.strict_priority,
            "server started"
        );

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = limiter.clone().acquire_owned() => {
                    permit.map_err(|_| ServerError::LimiterClosed)?
                }
            };
            while in_flight.try_join_next().is_some() {}

            let order = selector.next_order();
            match self.broker.dequeue(&order).await {
                Ok(Some(msg)) => {
                    let job = Job {
                        handler: handler.clone(),
                        on_error: self.on_error.clone(),
                        default_timeout: self.config.task_timeout,
                    };
                    in_flight.spawn(async move {
                        job.process(msg).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(error = %e, "failed to dequeue task");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!(in_flight = in_flight.len(), "server shutting down");
        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                aborted = in_flight.len(),
                "shutdown timeout elapsed, aborting in-flight tasks"
            );
            in_flight.shutdown().await;
        }
        tracing::info!("server stopped");
        Ok(())
    }
}

struct Job {
    handler: BoxHandler,
    on_error: Option<ErrorHandler>,
    default_timeout: Duration,
}

impl Job {
    async fn process(self, msg: TaskMessage) {
        let timeout = msg.timeout.unwrap_or(self.default_timeout);
        let ctx = Context::background()
            .with(
                &TASK_METADATA,
                TaskMetadata {
                    id: msg.id,
                    queue: msg.queue,
                },
            )
            .with_timeout(timeout);
        let deadline = ctx.deadline();
        let mut task = Task::new(msg.task_type, msg.payload);
        task.set_context(ctx);

        let started = Instant::now();
        let res = {
            let running = AssertUnwindSafe(self.handler.process_task(&mut task)).catch_unwind();
            let outcome = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline.into(), running).await,
                None => Ok(running.await),
            };
            match outcome {
                Ok(Ok(res)) => res,
                Ok(Err(panic)) => Err(PanicError(panic_message(panic)).into()),
                Err(_) => Err(DeadlineExceeded { timeout }.into()),
            }
        };

        match res {
            Ok(()) => tracing::debug!(
                task_id = %msg.id,
                task_type = task.type_name(),
                done_in = ?started.elapsed(),
                "task processed"
            ),
            Err(err) => {
                tracing::warn!(
                    task_id = %msg.id,
                    task_type = task.type_name(),
                    error = %err,
                    "task failed"
                );
                if let Some(on_error) = &self.on_error {
                    on_error(&task, &err);
                }
            }
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
