use std::{error::Error as StdError, time::Duration};
use thiserror::Error;

/// Convenience type alias
pub type BoxDynError = Box<dyn StdError + 'static + Send + Sync>;

/// Returned when no registered pattern matches a task's type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("handler not found for task `{task_type}`")]
pub struct HandlerNotFound {
    /// The type of the task that could not be routed
    pub task_type: String,
}

/// The task ran past its deadline and was cancelled
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("DeadlineExceeded: task did not complete within {timeout:?}")]
pub struct DeadlineExceeded {
    /// The time budget the task had when it started
    pub timeout: Duration,
}

/// A handler panicked while processing a task
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("PanicError: {0}")]
pub struct PanicError(pub String);

/// Possible errors raised by a [`Broker`](crate::broker::Broker)
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The broker has been closed and accepts no more work
    #[error("broker is closed")]
    Closed,
    /// The underlying store failed
    #[error("broker failure: {0}")]
    Other(BoxDynError),
}

/// Possible errors when enqueueing a task through a [`Client`](crate::client::Client)
#[derive(Error, Debug)]
pub enum EnqueueError {
    /// Tasks must carry a non empty type
    #[error("task type cannot be empty")]
    EmptyTaskType,
    /// Queue names must not be empty
    #[error("queue name cannot be empty")]
    EmptyQueueName,
    /// The broker rejected the task
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Possible errors that can occur when running a server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The concurrency limiter was closed while the server was running
    #[error("concurrency limiter closed unexpectedly")]
    LimiterClosed,
    /// Listening for the shutdown signal failed
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}
