use std::time::Duration;

use crate::{
    broker::{Broker, TaskMessage},
    config::DEFAULT_QUEUE,
    error::EnqueueError,
    task::{Task, TaskId},
};

/// Options applied when enqueueing a task
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    queue: String,
    timeout: Option<Duration>,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_owned(),
            timeout: None,
        }
    }
}

impl EnqueueOptions {
    /// Put the task on `queue` instead of the default queue
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Give the task its own time budget
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What the broker accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    /// The id assigned to the task
    pub id: TaskId,
    /// The queue the task was put on
    pub queue: String,
    /// The task type
    pub task_type: String,
}

/// Puts tasks onto a [`Broker`]
#[derive(Debug, Clone)]
pub struct Client<B> {
    broker: B,
}

impl<B: Broker> Client<B> {
    /// Create a client for `broker`
    pub fn new(broker: B) -> Self {
        Self { broker }
    }

    /// Enqueue `task` on the default queue
    pub async fn enqueue(&self, task: &Task) -> Result<TaskInfo, EnqueueError> {
        self.enqueue_with(task, EnqueueOptions::default()).await
    }

    /// Enqueue `task` with explicit options
    pub async fn enqueue_with(
        &self,
        task: &Task,
        options: EnqueueOptions,
    ) -> Result<TaskInfo, EnqueueError> {
        if task.type_name().trim().is_empty() {
            return Err(EnqueueError::EmptyTaskType);
        }
        let queue = options.queue.trim().to_owned();
        if queue.is_empty() {
            return Err(EnqueueError::EmptyQueueName);
        }
        let msg = TaskMessage {
            id: TaskId::new(),
            task_type: task.type_name().to_owned(),
            payload: task.payload().to_vec(),
            queue,
            timeout: options.timeout,
        };
        let info = TaskInfo {
            id: msg.id,
            queue: msg.queue.clone(),
            task_type: msg.task_type.clone(),
        };
        self.broker.enqueue(msg).await?;
        tracing::debug!(task_id = %info.id, queue = %info.queue, task_type = %info.task_type, "task enqueued");
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;

    #[tokio::test]
    async fn enqueue_defaults_to_the_default_queue() {
        let broker = MemoryBroker::new();
        let client = Client::new(broker.clone());

        let info = client.enqueue(&Task::new("email:deliver", "{}")).await.unwrap();

        assert_eq!(info.queue, "default");
        assert_eq!(info.task_type, "email:deliver");
        assert_eq!(broker.len("default"), 1);
    }

    #[tokio::test]
    async fn enqueue_with_options() {
        let broker = MemoryBroker::new();
        let client = Client::new(broker.clone());

        let info = client
            .enqueue_with(
                &Task::new("email:deliver", "{}"),
                EnqueueOptions::default()
                    .queue("critical")
                    .timeout(Duration::from_secs(5)),
            )
            .await
            .unwrap();

        let msg = broker
            .dequeue(&["critical".to_owned()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.id, info.id);
        assert_eq!(msg.timeout, Some(Duration::from_secs(5)));
        assert_eq!(msg.payload, b"{}");
    }

    #[tokio::test]
    async fn rejects_blank_types_and_queues() {
        let client = Client::new(MemoryBroker::new());

        assert!(matches!(
            client.enqueue(&Task::new(" ", Vec::new())).await,
            Err(EnqueueError::EmptyTaskType)
        ));
        assert!(matches!(
            client
                .enqueue_with(&Task::new("t", Vec::new()), EnqueueOptions::default().queue(""))
                .await,
            Err(EnqueueError::EmptyQueueName)
        ));
    }
}
