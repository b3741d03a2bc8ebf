//! Where tasks wait between being enqueued and being processed.
//!
//! The [`Broker`] trait is the seam between the [`Client`](crate::client::Client),
//! the [`Server`](crate::server::Server) and whatever stores the tasks. Only an
//! in-memory implementation ships with this crate.
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use futures::future::{self, BoxFuture};

use crate::{error::BrokerError, task::TaskId};

/// A task as stored by a broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMessage {
    /// Unique id
    pub id: TaskId,
    /// Routing type
    pub task_type: String,
    /// Raw payload
    pub payload: Vec<u8>,
    /// The queue holding the message
    pub queue: String,
    /// Per-task time budget, overrides the server default
    pub timeout: Option<Duration>,
}

/// Stores and hands out [`TaskMessage`]s
pub trait Broker: Send + Sync + 'static {
    /// Append a message to the tail of its queue
    fn enqueue(&self, msg: TaskMessage) -> BoxFuture<'_, Result<(), BrokerError>>;

    /// Take the next message from the first non empty queue in `queues`.
    ///
    /// `queues` is ordered by preference. Returns `None` when all of them are empty.
    fn dequeue<'a>(
        &'a self,
        queues: &'a [String],
    ) -> BoxFuture<'a, Result<Option<TaskMessage>, BrokerError>>;
}

impl<B: Broker + ?Sized> Broker for Arc<B> {
    fn enqueue(&self, msg: TaskMessage) -> BoxFuture<'_, Result<(), BrokerError>> {
        (**self).enqueue(msg)
    }

    fn dequeue<'a>(
        &'a self,
        queues: &'a [String],
    ) -> BoxFuture<'a, Result<Option<TaskMessage>, BrokerError>> {
        (**self).dequeue(queues)
    }
}

#[derive(Debug, Default)]
struct Queues {
    pending: HashMap<String, VecDeque<TaskMessage>>,
    closed: bool,
}

/// An in-memory [`Broker`]. Clones share the same queues.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Mutex<Queues>>,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting in `queue`
    pub fn len(&self, queue: &str) -> usize {
        self.lock().pending.get(queue).map_or(0, VecDeque::len)
    }

    /// Whether every queue is empty
    pub fn is_empty(&self) -> bool {
        self.lock().pending.values().all(VecDeque::is_empty)
    }

    /// Refuse further messages. Messages already queued can still be dequeued.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        // A panic while holding the lock cannot leave the queues half updated.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Broker for MemoryBroker {
    fn enqueue(&self, msg: TaskMessage) -> BoxFuture<'_, Result<(), BrokerError>> {
        let mut queues = self.lock();
        let res = if queues.closed {
            Err(BrokerError::Closed)
        } else {
            queues
                .pending
                .entry(msg.queue.clone())
                .or_default()
                .push_back(msg);
            Ok(())
        };
        Box::pin(future::ready(res))
    }

    fn dequeue<'a>(
        &'a self,
        order: &'a [String],
    ) -> BoxFuture<'a, Result<Option<TaskMessage>, BrokerError>> {
        let mut queues = self.lock();
        let next = order
            .iter()
            .find_map(|name| queues.pending.get_mut(name).and_then(VecDeque::pop_front));
        Box::pin(future::ready(Ok(next)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(queue: &str, task_type: &str) -> TaskMessage {
        TaskMessage {
            id: TaskId::new(),
            task_type: task_type.to_owned(),
            payload: Vec::new(),
            queue: queue.to_owned(),
            timeout: None,
        }
    }

    fn order(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn dequeue_follows_the_given_order() {
        let broker = MemoryBroker::new();
        broker.enqueue(message("low", "a")).await.unwrap();
        broker.enqueue(message("critical", "b")).await.unwrap();
        broker.enqueue(message("critical", "c")).await.unwrap();

        let preference = order(&["critical", "default", "low"]);
        let mut seen = Vec::new();
        while let Some(msg) = broker.dequeue(&preference).await.unwrap() {
            seen.push(msg.task_type);
        }

        assert_eq!(seen, ["b", "c", "a"]);
        assert!(broker.is_empty());
    }

    #[tokio::test]
    async fn unlisted_queues_are_not_served() {
        let broker = MemoryBroker::new();
        broker.enqueue(message("hidden", "a")).await.unwrap();

        assert!(broker.dequeue(&order(&["default"])).await.unwrap().is_none());
        assert_eq!(broker.len("hidden"), 1);
    }

    #[tokio::test]
    async fn closed_broker_rejects_new_messages() {
        let broker = MemoryBroker::new();
        broker.enqueue(message("default", "a")).await.unwrap();
        broker.close();

        assert!(matches!(
            broker.enqueue(message("default", "b")).await,
            Err(BrokerError::Closed)
        ));
        assert!(broker.dequeue(&order(&["default"])).await.unwrap().is_some());
    }
}
