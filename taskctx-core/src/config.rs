use std::{collections::BTreeMap, num::NonZeroUsize, time::Duration};

use serde::{Deserialize, Serialize};

/// The queue used when none is configured or requested
pub const DEFAULT_QUEUE: &str = "default";

/// Server configuration.
///
/// Every field has a default, so partial configuration files deserialize
/// cleanly. Call [`Config::normalized`] (the server does) to drop invalid
/// entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of tasks processed at the same time
    pub concurrency: usize,
    /// Queue names mapped to their relative weight
    pub queues: BTreeMap<String, u32>,
    /// Always drain higher weighted queues before lower ones
    pub strict_priority: bool,
    /// How long to wait before polling again once every queue is empty
    pub poll_interval: Duration,
    /// Time budget of a task that was enqueued without its own timeout
    pub task_timeout: Duration,
    /// How long in-flight tasks may keep running after shutdown was requested
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            queues: default_queues(),
            strict_priority: false,
            poll_interval: Duration::from_secs(1),
            task_timeout: Duration::from_secs(30 * 60),
            shutdown_timeout: Duration::from_secs(8),
        }
    }
}

impl Config {
    /// Set the concurrency
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Replace the queue map
    pub fn queues<I, K>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = (K, u32)>,
        K: Into<String>,
    {
        self.queues = queues.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }

    /// Enable or disable strict priority
    pub fn strict_priority(mut self, strict: bool) -> Self {
        self.strict_priority = strict;
        self
    }

    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the default task timeout
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Set the shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Drop queues with blank names or a zero weight and repair the concurrency.
    ///
    /// Falls back to `{"default": 1}` when no valid queue remains.
    pub fn normalized(mut self) -> Self {
        if self.concurrency == 0 {
            self.concurrency = default_concurrency();
        }
        self.queues = self
            .queues
            .into_iter()
            .map(|(name, weight)| (name.trim().to_owned(), weight))
            .filter(|(name, weight)| !name.is_empty() && *weight > 0)
            .collect();
        if self.queues.is_empty() {
            self.queues = default_queues();
        }
        self
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn default_queues() -> BTreeMap<String, u32> {
    BTreeMap::from([(DEFAULT_QUEUE.to_owned(), 1)])
}
