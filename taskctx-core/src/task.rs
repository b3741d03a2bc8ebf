//! Utilities for creating and inspecting tasks.
//!
//! A [`Task`] is one unit of work: a type string used for routing, an opaque
//! payload and the [`Context`] it executes with. The server builds the context
//! when the task is dequeued; middleware and handlers then read or replace it
//! as the task travels down and back up the chain.
//!
//! There are two ways to attach a new context:
//!
//! - [`Task::with_context`] returns a *new* task and leaves the original alone.
//!   Use it when passing values down to an inner handler.
//! - [`Task::set_context`] replaces the context of the task in place. Use it
//!   from an inner handler when an outer middleware must see the value after
//!   the call returns.
use std::{
    fmt::{self, Display},
    str::FromStr,
    sync::Arc,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use ulid::Ulid;

use crate::context::{Context, Key};

/// A wrapper type that defines a task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Ulid);

impl TaskId {
    /// Generate a new [`TaskId`]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get the inner [`Ulid`]
    pub fn inner(&self) -> Ulid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for TaskId {
    type Err = ulid::DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TaskId(Ulid::from_str(s)?))
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Information the server attaches to every task it dispatches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMetadata {
    /// The id assigned when the task was enqueued
    pub id: TaskId,
    /// The queue the task was dequeued from
    pub queue: String,
}

/// Context key holding the [`TaskMetadata`] of the task being processed
pub static TASK_METADATA: Key<TaskMetadata> = Key::new("task_metadata");

/// Represents a task which will be executed
#[derive(Clone)]
pub struct Task {
    type_name: Arc<str>,
    payload: Arc<[u8]>,
    ctx: Context,
}

impl Task {
    /// Create a task with an empty context
    pub fn new(type_name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            type_name: Arc::from(type_name.into()),
            payload: Arc::from(payload.into()),
            ctx: Context::background(),
        }
    }

    /// Create a task whose payload is `value` encoded as JSON
    pub fn json<T: Serialize>(
        type_name: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(type_name, serde_json::to_vec(value)?))
    }

    /// The type used to route the task to a handler
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The raw payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode the payload as JSON
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// The context the task is executing with
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Returns a copy of the task carrying `ctx`.
    ///
    /// Type and payload are shared with `self`, which keeps its own context.
    pub fn with_context(&self, ctx: Context) -> Self {
        Self {
            type_name: self.type_name.clone(),
            payload: self.payload.clone(),
            ctx,
        }
    }

    /// Replace the context of this task in place
    pub fn set_context(&mut self, ctx: Context) {
        self.ctx = ctx;
    }

    /// The id of the task, available while a server is processing it
    pub fn id(&self) -> Option<TaskId> {
        self.metadata().map(|meta| meta.id)
    }

    /// The queue the task was dequeued from, available while a server is processing it
    pub fn queue(&self) -> Option<&str> {
        self.metadata().map(|meta| meta.queue.as_str())
    }

    /// The [`TaskMetadata`] attached by the server
    pub fn metadata(&self) -> Option<&TaskMetadata> {
        self.ctx.value(&TASK_METADATA)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("type_name", &self.type_name)
            .field("payload", &format_args!("<{} bytes>", self.payload.len()))
            .field("ctx", &self.ctx)
            .finish()
    }
}
