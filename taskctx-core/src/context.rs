//! The per-task execution context.
//!
//! A [`Context`] is an immutable, layered key-value association plus an
//! optional deadline. Writing never mutates a context in place:
//! [`Context::with`] returns a new context that shares every existing layer
//! with its parent and adds one more on top. Cloning is cheap.
//!
//! Keys are [`Key`] tokens declared as `static`s. Lookup is by the token's
//! identity, so two keys that happen to share a name never collide, and the
//! value type is fixed by the key.
//!
//! ```rust
//! # use taskctx_core::context::{Context, Key};
//! static GREETING: Key<String> = Key::new("greeting");
//!
//! let root = Context::background();
//! let ctx = root.with(&GREETING, "hello".to_owned());
//!
//! assert_eq!(ctx.value(&GREETING).map(String::as_str), Some("hello"));
//! assert!(root.value(&GREETING).is_none());
//! ```
use std::{
    any::Any,
    fmt,
    marker::PhantomData,
    sync::Arc,
    time::{Duration, Instant},
};

/// A typed, identity-based context key.
///
/// Declare keys as `static` items; the address of the static is what the
/// context compares, the name is only used for debugging.
pub struct Key<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Create a new key with a debug name
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The debug name of the key
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn id(&'static self) -> usize {
        self as *const Self as *const () as usize
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

struct Entry {
    key: usize,
    name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Entry>>,
}

/// Per-task carrier of key-value associations and deadline state.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Entry>>,
    deadline: Option<Instant>,
}

impl Context {
    /// An empty context with no values and no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a new context carrying `value` under `key`.
    ///
    /// `self` is left untouched. A value already stored under the same key is
    /// shadowed in the returned context.
    pub fn with<T>(&self, key: &'static Key<T>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            head: Some(Arc::new(Entry {
                key: key.id(),
                name: key.name,
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
            deadline: self.deadline,
        }
    }

    /// Look up the most recent value stored under `key`
    pub fn value<T: 'static>(&self, key: &'static Key<T>) -> Option<&T> {
        let id = key.id();
        self.entries()
            .find(|entry| entry.key == id)
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    /// Whether a value is stored under `key`
    pub fn contains<T: 'static>(&self, key: &'static Key<T>) -> bool {
        self.value(key).is_some()
    }

    /// Returns a new context whose deadline is the earlier of the current one and `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            head: self.head.clone(),
            deadline: Some(deadline),
        }
    }

    /// Shorthand for [`Context::with_deadline`] relative to now.
    ///
    /// A timeout too large to be represented as an [`Instant`] adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// The instant by which work on this context should be done
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        std::iter::successors(self.head.as_deref(), |entry| entry.parent.as_deref())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.entries().map(|entry| entry.name).collect();
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("deadline", &self.deadline)
            .finish()
    }
}
