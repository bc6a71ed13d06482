//! # Error Types
//!
//! Every failure the bridge can report is a variant of one of the enums below.
//! Panics inside submitted work never cross a thread boundary as a panic; they
//! are captured into [`TaskError::Panicked`] and handed to whoever awaits the
//! task.
//!
//! ## Usage Example
//!
//! ```rust
//! use tether_api::errors::TaskError;
//!
//! fn describe(error: &TaskError) -> &'static str {
//!     match error {
//!         TaskError::Panicked(_) => "task panicked",
//!         TaskError::Rejected { .. } => "pool saturated",
//!         TaskError::PoolShutdown => "pool closed",
//!         _ => "other",
//!     }
//! }
//!
//! assert_eq!(describe(&TaskError::PoolShutdown), "pool closed");
//! ```

use std::time::Duration;
use thiserror::Error;

/// Failure of a task submitted to a worker pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task panicked; the payload is rendered as text.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The transient-thread ceiling was reached and the pool rejects overflow.
    #[error("Task rejected: {live} transient threads live (limit {limit})")]
    Rejected { live: usize, limit: usize },

    /// The pool no longer accepts work.
    #[error("Worker pool is shut down")]
    PoolShutdown,

    /// The OS refused to create a worker thread.
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),

    /// The worker went away without producing a result.
    #[error("Task was dropped before completing")]
    Dropped,
}

impl TaskError {
    /// Builds a [`TaskError::Panicked`] from a `catch_unwind` payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "<non-string panic payload>".to_string(),
            },
        };
        TaskError::Panicked(message)
    }
}

/// Errors raised while starting or driving a supervised loop thread.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    #[error("Loop thread '{0}' was already started")]
    AlreadyStarted(String),
    #[error("Failed to spawn loop thread: {0}")]
    Spawn(String),
    #[error("Failed to build loop runtime: {0}")]
    Runtime(String),
    /// The owning system is shutting down and starts no new loops.
    #[error("Loop thread '{0}' not started: system is shutting down")]
    ShuttingDown(String),
}

/// Errors raised by the named loop registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Loop '{name}' did not register within {waited:?}")]
    Timeout { name: String, waited: Duration },
    #[error("Loop '{0}' terminated before registering")]
    Aborted(String),
    /// The registry was shut down; no new loops are created.
    #[error("Loop '{0}' not created: registry is shut down")]
    Closed(String),
    #[error(transparent)]
    Loop(#[from] LoopError),
}

/// Result of a single timed retrieval against a [`crate::BlockingQueue`].
#[derive(Error, Debug)]
pub enum QueueError {
    /// Nothing arrived within the attempt timeout. Not a fault.
    #[error("Queue get timed out")]
    Timeout,
    /// Every producer is gone; no item will ever arrive.
    #[error("Queue is disconnected")]
    Disconnected,
    #[error("Queue error: {0}")]
    Other(#[from] anyhow::Error),
}

impl QueueError {
    /// Whether the error only means "try again".
    pub fn is_timeout(&self) -> bool {
        matches!(self, QueueError::Timeout)
    }
}

/// Errors related to the bridge system as a whole.
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Bridge system is already shutting down")]
    ShuttingDown,
    #[error("Failed during shutdown: {0}")]
    ShutdownError(String),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Loop error: {0}")]
    Loop(#[from] LoopError),
    #[error("Task error: {0}")]
    Task(#[from] TaskError),
    #[error("Internal system error: {0}")]
    Other(#[from] anyhow::Error),
}
