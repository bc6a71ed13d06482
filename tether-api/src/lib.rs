//! # Tether API
//!
//! Shared vocabulary for the `tether` bridge between async event loops and
//! blocking OS worker threads.
//!
//! ## Core Components
//!
//! - **Signals**: [`ShutdownSignal`] (one per loop thread) and [`StopFlag`]
//!   (one per process or system) are one-way switches that never reset.
//! - **Queues**: [`BlockingQueue`] abstracts any queue with a timed `get`, so
//!   async code can poll it without blocking through a process shutdown.
//! - **Errors**: typed failures for tasks, loops, the registry and queues.
//! - **Types**: task aliases and loop lifecycle states.
//!
//! ## Module Organization
//!
//! - [`errors`]: Error types and handling
//! - [`signal`]: Shutdown signal and stop flag
//! - [`queue`]: Blocking queue abstraction
//! - [`types`]: Common type definitions

pub mod errors;
pub mod queue;
pub mod signal;
pub mod types;

pub use errors::{LoopError, QueueError, RegistryError, SystemError, TaskError};
pub use queue::BlockingQueue;
pub use signal::{ShutdownSignal, StopFlag};
pub use types::{InitFuture, LoopState, TaskResult};
