//! # Elastic Worker Pool
//!
//! Runs blocking closures on OS threads on behalf of async code.
//!
//! ## Key Concepts
//! - Persistent workers: up to `core_size` reusable threads sharing one job channel
//! - Transient workers: one-shot threads created when every persistent worker is busy
//! - Futures: every submission returns a [`TaskFuture`](crate::scheduler::TaskFuture)
//!   completed by whichever thread ran the task
//!
//! ## Design Principles
//! - Submission never blocks the caller waiting for capacity
//! - Panics are captured into the task's future, never raised on the submitter
//! - Unbounded overflow by default, optional ceiling with reject or queue policy

mod pool;
mod worker;

pub use pool::{ElasticPool, PoolMetrics, PoolStatus};
