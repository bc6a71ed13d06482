//! # Dedicated Loop Threads
//!
//! Background subsystems that need their own async loop get one here.
//!
//! ## Key Concepts
//! - [`LoopThread`]: an OS thread with a private current-thread tokio runtime,
//!   stopped through a one-way [`ShutdownSignal`](tether_api::ShutdownSignal)
//! - [`LoopHandle`]: cloneable reference used to schedule work onto a loop
//! - [`LoopRegistry`]: lazily creates one loop per name and hands out its handle
//!
//! ## Design Principles
//! - Isolation: a loop's tasks only ever run on its own thread
//! - Cooperative stop: the signal is observed by the loop, never forced
//! - Explicit registration handshake instead of a timed wait

mod handle;
mod loop_thread;
mod registry;

pub use handle::LoopHandle;
pub use loop_thread::{Initializer, LoopThread};
pub use registry::LoopRegistry;
