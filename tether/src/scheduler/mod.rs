//! # Scheduler Module
//!
//! The two thread-level building blocks of the bridge.
//!
//! - [`elastic`]: a pool of OS threads for blocking work
//! - [`dedicated`]: supervised threads each owning a single-threaded async
//!   loop, and a registry that hands those loops out by name
//!
//! Both report results through [`TaskFuture`], a single-assignment cell that
//! can be awaited from async code or waited on from a plain thread.

pub mod dedicated;
pub mod elastic;
mod future;

pub use future::TaskFuture;
