//! # Sync Bridge
//!
//! Lets async code run blocking synchronous work without stalling its loop.
//!
//! The caller's [`ContextSnapshot`](crate::context::ContextSnapshot) is
//! captured, the closure is submitted to an [`ElasticPool`], and the awaiting
//! task yields to its scheduler until a worker completes it. Other tasks on
//! the same loop keep running in the meantime.
//!
//! A panic in the closure comes back as [`TaskError::Panicked`] at the await
//! point. [`try_run_sync`] additionally folds pool failures into the closure's
//! own error type.
//!
//! ## Usage Example
//!
//! ```rust
//! # async fn example() -> Result<(), tether_api::TaskError> {
//! let checksum = tether::bridge::run_sync(|| {
//!     // Blocking work, e.g. file or database IO
//!     (1..=100u32).sum::<u32>()
//! })
//! .await?;
//! assert_eq!(checksum, 5050);
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use tether_api::errors::TaskError;
use tether_api::types::TaskResult;

use crate::context::ContextSnapshot;
use crate::scheduler::TaskFuture;
use crate::scheduler::elastic::ElasticPool;
use crate::system::BridgeSystem;

/// Runs `func` on the default pool and awaits its result.
pub async fn run_sync<F, T>(func: F) -> TaskResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    run_sync_on(BridgeSystem::global().pool(), func).await
}

/// Runs `func` on `pool`. The context snapshot is taken now, at call time.
pub fn run_sync_on<F, T>(pool: &ElasticPool, func: F) -> TaskFuture<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    pool.submit_with_snapshot(ContextSnapshot::capture(), func)
}

/// Runs a fallible `func` on the default pool, flattening pool faults into `E`.
pub async fn try_run_sync<F, T, E>(func: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<TaskError> + Send + 'static,
{
    try_run_sync_on(BridgeSystem::global().pool(), func).await
}

/// Runs a fallible `func` on `pool`, flattening pool faults into `E`.
pub fn try_run_sync_on<F, T, E>(
    pool: &ElasticPool,
    func: F,
) -> impl Future<Output = Result<T, E>> + Send + use<F, T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<TaskError> + Send + 'static,
{
    let pending = run_sync_on(pool, func);
    async move {
        match pending.await {
            Ok(result) => result,
            Err(fault) => Err(E::from(fault)),
        }
    }
}
