//! # Shutdown-Aware Queue Poll
//!
//! Consumes a [`BlockingQueue`] from async code without ever blocking across
//! a shutdown.
//!
//! The retrieval runs on a pool worker as a series of short timed `get`s.
//! Before every attempt the stop flag is checked; once it is set the poll
//! returns `Ok(None)` without touching the queue again. A timed-out attempt
//! simply leads to the next one. Only genuine queue faults end the poll with
//! an error.
//!
//! A poll started after the flag is set resolves to `Ok(None)` without
//! reaching the pool, so consumers see the same result whether shutdown
//! happened before or during their wait.

use std::future::Future;
use std::time::Duration;

use anyhow::anyhow;
use tether_api::errors::{QueueError, TaskError};
use tether_api::queue::BlockingQueue;
use tether_api::signal::StopFlag;
use tracing::trace;

use crate::bridge::run_sync_on;
use crate::scheduler::elastic::ElasticPool;
use crate::system::BridgeSystem;

/// Waits for the next item using the default system's pool, stop flag and
/// attempt timeout.
pub async fn receive_from_queue<Q>(queue: Q) -> Result<Option<Q::Item>, QueueError>
where
    Q: BlockingQueue + 'static,
    Q::Item: 'static,
{
    BridgeSystem::global().receive_from_queue(queue).await
}

/// Waits for the next item on `pool`, giving up as soon as `stop` is set.
pub fn receive_from_queue_on<Q>(
    pool: &ElasticPool,
    queue: Q,
    stop: &StopFlag,
    attempt_timeout: Duration,
) -> impl Future<Output = Result<Option<Q::Item>, QueueError>> + Send + use<Q>
where
    Q: BlockingQueue + 'static,
    Q::Item: 'static,
{
    let stop = stop.clone();
    let pending = (!stop.is_set()).then(|| {
        let stop = stop.clone();
        run_sync_on(pool, move || poll_until_stopped(&queue, &stop, attempt_timeout))
    });
    async move {
        let Some(pending) = pending else {
            trace!("stop flag set; queue poll not submitted");
            return Ok(None);
        };
        match pending.await {
            Ok(received) => received,
            // The pool went away because the system is stopping
            Err(TaskError::PoolShutdown | TaskError::Dropped) if stop.is_set() => Ok(None),
            Err(fault) => Err(QueueError::Other(anyhow!(fault))),
        }
    }
}

fn poll_until_stopped<Q>(queue: &Q, stop: &StopFlag, attempt_timeout: Duration) -> Result<Option<Q::Item>, QueueError>
where
    Q: BlockingQueue,
{
    let mut attempts: u64 = 0;
    loop {
        if stop.is_set() {
            trace!(attempts, "stop flag set; abandoning queue poll");
            return Ok(None);
        }
        attempts += 1;
        match queue.get(attempt_timeout) {
            Ok(item) => return Ok(Some(item)),
            Err(QueueError::Timeout) => continue,
            Err(err) => return Err(err),
        }
    }
}
