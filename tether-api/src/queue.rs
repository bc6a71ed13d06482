//! # Blocking Queue Abstraction
//!
//! The shutdown-aware poll only needs a thread-safe queue with a timed `get`.
//! [`BlockingQueue`] captures exactly that, so any channel or queue type can
//! be consumed from async code through a worker thread.
//!
//! Implementations are provided for `flume::Receiver<T>`, for a mutex-guarded
//! `std::sync::mpsc::Receiver<T>` and for `Arc<Q>`.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::errors::QueueError;

/// A queue whose consumers block for at most `timeout` per retrieval.
pub trait BlockingQueue: Send + Sync {
    type Item: Send;

    /// Removes one item, waiting at most `timeout`.
    ///
    /// Returns [`QueueError::Timeout`] when nothing arrived in time.
    fn get(&self, timeout: Duration) -> Result<Self::Item, QueueError>;
}

impl<Q: BlockingQueue + ?Sized> BlockingQueue for Arc<Q> {
    type Item = Q::Item;

    fn get(&self, timeout: Duration) -> Result<Self::Item, QueueError> {
        (**self).get(timeout)
    }
}

impl<T: Send> BlockingQueue for flume::Receiver<T> {
    type Item = T;

    fn get(&self, timeout: Duration) -> Result<T, QueueError> {
        self.recv_timeout(timeout).map_err(|e| match e {
            flume::RecvTimeoutError::Timeout => QueueError::Timeout,
            flume::RecvTimeoutError::Disconnected => QueueError::Disconnected,
        })
    }
}

impl<T: Send> BlockingQueue for Mutex<mpsc::Receiver<T>> {
    type Item = T;

    fn get(&self, timeout: Duration) -> Result<T, QueueError> {
        let deadline = Instant::now() + timeout;
        // Waiting on the lock counts against the attempt timeout.
        let receiver = loop {
            match self.try_lock() {
                Ok(guard) => break guard,
                Err(std::sync::TryLockError::Poisoned(poisoned)) => break poisoned.into_inner(),
                Err(std::sync::TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(QueueError::Timeout);
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        receiver.recv_timeout(remaining).map_err(|e| match e {
            mpsc::RecvTimeoutError::Timeout => QueueError::Timeout,
            mpsc::RecvTimeoutError::Disconnected => QueueError::Disconnected,
        })
    }
}
