use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tether_api::errors::TaskError;
use tether_api::types::TaskResult;
use tokio::sync::oneshot;

/// Creates a connected completer/future pair.
pub(crate) fn task_channel<T>() -> (Completer<T>, TaskFuture<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, TaskFuture { rx })
}

/// Write side of a [`TaskFuture`]. Consumed by the single completion.
pub(crate) struct Completer<T> {
    tx: oneshot::Sender<TaskResult<T>>,
}

impl<T> Completer<T> {
    pub(crate) fn complete(self, result: TaskResult<T>) {
        // The consumer may have given up waiting; the result is then discarded.
        let _ = self.tx.send(result);
    }
}

/// Single-assignment result of a task running on another thread.
///
/// Await it from async code, or call [`TaskFuture::wait`] from a plain
/// thread. If the producing side disappears without completing, the future
/// resolves to [`TaskError::Dropped`].
pub struct TaskFuture<T> {
    rx: oneshot::Receiver<TaskResult<T>>,
}

impl<T> TaskFuture<T> {
    /// A future that is already resolved.
    pub fn ready(result: TaskResult<T>) -> Self {
        let (completer, future) = task_channel();
        completer.complete(result);
        future
    }

    /// Blocks the current thread until the result is available.
    ///
    /// Must not be called from inside an async runtime; use `.await` there.
    pub fn wait(self) -> TaskResult<T> {
        self.rx.blocking_recv().unwrap_or(Err(TaskError::Dropped))
    }

    /// Takes the result if it is already available.
    pub fn try_take(&mut self) -> Option<TaskResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TaskError::Dropped)),
        }
    }
}

impl<T> Future for TaskFuture<T> {
    type Output = TaskResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskError::Dropped)))
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture").finish_non_exhaustive()
    }
}
