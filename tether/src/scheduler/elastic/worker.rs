use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tether_api::errors::TaskError;
use tracing::{debug, trace};

use crate::scheduler::future::Completer;

/// A unit of work that can either run or be failed without running.
pub(crate) trait Runnable: Send {
    fn run(self: Box<Self>);
    fn abort(self: Box<Self>, error: TaskError);
}

pub(crate) type Job = Box<dyn Runnable>;

/// A closure paired with the completer of its future.
pub(crate) struct Task<F, T> {
    func: F,
    completer: Completer<T>,
}

impl<F, T> Task<F, T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    pub(crate) fn new(func: F, completer: Completer<T>) -> Self {
        Self { func, completer }
    }
}

impl<F, T> Runnable for Task<F, T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    fn run(self: Box<Self>) {
        let Task { func, completer } = *self;
        let result = panic::catch_unwind(AssertUnwindSafe(func)).map_err(TaskError::from_panic);
        completer.complete(result);
    }

    fn abort(self: Box<Self>, error: TaskError) {
        self.completer.complete(Err(error));
    }
}

/// Counters shared between the pool handle and every thread it created.
#[derive(Debug, Default)]
pub(crate) struct PoolShared {
    /// Persistent workers parked on the job channel and not yet claimed.
    pub(crate) idle: AtomicUsize,
    pub(crate) live_persistent: AtomicUsize,
    pub(crate) live_transient: AtomicUsize,
    pub(crate) transient_spawned: AtomicUsize,
    pub(crate) completed: AtomicUsize,
}

impl PoolShared {
    /// Claims one idle persistent worker, if any.
    pub(crate) fn try_claim_idle(&self) -> bool {
        self.idle
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |idle| idle.checked_sub(1))
            .is_ok()
    }
}

/// # Persistent Worker
///
/// A reusable pool thread. It pulls jobs from the shared channel until every
/// sender is gone, which is how the pool shuts it down.
///
/// After finishing each job the worker advertises itself as idle before
/// blocking on the channel again. A worker spawned for a specific job starts
/// out busy, so it never advertises before taking its first job.
pub(crate) struct Worker {
    id: usize,
    receiver: flume::Receiver<Job>,
    shared: Arc<PoolShared>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("id", &self.id).finish()
    }
}

impl Worker {
    pub(crate) fn new(id: usize, receiver: flume::Receiver<Job>, shared: Arc<PoolShared>) -> Self {
        Self {
            id,
            receiver,
            shared,
        }
    }

    /// Launches the worker on a new OS thread named `name`.
    pub(crate) fn spawn(self, name: String) -> io::Result<JoinHandle<()>> {
        let shared = self.shared.clone();
        shared.live_persistent.fetch_add(1, Ordering::SeqCst);
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run_loop())
            .inspect_err(|_| {
                shared.live_persistent.fetch_sub(1, Ordering::SeqCst);
            })
    }

    fn run_loop(self) {
        debug!(worker = self.id, "persistent worker started");

        while let Ok(job) = self.receiver.recv() {
            job.run();
            self.shared.completed.fetch_add(1, Ordering::SeqCst);
            self.shared.idle.fetch_add(1, Ordering::SeqCst);
        }

        // Channel closed: withdraw this worker's idle credit on the way out
        let _ = self.shared.try_claim_idle();
        self.shared.live_persistent.fetch_sub(1, Ordering::SeqCst);
        debug!(worker = self.id, "persistent worker stopped");
    }
}

/// Runs `job` on a brand-new one-shot thread.
///
/// The caller must already have counted the thread in `live_transient`. On
/// spawn failure the count is released and the job is handed back.
pub(crate) fn spawn_transient(name: String, job: Job, shared: Arc<PoolShared>) -> Result<(), (Job, io::Error)> {
    // The slot lets a failed spawn give the job back instead of dropping it
    let slot = Arc::new(Mutex::new(Some(job)));
    let thread_slot = slot.clone();
    let thread_shared = shared.clone();

    let spawned = thread::Builder::new().name(name).spawn(move || {
        let job = thread_slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        if let Some(job) = job {
            job.run();
            thread_shared.completed.fetch_add(1, Ordering::SeqCst);
        }
        thread_shared.live_transient.fetch_sub(1, Ordering::SeqCst);
        trace!("transient worker finished");
    });

    match spawned {
        Ok(_detached) => {
            shared.transient_spawned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        Err(err) => {
            shared.live_transient.fetch_sub(1, Ordering::SeqCst);
            let job = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
            match job {
                Some(job) => Err((job, err)),
                // Unreachable in practice: the closure never ran
                None => Ok(()),
            }
        }
    }
}
