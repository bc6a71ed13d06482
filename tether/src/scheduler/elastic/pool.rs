use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tether_api::errors::{SystemError, TaskError};
use tracing::{debug, error, info, warn};

use super::worker::{Job, PoolShared, Task, Worker, spawn_transient};
use crate::config::{OverflowPolicy, PoolConfig};
use crate::context::ContextSnapshot;
use crate::log_pool;
use crate::scheduler::future::{TaskFuture, task_channel};

/// Status codes for the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Accepting work
    Running = 0,
    /// Channel closed; persistent workers are draining
    ShuttingDown = 1,
    /// Every persistent worker has exited
    Shutdown = 2,
}

impl PoolStatus {
    fn from_usize(value: usize) -> Self {
        match value {
            0 => PoolStatus::Running,
            1 => PoolStatus::ShuttingDown,
            _ => PoolStatus::Shutdown,
        }
    }
}

/// Point-in-time view of the pool's threads and counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Configured persistent capacity
    pub core_size: usize,
    /// Persistent worker threads currently alive
    pub persistent_threads: usize,
    /// Persistent workers waiting for work
    pub idle_threads: usize,
    /// Transient threads currently running
    pub live_transient: usize,
    /// Transient threads created since the pool started
    pub transient_spawned: usize,
    /// Tasks that ran to completion (including those that panicked)
    pub completed: usize,
    pub status: PoolStatus,
}

/// # ElasticPool
///
/// Worker pool with a bounded core of reusable threads plus one-shot overflow
/// threads.
///
/// ## Scheduling
///
/// 1. If an idle persistent worker can be claimed, the task goes to the job
///    channel and that worker picks it up.
/// 2. Otherwise, if fewer than `core_size` persistent workers exist, a new one
///    is spawned for the task.
/// 3. Otherwise a transient thread is created to run just this task.
///
/// `submit` never waits for capacity. With the default configuration the
/// number of transient threads is unbounded; `PoolConfig::max_transient` caps
/// it, with `OverflowPolicy` choosing between rejecting and queueing.
///
/// ## Thread Safety
///
/// Cloning is cheap and every clone drives the same workers. The spawn
/// decision is serialised by the worker list lock; the idle count is atomic.
/// Dropping the last clone closes the channel and persistent workers exit.
#[derive(Clone)]
pub struct ElasticPool {
    core: Arc<PoolCore>,
}

struct PoolCore {
    config: PoolConfig,
    /// `None` once shutdown has begun
    sender: Mutex<Option<flume::Sender<Job>>>,
    receiver: flume::Receiver<Job>,
    /// Join handles of persistent workers, also the spawn-decision lock
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_worker_id: AtomicUsize,
    next_transient_id: AtomicUsize,
    shared: Arc<PoolShared>,
    status: AtomicUsize,
}

impl ElasticPool {
    /// Creates a pool. No thread is started until work arrives.
    pub fn new(config: PoolConfig) -> Self {
        let mut config = config;
        if config.core_size == 0 {
            warn!("core_size 0 is not allowed; using 1");
            config.core_size = 1;
        }
        let (sender, receiver) = flume::unbounded();

        info!(
            pool = %config.thread_name_prefix,
            core_size = config.core_size,
            max_transient = ?config.max_transient,
            "elastic pool created"
        );

        Self {
            core: Arc::new(PoolCore {
                workers: Mutex::new(Vec::with_capacity(config.core_size)),
                config,
                sender: Mutex::new(Some(sender)),
                receiver,
                next_worker_id: AtomicUsize::new(0),
                next_transient_id: AtomicUsize::new(0),
                shared: Arc::new(PoolShared::default()),
                status: AtomicUsize::new(PoolStatus::Running as usize),
            }),
        }
    }

    pub fn with_core_size(core_size: usize) -> Self {
        Self::new(PoolConfig::default().with_core_size(core_size))
    }

    /// Submits `func`, carrying the caller's context snapshot to the worker.
    ///
    /// Returns immediately. A panic in `func` resolves the future with
    /// [`TaskError::Panicked`]; nothing is raised on the calling thread.
    pub fn submit<F, T>(&self, func: F) -> TaskFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_with_snapshot(ContextSnapshot::capture(), func)
    }

    /// Submits `func` to run under an explicit snapshot.
    pub fn submit_with_snapshot<F, T>(&self, snapshot: ContextSnapshot, func: F) -> TaskFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.dispatch(move || snapshot.run(func))
    }

    /// Submits `func` without propagating any context.
    pub fn spawn_blocking<F, T>(&self, func: F) -> TaskFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.dispatch(func)
    }

    fn dispatch<F, T>(&self, func: F) -> TaskFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.status() != PoolStatus::Running {
            return TaskFuture::ready(Err(TaskError::PoolShutdown));
        }

        let (completer, future) = task_channel();
        let job: Job = Box::new(Task::new(func, completer));
        self.route(job);
        future
    }

    fn route(&self, job: Job) {
        let shared = &self.core.shared;

        if shared.try_claim_idle() {
            log_pool!(self.name(), "reuse_idle");
            self.enqueue(job);
            return;
        }

        {
            let mut workers = self.lock_workers();
            if workers.len() < self.core.config.core_size {
                match self.spawn_persistent(&mut workers) {
                    Ok(()) => {
                        drop(workers);
                        self.enqueue(job);
                        return;
                    }
                    Err(err) => {
                        error!(pool = %self.name(), error = %err, "failed to spawn persistent worker");
                    }
                }
            }
        }

        self.overflow(job);
    }

    fn overflow(&self, job: Job) {
        let shared = &self.core.shared;
        let config = &self.core.config;

        let reserved = match config.max_transient {
            None => {
                shared.live_transient.fetch_add(1, Ordering::SeqCst);
                true
            }
            Some(limit) => shared
                .live_transient
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| (live < limit).then_some(live + 1))
                .is_ok(),
        };

        if !reserved {
            let limit = config.max_transient.unwrap_or_default();
            match config.overflow_policy {
                OverflowPolicy::Reject => {
                    let live = shared.live_transient.load(Ordering::SeqCst);
                    warn!(pool = %self.name(), live, limit, "transient limit reached; rejecting task");
                    job.abort(TaskError::Rejected { live, limit });
                }
                OverflowPolicy::Queue => {
                    log_pool!(self.name(), "queued_at_limit", limit = limit);
                    self.enqueue(job);
                }
            }
            return;
        }

        let serial = self.core.next_transient_id.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}-transient-{}", config.thread_name_prefix, serial);
        log_pool!(self.name(), "transient_spawned", live = shared.live_transient.load(Ordering::SeqCst));

        if let Err((job, err)) = spawn_transient(name, job, shared.clone()) {
            error!(pool = %self.name(), error = %err, "failed to spawn transient worker");
            // Fall back to the persistent workers when there are any
            if shared.live_persistent.load(Ordering::SeqCst) > 0 {
                self.enqueue(job);
            } else {
                job.abort(TaskError::Spawn(err.to_string()));
            }
        }
    }

    fn spawn_persistent(&self, workers: &mut MutexGuard<'_, Vec<JoinHandle<()>>>) -> std::io::Result<()> {
        let id = self.core.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let worker = Worker::new(id, self.core.receiver.clone(), self.core.shared.clone());
        let handle = worker.spawn(format!("{}-{}", self.core.config.thread_name_prefix, id))?;
        workers.push(handle);
        log_pool!(self.name(), "persistent_spawned", worker = id, persistent = workers.len());
        Ok(())
    }

    fn enqueue(&self, job: Job) {
        let sender = self.core.sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match sender.as_ref() {
            Some(sender) => {
                if let Err(flume::SendError(job)) = sender.send(job) {
                    job.abort(TaskError::PoolShutdown);
                }
            }
            None => job.abort(TaskError::PoolShutdown),
        }
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.core.workers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pool name, taken from the thread name prefix.
    pub fn name(&self) -> &str {
        &self.core.config.thread_name_prefix
    }

    pub fn config(&self) -> &PoolConfig {
        &self.core.config
    }

    pub fn core_size(&self) -> usize {
        self.core.config.core_size
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus::from_usize(self.core.status.load(Ordering::SeqCst))
    }

    pub fn metrics(&self) -> PoolMetrics {
        let shared = &self.core.shared;
        PoolMetrics {
            core_size: self.core.config.core_size,
            persistent_threads: shared.live_persistent.load(Ordering::SeqCst),
            idle_threads: shared.idle.load(Ordering::SeqCst),
            live_transient: shared.live_transient.load(Ordering::SeqCst),
            transient_spawned: shared.transient_spawned.load(Ordering::SeqCst),
            completed: shared.completed.load(Ordering::SeqCst),
            status: self.status(),
        }
    }

    /// Stops accepting work and closes the job channel.
    ///
    /// Queued jobs still run; persistent workers exit once the channel is
    /// drained. Transient threads finish their single task. Idempotent.
    pub fn shutdown(&self) {
        let taken = self
            .core
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if taken.is_some() {
            self.core.status.store(PoolStatus::ShuttingDown as usize, Ordering::SeqCst);
            info!(pool = %self.name(), "elastic pool shutting down");
        }
    }

    /// Shuts down and waits up to `timeout` for persistent workers to exit.
    ///
    /// Blocks the calling thread.
    pub fn shutdown_and_wait(&self, timeout: Duration) -> Result<(), SystemError> {
        self.shutdown();

        let deadline = Instant::now() + timeout;
        let mut pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.lock_workers());

        while !pending.is_empty() {
            let (finished, still_running): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|handle| handle.is_finished());
            for handle in finished {
                if handle.join().is_err() {
                    warn!(pool = %self.name(), "persistent worker exited by panic");
                }
            }
            pending = still_running;

            if pending.is_empty() {
                break;
            }
            if Instant::now() >= deadline {
                let remaining = pending.len();
                // Put the stragglers back so a later call can retry the join
                self.lock_workers().extend(pending);
                return Err(SystemError::ShutdownError(format!(
                    "{} persistent workers still busy after {:?}",
                    remaining, timeout
                )));
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        self.core.status.store(PoolStatus::Shutdown as usize, Ordering::SeqCst);
        debug!(pool = %self.name(), "all persistent workers joined");
        Ok(())
    }
}

impl Default for ElasticPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl fmt::Debug for ElasticPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticPool")
            .field("name", &self.name())
            .field("metrics", &self.metrics())
            .finish()
    }
}
