//! # Bridge System
//!
//! Owns the process-level resources of the bridge: the elastic pool, the
//! named loop registry, the stop flag read by queue polls, and the set of
//! detached loop threads awaiting cleanup.
//!
//! A process-wide instance is created lazily by [`BridgeSystem::global`] and
//! is what the free functions in [`bridge`](crate::bridge) and
//! [`poll`](crate::poll) use. Independent systems can be built with
//! [`BridgeSystem::new`], which is mostly useful in tests.
//!
//! Statics are never dropped, so applications tear the global instance down
//! explicitly with [`BridgeSystem::shutdown`] before exiting.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_queue::SegQueue;
use lazy_static::lazy_static;
use tether_api::errors::{LoopError, QueueError, RegistryError, SystemError};
use tether_api::queue::BlockingQueue;
use tether_api::signal::StopFlag;
use tracing::{info, warn};

use crate::config::SystemConfig;
use crate::poll::receive_from_queue_on;
use crate::scheduler::dedicated::{Initializer, LoopHandle, LoopRegistry, LoopThread};
use crate::scheduler::elastic::ElasticPool;

lazy_static! {
    static ref GLOBAL_SYSTEM: BridgeSystem = BridgeSystem::new(SystemConfig::default());
}

pub struct BridgeSystem {
    config: SystemConfig,
    pool: ElasticPool,
    registry: LoopRegistry,
    stop_flag: StopFlag,
    detached: SegQueue<Arc<LoopThread>>,
    detached_count: AtomicUsize,
    shutting_down: AtomicBool,
}

impl BridgeSystem {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            pool: ElasticPool::new(config.pool.clone()),
            registry: LoopRegistry::new(config.loops.clone()),
            config,
            stop_flag: StopFlag::new(),
            detached: SegQueue::new(),
            detached_count: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// The process-wide system, created with default configuration on first use.
    pub fn global() -> &'static BridgeSystem {
        &GLOBAL_SYSTEM
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn pool(&self) -> &ElasticPool {
        &self.pool
    }

    pub fn registry(&self) -> &LoopRegistry {
        &self.registry
    }

    /// Flag observed by every queue poll running against this system.
    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop_flag
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Returns the named loop, spawning it on first use.
    ///
    /// Fails with [`RegistryError::Closed`] once shutdown has begun.
    pub fn get_or_create_loop(&self, name: &str) -> Result<LoopHandle, RegistryError> {
        if self.is_shutting_down() {
            return Err(RegistryError::Closed(name.to_string()));
        }
        self.registry.get_or_create(name)
    }

    /// Starts an unnamed loop thread that is stopped when the system shuts down.
    ///
    /// Fails with [`LoopError::ShuttingDown`] once shutdown has begun.
    pub fn run_detached(&self, initializer: Option<Initializer>) -> Result<Arc<LoopThread>, LoopError> {
        let seq = self.detached_count.fetch_add(1, Ordering::SeqCst);
        let name = format!("detached-{seq}");
        if self.is_shutting_down() {
            return Err(LoopError::ShuttingDown(name));
        }

        let thread = Arc::new(LoopThread::new(name.clone(), self.config.loops.clone()));
        thread.start(initializer)?;
        self.detached.push(thread.clone());

        // Shutdown may have drained the queue between the check and the push
        if self.is_shutting_down() {
            thread.stop();
            return Err(LoopError::ShuttingDown(name));
        }
        Ok(thread)
    }

    /// Number of detached loop threads tracked for cleanup.
    pub fn detached_len(&self) -> usize {
        self.detached.len()
    }

    /// Waits for the next queue item using this system's pool and stop flag.
    pub fn receive_from_queue<Q>(
        &self,
        queue: Q,
    ) -> impl Future<Output = Result<Option<Q::Item>, QueueError>> + Send + use<Q>
    where
        Q: BlockingQueue + 'static,
        Q::Item: 'static,
    {
        receive_from_queue_on(&self.pool, queue, &self.stop_flag, self.config.poll.attempt_timeout)
    }

    /// Tears the system down.
    ///
    /// Sets the stop flag so pending queue polls return, stops and joins every
    /// detached and registered loop, then shuts the pool down and waits for
    /// its persistent workers. Blocks the calling thread for at most
    /// [`SystemConfig::shutdown_timeout`]; the pool gets whatever the loops
    /// left of that budget. New loops are refused from the first call on, and
    /// a second call fails with [`SystemError::ShuttingDown`].
    pub fn shutdown(&self) -> Result<(), SystemError> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return Err(SystemError::ShuttingDown);
        }
        let budget = self.config.shutdown_timeout();
        let deadline = Instant::now() + budget;
        info!(?budget, "bridge system shutting down");
        self.stop_flag.set();

        let join_timeout = self.config.loops.shutdown_timeout;
        let mut lingering = Vec::new();

        let mut detached = Vec::new();
        while let Some(thread) = self.detached.pop() {
            thread.stop();
            detached.push(thread);
        }
        for thread in detached {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !thread.join(join_timeout.min(remaining)) {
                lingering.push(thread.name().to_string());
            }
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        lingering.extend(self.registry.shutdown(join_timeout.min(remaining)));

        let pool_result = self.pool.shutdown_and_wait(deadline.saturating_duration_since(Instant::now()));

        if !lingering.is_empty() {
            warn!(?lingering, "loop threads still running after shutdown");
            return Err(SystemError::ShutdownError(format!(
                "loops did not terminate in time: {}",
                lingering.join(", ")
            )));
        }
        pool_result?;
        info!("bridge system shut down");
        Ok(())
    }
}

impl Default for BridgeSystem {
    fn default() -> Self {
        Self::new(SystemConfig::default())
    }
}

impl fmt::Debug for BridgeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSystem")
            .field("pool", &self.pool)
            .field("registry", &self.registry)
            .field("detached", &self.detached.len())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}
