use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tether_api::errors::RegistryError;
use tether_api::signal::ShutdownSignal;
use tether_api::types::InitFuture;
use tracing::warn;

use super::handle::LoopHandle;
use super::loop_thread::{Initializer, LoopThread};
use crate::config::LoopConfig;
use crate::log_registry;

type HandleMap = Arc<Mutex<HashMap<String, LoopHandle>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// # LoopRegistry
///
/// Hands out one dedicated loop per name, creating it on first use.
///
/// A new loop registers itself from its own thread and then fires a one-shot
/// completion signal; [`get_or_create`](Self::get_or_create) waits on that
/// signal, bounded by `LoopConfig::settle_timeout`. Creation is serialised
/// and re-checked under the spawn lock, so concurrent callers asking for the
/// same unregistered name all receive the same handle.
///
/// A loop that is stopped directly (not through the registry) keeps its
/// entry; its handle then reports `is_closed()`.
///
/// A loop abandoned after the settle timeout never appears in the registry,
/// even if its initializer runs late: the entry is only inserted while the
/// loop's stop signal is untriggered, and the check happens under the same
/// lock the timeout path removes under.
pub struct LoopRegistry {
    config: LoopConfig,
    handles: HandleMap,
    threads: Mutex<HashMap<String, Arc<LoopThread>>>,
    spawn_lock: Mutex<()>,
    closed: AtomicBool,
}

impl LoopRegistry {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            handles: Arc::new(Mutex::new(HashMap::new())),
            threads: Mutex::new(HashMap::new()),
            spawn_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the loop registered under `name`, spawning it if needed.
    ///
    /// Blocks the calling thread while a new loop starts up. From async code,
    /// call it through the sync bridge.
    pub fn get_or_create(&self, name: &str) -> Result<LoopHandle, RegistryError> {
        if let Some(handle) = self.get(name) {
            return Ok(handle);
        }

        let _spawning = lock(&self.spawn_lock);
        if self.is_closed() {
            return Err(RegistryError::Closed(name.to_string()));
        }
        if let Some(handle) = self.get(name) {
            log_registry!(name, "created_concurrently");
            return Ok(handle);
        }

        let thread = Arc::new(LoopThread::new(name, self.config.clone()));
        let (registered_tx, registered_rx) = flume::bounded::<()>(1);
        let handles = self.handles.clone();
        let entry_name = name.to_string();

        let initializer: Initializer = Box::new(move |handle: &LoopHandle, shutdown: &ShutdownSignal| -> Option<InitFuture> {
            let mut handles = lock(&handles);
            if shutdown.is_triggered() {
                return None;
            }
            handles.insert(entry_name, handle.clone());
            drop(handles);
            let _ = registered_tx.send(());
            None
        });

        thread.start(Some(initializer))?;

        let waited = self.config.settle_timeout;
        match registered_rx.recv_timeout(waited) {
            Ok(()) => {}
            Err(flume::RecvTimeoutError::Timeout) => {
                warn!(registry_entry = name, ?waited, "loop did not register in time; stopping it");
                // Trigger first: a late initializer then sees the signal and skips the insert
                thread.stop();
                lock(&self.handles).remove(name);
                return Err(RegistryError::Timeout {
                    name: name.to_string(),
                    waited,
                });
            }
            Err(flume::RecvTimeoutError::Disconnected) => {
                return Err(RegistryError::Aborted(name.to_string()));
            }
        }

        lock(&self.threads).insert(name.to_string(), thread);
        log_registry!(name, "created");

        self.get(name).ok_or_else(|| RegistryError::Aborted(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<LoopHandle> {
        lock(&self.handles).get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.handles).contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.handles).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        lock(&self.handles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes `name` and stops its loop. Returns whether it was registered.
    pub fn stop(&self, name: &str) -> bool {
        let removed = lock(&self.handles).remove(name).is_some();
        if let Some(thread) = lock(&self.threads).remove(name) {
            thread.stop();
        }
        if removed {
            log_registry!(name, "stopped");
        }
        removed
    }

    /// Refuses further creations, then stops every loop like
    /// [`stop_all`](Self::stop_all). Loops already registered stay reachable
    /// through existing handles until they terminate.
    pub fn shutdown(&self, timeout: Duration) -> Vec<String> {
        {
            let _spawning = lock(&self.spawn_lock);
            self.closed.store(true, Ordering::SeqCst);
        }
        self.stop_all(timeout)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops every registered loop and waits up to `timeout` for each to
    /// terminate. Returns the names that failed to terminate in time.
    pub fn stop_all(&self, timeout: Duration) -> Vec<String> {
        let threads: Vec<(String, Arc<LoopThread>)> = {
            let _spawning = lock(&self.spawn_lock);
            lock(&self.handles).clear();
            lock(&self.threads).drain().collect()
        };

        for (_, thread) in &threads {
            thread.stop();
        }

        let mut lingering: Vec<String> = threads
            .into_iter()
            .filter(|(_, thread)| !thread.join(timeout))
            .map(|(name, _)| name)
            .collect();
        lingering.sort();
        lingering
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }
}

impl Default for LoopRegistry {
    fn default() -> Self {
        Self::new(LoopConfig::default())
    }
}

impl fmt::Debug for LoopRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopRegistry").field("names", &self.names()).finish()
    }
}
