use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tether_api::errors::{LoopError, TaskError};
use tether_api::signal::ShutdownSignal;
use tether_api::types::{InitFuture, LoopState};
use tokio::runtime::Builder;
use tracing::{Instrument, debug, error, warn};
use uuid::Uuid;

use super::handle::LoopHandle;
use crate::config::LoopConfig;
use crate::{log_loop, loop_span};

/// One-shot setup run on the loop thread before it starts serving.
///
/// It receives the loop's handle and shutdown signal and may return a future,
/// which is driven on the loop before serving begins.
pub type Initializer = Box<dyn FnOnce(&LoopHandle, &ShutdownSignal) -> Option<InitFuture> + Send + 'static>;

/// # LoopThread
///
/// An OS thread owning a private single-threaded tokio runtime.
///
/// ## Lifecycle
///
/// `Created → Running → StopRequested → Terminated`. There is no way back
/// from `Terminated`; a stopped loop thread cannot be restarted.
///
/// - [`LoopThread::start`] spawns the thread, builds the runtime, runs the
///   optional [`Initializer`] once, then serves spawned work until the
///   shutdown signal fires.
/// - [`LoopThread::stop`] triggers the signal. It is idempotent and a no-op
///   before `start`. Work still pending when the loop observes the signal is
///   dropped with the runtime; nothing new starts afterwards.
///
/// Dropping a `LoopThread` does not stop it.
pub struct LoopThread {
    id: Uuid,
    name: Arc<str>,
    config: LoopConfig,
    state: Arc<AtomicU8>,
    started: AtomicBool,
    shutdown: ShutdownSignal,
    handle: Arc<OnceLock<LoopHandle>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl LoopThread {
    pub fn new(name: impl Into<String>, config: LoopConfig) -> Self {
        let name: String = name.into();
        Self {
            id: Uuid::new_v4(),
            name: Arc::from(name),
            config,
            state: Arc::new(AtomicU8::new(LoopState::Created as u8)),
            started: AtomicBool::new(false),
            shutdown: ShutdownSignal::new(),
            handle: Arc::new(OnceLock::new()),
            join_handle: Mutex::new(None),
        }
    }

    /// Creates a loop thread, starts it and registers it for stop at system
    /// shutdown in the process-wide default system.
    pub fn run_detached(initializer: Option<Initializer>) -> Result<Arc<LoopThread>, LoopError> {
        crate::system::BridgeSystem::global().run_detached(initializer)
    }

    /// Spawns the OS thread and waits until its runtime is up.
    ///
    /// On return the thread is `Running` and [`handle`](Self::handle) is
    /// available; the initializer may still be executing.
    pub fn start(&self, initializer: Option<Initializer>) -> Result<(), LoopError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(LoopError::AlreadyStarted(self.name.to_string()));
        }

        let (ready_tx, ready_rx) = flume::bounded::<Result<(), LoopError>>(1);
        let id = self.id;
        let name = self.name.clone();
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();
        let handle_cell = self.handle.clone();
        let shutdown_timeout = self.config.shutdown_timeout;
        let thread_name = format!("{}-{}", self.config.thread_name_prefix, self.name);
        let dispatch = crate::logging::current_subscriber();

        let spawned = thread::Builder::new().name(thread_name.clone()).spawn(move || {
            let _dispatch = tracing::dispatcher::set_default(&dispatch);

            let runtime = match Builder::new_current_thread()
                .enable_all()
                .thread_name(thread_name)
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    state.store(LoopState::Terminated as u8, Ordering::SeqCst);
                    let _ = ready_tx.send(Err(LoopError::Runtime(err.to_string())));
                    return;
                }
            };

            let handle = LoopHandle::new(id, name.clone(), runtime.handle().clone(), shutdown.clone());
            let _ = handle_cell.set(handle.clone());
            let _ = state.compare_exchange(
                LoopState::Created as u8,
                LoopState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            let _ = ready_tx.send(Ok(()));
            log_loop!(&*name, "running", id = %id);

            let serve = Self::serve(handle, shutdown, initializer);
            runtime.block_on(serve.instrument(loop_span!(&*name, id)));

            runtime.shutdown_timeout(shutdown_timeout);
            state.store(LoopState::Terminated as u8, Ordering::SeqCst);
            log_loop!(&*name, "terminated", id = %id);
        });

        let join_handle = match spawned {
            Ok(join_handle) => join_handle,
            Err(err) => {
                self.state.store(LoopState::Terminated as u8, Ordering::SeqCst);
                return Err(LoopError::Spawn(err.to_string()));
            }
        };
        *self.join_handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(join_handle);

        match ready_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(LoopError::Spawn(format!(
                "loop thread '{}' exited during startup",
                self.name
            ))),
        }
    }

    /// Body of the loop: initializer first, then wait for the stop signal
    /// while the runtime drives spawned tasks.
    async fn serve(handle: LoopHandle, shutdown: ShutdownSignal, initializer: Option<Initializer>) {
        if let Some(initializer) = initializer {
            let setup = panic::catch_unwind(AssertUnwindSafe(|| initializer(&handle, &shutdown)));
            match setup {
                Ok(Some(init_future)) => {
                    tokio::select! {
                        outcome = AssertUnwindSafe(init_future).catch_unwind() => {
                            if let Err(payload) = outcome {
                                error!(loop_name = handle.name(), error = %TaskError::from_panic(payload), "loop initializer future panicked");
                                return;
                            }
                        }
                        _ = shutdown.wait() => {
                            debug!(loop_name = handle.name(), "stop requested during initialization");
                            return;
                        }
                    }
                }
                Ok(None) => {}
                Err(payload) => {
                    error!(loop_name = handle.name(), error = %TaskError::from_panic(payload), "loop initializer panicked");
                    return;
                }
            }
        }

        shutdown.wait().await;
        debug!(loop_name = handle.name(), "stop observed");
    }

    /// Requests the loop to stop.
    ///
    /// Returns `true` only for the call that actually triggered the signal.
    /// Calling it again, on a thread that was never started, or on one that
    /// has already terminated, does nothing.
    pub fn stop(&self) -> bool {
        match self.state() {
            LoopState::Created => {
                debug!(loop_name = %self.name, "stop ignored: loop not started");
                false
            }
            LoopState::Terminated => false,
            LoopState::Running | LoopState::StopRequested => {
                if !self.shutdown.trigger() {
                    return false;
                }
                let _ = self.state.compare_exchange(
                    LoopState::Running as u8,
                    LoopState::StopRequested as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                log_loop!(&*self.name, "stop_requested", id = %self.id);
                true
            }
        }
    }

    /// Waits up to `timeout` for the thread to terminate.
    ///
    /// Blocks the calling thread. Returns whether the loop has terminated.
    pub fn join(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.join_handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let Some(join_handle) = slot.as_ref() else {
            return self.state().is_terminal();
        };

        while !join_handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(loop_name = %self.name, ?timeout, "loop thread did not terminate in time");
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }

        if let Some(join_handle) = slot.take() {
            if join_handle.join().is_err() {
                error!(loop_name = %self.name, "loop thread panicked");
                self.state.store(LoopState::Terminated as u8, Ordering::SeqCst);
            }
        }
        self.state().is_terminal()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Handle to this thread's loop; `None` until the runtime is up.
    pub fn handle(&self) -> Option<LoopHandle> {
        self.handle.get().cloned()
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }
}

impl fmt::Debug for LoopThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopThread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
