use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tether_api::signal::ShutdownSignal;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::context::ExecutionContext;

/// Non-owning reference to the async loop of one [`LoopThread`](super::LoopThread).
///
/// Handles are only used to schedule work onto the loop; they can be cloned
/// and used from any thread. Once the loop has stopped, spawned work is
/// cancelled immediately and its `JoinHandle` resolves to an error.
#[derive(Clone)]
pub struct LoopHandle {
    id: Uuid,
    name: Arc<str>,
    runtime: Handle,
    shutdown: ShutdownSignal,
}

impl LoopHandle {
    pub(crate) fn new(id: Uuid, name: Arc<str>, runtime: Handle, shutdown: ShutdownSignal) -> Self {
        Self {
            id,
            name,
            runtime,
            shutdown,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schedules `future` on the loop.
    ///
    /// The future runs inside the caller's [`ExecutionContext`], so it sees
    /// the same context-local values as the code that scheduled it.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let context = ExecutionContext::current();
        self.runtime.spawn(context.scope(future))
    }

    /// Whether the owning loop has been asked to stop.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Whether both handles refer to the same loop.
    pub fn same_loop(&self, other: &LoopHandle) -> bool {
        self.id == other.id
    }
}

impl PartialEq for LoopHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_loop(other)
    }
}

impl Eq for LoopHandle {}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
