//! Common type definitions shared by the pool and the loop threads.

use std::fmt;

use futures::future::BoxFuture;

use crate::errors::TaskError;

/// Outcome of a task submitted to a worker pool.
pub type TaskResult<T> = Result<T, TaskError>;

/// Future an initializer may hand back to be driven on its loop before the
/// loop starts serving.
pub type InitFuture = BoxFuture<'static, ()>;

/// Lifecycle of a supervised loop thread. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoopState {
    Created = 0,
    Running = 1,
    StopRequested = 2,
    Terminated = 3,
}

impl LoopState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Created,
            1 => LoopState::Running,
            2 => LoopState::StopRequested,
            _ => LoopState::Terminated,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == LoopState::Terminated
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Created => "created",
            LoopState::Running => "running",
            LoopState::StopRequested => "stop-requested",
            LoopState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}
