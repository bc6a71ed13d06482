// Tether: async/blocking bridge
//
// This crate runs blocking synchronous work off tokio event loops and
// supervises dedicated loop threads, built on the types in tether-api.

pub mod bridge;
pub mod config;
pub mod context;
pub mod logging;
pub mod patcher;
pub mod poll;
pub mod scheduler;
pub mod system;

// Re-export commonly used types
pub use bridge::{run_sync, run_sync_on, try_run_sync, try_run_sync_on};
pub use config::{LoopConfig, OverflowPolicy, PollConfig, PoolConfig, SystemConfig};
pub use context::{ContextSnapshot, ExecutionContext};
pub use patcher::{BufferedResponse, PatchOutcome, PatchableResponse, patch_creation_timestamps};
pub use poll::{receive_from_queue, receive_from_queue_on};
pub use scheduler::TaskFuture;
pub use scheduler::dedicated::{Initializer, LoopHandle, LoopRegistry, LoopThread};
pub use scheduler::elastic::{ElasticPool, PoolMetrics, PoolStatus};
pub use system::BridgeSystem;
pub use tether_api::*;
