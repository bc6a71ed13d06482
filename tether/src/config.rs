use std::time::Duration;

/// Persistent pool size used when none is configured.
pub const DEFAULT_CORE_POOL_SIZE: usize = 30;

/// Per-attempt timeout of the shutdown-aware queue poll.
pub const DEFAULT_POLL_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// How long the registry waits for a new loop to register itself.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(1);

// --- Configuration Enums ---

/// What happens to a task when no persistent worker is free and the
/// transient-thread ceiling has been reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Resolve the task's future immediately with `TaskError::Rejected`.
    Reject,
    /// Hand the task to the persistent workers; it runs when one frees up.
    Queue,
}

// --- Pool Configuration ---

/// Configuration for the `ElasticPool`.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum number of reusable worker threads.
    pub core_size: usize,

    /// Prefix for worker thread names.
    pub thread_name_prefix: String,

    /// Ceiling on concurrently live transient threads. `None` is unbounded.
    pub max_transient: Option<usize>,

    /// Behaviour once `max_transient` is reached.
    pub overflow_policy: OverflowPolicy,

    /// How long `shutdown_and_wait` waits for persistent workers to exit.
    pub shutdown_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_size: DEFAULT_CORE_POOL_SIZE,
            thread_name_prefix: "tether-worker".to_string(),
            max_transient: None,
            overflow_policy: OverflowPolicy::Reject,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    /// A pool with one persistent worker per logical CPU.
    pub fn per_cpu() -> Self {
        Self {
            core_size: num_cpus::get(),
            ..Default::default()
        }
    }

    pub fn with_core_size(mut self, core_size: usize) -> Self {
        self.core_size = core_size;
        self
    }

    pub fn with_transient_limit(mut self, limit: usize, policy: OverflowPolicy) -> Self {
        self.max_transient = Some(limit);
        self.overflow_policy = policy;
        self
    }
}

// --- Loop Configuration ---

/// Configuration for supervised loop threads and the named registry.
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// Prefix for loop thread names.
    pub thread_name_prefix: String,

    /// Upper bound on the wait for a freshly spawned loop to register.
    pub settle_timeout: Duration,

    /// Grace period given to spawned tasks when a loop's runtime is torn down.
    pub shutdown_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "tether-loop".to_string(),
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            shutdown_timeout: Duration::from_millis(500),
        }
    }
}

// --- Poll Configuration ---

#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Timeout of a single blocking `get` against the queue.
    pub attempt_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: DEFAULT_POLL_ATTEMPT_TIMEOUT,
        }
    }
}

// --- System Configuration ---

/// Configuration for a `BridgeSystem`.
#[derive(Clone, Debug, Default)]
pub struct SystemConfig {
    pub pool: PoolConfig,
    pub loops: LoopConfig,
    pub poll: PollConfig,
}

impl SystemConfig {
    /// Upper bound on a full system shutdown: loops first, then the pool.
    pub fn shutdown_timeout(&self) -> Duration {
        self.loops.shutdown_timeout + self.pool.shutdown_timeout
    }
}
