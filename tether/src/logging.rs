// Logging for tether
//
// Built on the `tracing` ecosystem. Library code only emits events and spans;
// applications pick a subscriber with one of the `init*` functions below.
//
// # Usage Examples
//
// ```rust,ignore
// use tether::logging;
//
// // INFO level, human-readable console output
// logging::init_default();
//
// // Or a custom configuration
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
//
// // Structured events
// tether::log_pool!("default", "transient_spawned", live = 3);
// tether::log_loop!("metrics", "stopped");
// ```

use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration for the tether logging setup
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Only the first initialization takes effect
static INIT: Once = Once::new();

fn build_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.trim().parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }
    env_filter
}

/// Initialize logging with the given configuration
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(build_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(registry.with(fmt::layer().json().flatten_event(true)))
        } else if config.show_time {
            Box::new(
                registry.with(
                    fmt::layer()
                        .with_ansi(atty::is(atty::Stream::Stdout))
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        } else {
            Box::new(
                registry.with(
                    fmt::layer()
                        .without_time()
                        .with_ansi(atty::is(atty::Stream::Stdout))
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        };

        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG level with TRACE for the schedulers; colored output with file/line info.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("tether=debug,tether::scheduler=trace".to_string()),
    });
}

/// JSON output for log aggregators, no file/line information.
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    });
}

/// Warnings and errors only, compact output.
///
/// ```rust
/// tether::logging::init_test();
/// tether::logging::warn!("only warnings and errors reach the output");
/// ```
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    });
}

/// Span covering everything that runs on one supervised loop thread.
#[macro_export]
macro_rules! loop_span {
    ($name:expr, $id:expr) => {
        tracing::info_span!("loop", loop_name = $name, id = %$id)
    };
    ($name:expr, $id:expr, $($fields:tt)*) => {
        tracing::info_span!("loop", loop_name = $name, id = %$id, $($fields)*)
    };
}

/// Log worker pool events
///
/// ```rust,ignore
/// log_pool!("default", "transient_spawned", live = 3);
/// ```
#[macro_export]
macro_rules! log_pool {
    ($pool:expr, $event:expr) => {
        tracing::debug!(pool = $pool, event = $event);
    };
    ($pool:expr, $event:expr, $($fields:tt)*) => {
        tracing::debug!(pool = $pool, event = $event, $($fields)*);
    };
}

/// Log loop thread lifecycle events
#[macro_export]
macro_rules! log_loop {
    ($name:expr, $event:expr) => {
        tracing::info!(loop_name = $name, event = $event);
    };
    ($name:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(loop_name = $name, event = $event, $($fields)*);
    };
}

/// Log named registry events
#[macro_export]
macro_rules! log_registry {
    ($name:expr, $event:expr) => {
        tracing::debug!(registry_entry = $name, event = $event);
    };
    ($name:expr, $event:expr, $($fields:tt)*) => {
        tracing::debug!(registry_entry = $name, event = $event, $($fields)*);
    };
}

/// The current tracing dispatcher, for threads that should log through the
/// same subscriber as their creator.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
