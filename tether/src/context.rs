//! # Execution Context
//!
//! Logical, per-task context that follows work across the async/thread
//! boundary.
//!
//! Inside async code the context is a tokio task-local, so two tasks sharing
//! a loop thread never see each other's values. Inside pool threads it is a
//! thread-local that is installed for the duration of one task and restored
//! afterwards.
//!
//! ## Key Concepts
//! - [`ExecutionContext`]: immutable string-keyed map; adding a value yields a
//!   new context and leaves the original untouched
//! - [`ContextSnapshot`]: the context plus the current tracing span and
//!   dispatcher, captured at submit time and re-installed on the worker
//!
//! ## Usage Example
//!
//! ```rust
//! use tether::context::ExecutionContext;
//!
//! let ctx = ExecutionContext::new().with_value("request_id", 42u64);
//! let seen = ctx.run(|| tether::context::get::<u64>("request_id"));
//! assert_eq!(seen.as_deref(), Some(&42));
//! assert!(tether::context::get::<u64>("request_id").is_none());
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{Dispatch, Span};

type ContextValue = Arc<dyn Any + Send + Sync>;

tokio::task_local! {
    static TASK_CONTEXT: ExecutionContext;
}

thread_local! {
    static THREAD_CONTEXT: RefCell<ExecutionContext> = RefCell::new(ExecutionContext::default());
}

/// Immutable, cheaply cloneable set of context-local values.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    values: Arc<HashMap<String, ContextValue>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The context visible to the caller: the enclosing task scope if there
    /// is one, otherwise whatever is installed on this thread.
    pub fn current() -> Self {
        TASK_CONTEXT
            .try_with(|ctx| ctx.clone())
            .unwrap_or_else(|_| THREAD_CONTEXT.with(|ctx| ctx.borrow().clone()))
    }

    /// Returns a copy of this context with `key` bound to `value`.
    pub fn with_value<T>(&self, key: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        let mut values = (*self.values).clone();
        values.insert(key.into(), Arc::new(value));
        Self {
            values: Arc::new(values),
        }
    }

    /// Looks up `key`, returning `None` when absent or of another type.
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.values
            .get(key)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Runs `future` with this context as its task-local context.
    pub async fn scope<F>(self, future: F) -> F::Output
    where
        F: Future,
    {
        TASK_CONTEXT.scope(self, future).await
    }

    /// Installs this context on the current thread until the guard drops.
    pub fn enter(self) -> ContextGuard {
        let previous = THREAD_CONTEXT.with(|ctx| ctx.replace(self));
        ContextGuard {
            previous: Some(previous),
            _not_send: PhantomData,
        }
    }

    /// Runs `f` with this context installed on the current thread.
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("ExecutionContext").field("keys", &keys).finish()
    }
}

/// Restores the previously installed thread context when dropped.
pub struct ContextGuard {
    previous: Option<ExecutionContext>,
    // Must be dropped on the thread that created it
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            THREAD_CONTEXT.with(|ctx| {
                *ctx.borrow_mut() = previous;
            });
        }
    }
}

/// Shorthand for `ExecutionContext::current().get(key)`.
pub fn get<T>(key: &str) -> Option<Arc<T>>
where
    T: Any + Send + Sync,
{
    ExecutionContext::current().get(key)
}

/// Everything a task needs to observe the same ambient state as its origin.
#[derive(Clone)]
pub struct ContextSnapshot {
    context: ExecutionContext,
    span: Span,
    dispatch: Dispatch,
}

impl ContextSnapshot {
    /// Captures the caller's context, tracing span and tracing dispatcher.
    pub fn capture() -> Self {
        Self {
            context: ExecutionContext::current(),
            span: Span::current(),
            dispatch: crate::logging::current_subscriber(),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Runs `f` with the snapshot installed; the previous thread state is
    /// restored afterwards, even if `f` panics.
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        let Self {
            context,
            span,
            dispatch,
        } = self;
        tracing::dispatcher::with_default(&dispatch, || {
            let _entered = span.enter();
            context.run(f)
        })
    }
}

impl fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSnapshot")
            .field("context", &self.context)
            .field("span", &self.span)
            .finish()
    }
}
