//! Ambient task context: priority and a propagated key/value bag.
//!
//! The task manager establishes a [`TaskContext`] when it admits a task and
//! makes it available to the running future and anything it calls via
//! [`current`]. Nested calls inherit the parent's context and may extend it
//! with additional values, but cannot mutate values the parent already set —
//! the same shape as Python's `contextvars`, built here on
//! [`tokio::task_local!`], which is suspension-safe: the value is restored on
//! every resumption of the task, so it survives `.await` points without extra
//! bookkeeping.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Priority of a task admitted to the task manager's queue.
///
/// Ordered so that `CRITICAL > HIGH > NORMAL > LOW`; the derived [`Ord`]
/// implementation is used directly by the priority queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Immutable, cheaply-cloneable context propagated alongside a task.
///
/// Values set by a parent are visible to children; a child may add new keys
/// via [`TaskContext::extended`] but that produces a new context rather than
/// mutating the one the parent holds, so concurrent children never observe
/// each other's additions.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    priority: TaskPriority,
    values: Arc<HashMap<String, String>>,
    deadline: Option<Instant>,
}

impl TaskContext {
    /// Creates a root context with the given priority and no values.
    pub fn new(priority: TaskPriority) -> Self {
        Self {
            priority,
            values: Arc::new(HashMap::new()),
            deadline: None,
        }
    }

    /// Priority this context was admitted with.
    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Looks up a propagated value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns a new context with an additional key/value, inheriting
    /// everything already present. Existing keys are shadowed for the
    /// child's own view but the parent's map is left untouched.
    pub fn extended(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Self {
            priority: self.priority,
            values: Arc::new(values),
            deadline: self.deadline,
        }
    }

    /// The ambient deadline, if one has been established by an enclosing
    /// [`resilience_timelimiter`](../../resilience_timelimiter/index.html) or
    /// task-manager scope.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns a context with `deadline` applied, tightened against whatever
    /// deadline was already ambient (nested deadlines take the minimum, per
    /// the timeout composition rule).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let tightened = match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        Self {
            priority: self.priority,
            values: Arc::clone(&self.values),
            deadline: Some(tightened),
        }
    }
}

tokio::task_local! {
    static CURRENT: TaskContext;
}

/// Runs `fut` with `ctx` installed as the ambient context, visible to `fut`
/// and anything it calls through [`current`].
pub async fn scope<F>(ctx: TaskContext, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(ctx, fut).await
}

/// Returns the ambient context of the task currently executing, or a default
/// (`Normal` priority, empty) context if none was established.
pub fn current() -> TaskContext {
    CURRENT
        .try_with(|ctx| ctx.clone())
        .unwrap_or_else(|_| TaskContext::new(TaskPriority::Normal))
}
