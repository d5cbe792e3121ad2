//! Error types for the task manager.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`crate::TaskManager`] operations.
#[derive(Debug, Error)]
pub enum TaskManagerError<E> {
    /// The load signal was at or above `low_priority_rejection_threshold`
    /// and the task was submitted at [`resilience_core::context::TaskPriority::Low`].
    #[error("task rejected: system overloaded for low-priority submissions")]
    OverloadRejected,

    /// The admission queue was already at `max_queue_size`.
    #[error("admission queue is full ({max_queue_size} tasks already queued)")]
    QueueFull {
        /// The configured queue capacity that was reached.
        max_queue_size: usize,
    },

    /// The manager is draining or has completed [`crate::TaskManager::shutdown`]
    /// and no longer accepts submissions.
    #[error("task manager is shutting down")]
    ShuttingDown,

    /// The task's deadline elapsed before it completed.
    #[error("task exceeded its deadline after {elapsed:?}")]
    DeadlineExceeded {
        /// How long the task ran before its deadline elapsed.
        elapsed: Duration,
    },

    /// The task was cancelled before producing a result, e.g. its dispatcher
    /// task panicked or the manager was force-shut-down while it was queued.
    #[error("task was cancelled")]
    Cancelled,

    /// The wrapped operation returned an error.
    #[error("operation error: {0}")]
    Operation(E),
}

impl<E> TaskManagerError<E> {
    /// Returns `true` if the task was rejected due to overload (either the
    /// low-priority overload rule or a full admission queue).
    pub fn is_overload(&self) -> bool {
        matches!(self, Self::OverloadRejected | Self::QueueFull { .. })
    }

    /// Returns `true` if the manager was shutting down.
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }

    /// Returns `true` if this is a deadline/timeout error.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }

    /// Extracts the wrapped operation error, if this is an `Operation` variant.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for TaskManagerError<E> {
    fn from(err: E) -> Self {
        TaskManagerError::Operation(err)
    }
}

impl<E> From<TaskManagerError<E>> for resilience_core::ResilienceError<E> {
    fn from(err: TaskManagerError<E>) -> Self {
        match err {
            TaskManagerError::OverloadRejected => resilience_core::ResilienceError::OverloadRejected,
            TaskManagerError::QueueFull { max_queue_size } => {
                resilience_core::ResilienceError::QueueFull { max_queue_size }
            }
            TaskManagerError::ShuttingDown => resilience_core::ResilienceError::ShuttingDown,
            TaskManagerError::DeadlineExceeded { .. } => {
                resilience_core::ResilienceError::DeadlineExceeded { layer: "task_manager" }
            }
            TaskManagerError::Cancelled => resilience_core::ResilienceError::Cancelled,
            TaskManagerError::Operation(e) => resilience_core::ResilienceError::Application(e),
        }
    }
}
