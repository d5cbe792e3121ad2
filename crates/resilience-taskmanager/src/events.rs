//! Events emitted by the task manager as tasks are admitted, queued,
//! dispatched, and completed.

use resilience_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted over the lifetime of a managed task.
#[derive(Debug, Clone)]
pub enum TaskManagerEvent {
    /// A task was admitted and started running immediately (a permit was
    /// free, or the task went through `run_with_semaphore`).
    TaskAdmitted {
        pattern_name: String,
        timestamp: Instant,
        in_flight: usize,
    },
    /// A priority-queued task was placed in the admission queue.
    TaskQueued {
        pattern_name: String,
        timestamp: Instant,
        queue_depth: usize,
    },
    /// A task was rejected before running.
    TaskRejected {
        pattern_name: String,
        timestamp: Instant,
        reason: &'static str,
    },
    /// A task completed, successfully or not.
    TaskCompleted {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
        failed: bool,
    },
    /// A task's deadline elapsed before it completed.
    TaskTimedOut {
        pattern_name: String,
        timestamp: Instant,
        elapsed: Duration,
    },
    /// The adaptive controller changed the concurrency limit.
    ConcurrencyLimitChanged {
        pattern_name: String,
        timestamp: Instant,
        old_limit: usize,
        new_limit: usize,
    },
    /// [`crate::TaskManager::shutdown`] was invoked.
    ShutdownStarted {
        pattern_name: String,
        timestamp: Instant,
    },
    /// Shutdown finished draining (or force-cancelling) all tasks.
    ShutdownCompleted {
        pattern_name: String,
        timestamp: Instant,
        cancelled: usize,
    },
}

impl ResilienceEvent for TaskManagerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TaskManagerEvent::TaskAdmitted { .. } => "task_admitted",
            TaskManagerEvent::TaskQueued { .. } => "task_queued",
            TaskManagerEvent::TaskRejected { .. } => "task_rejected",
            TaskManagerEvent::TaskCompleted { .. } => "task_completed",
            TaskManagerEvent::TaskTimedOut { .. } => "task_timed_out",
            TaskManagerEvent::ConcurrencyLimitChanged { .. } => "concurrency_limit_changed",
            TaskManagerEvent::ShutdownStarted { .. } => "shutdown_started",
            TaskManagerEvent::ShutdownCompleted { .. } => "shutdown_completed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TaskManagerEvent::TaskAdmitted { timestamp, .. }
            | TaskManagerEvent::TaskQueued { timestamp, .. }
            | TaskManagerEvent::TaskRejected { timestamp, .. }
            | TaskManagerEvent::TaskCompleted { timestamp, .. }
            | TaskManagerEvent::TaskTimedOut { timestamp, .. }
            | TaskManagerEvent::ConcurrencyLimitChanged { timestamp, .. }
            | TaskManagerEvent::ShutdownStarted { timestamp, .. }
            | TaskManagerEvent::ShutdownCompleted { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            TaskManagerEvent::TaskAdmitted { pattern_name, .. }
            | TaskManagerEvent::TaskQueued { pattern_name, .. }
            | TaskManagerEvent::TaskRejected { pattern_name, .. }
            | TaskManagerEvent::TaskCompleted { pattern_name, .. }
            | TaskManagerEvent::TaskTimedOut { pattern_name, .. }
            | TaskManagerEvent::ConcurrencyLimitChanged { pattern_name, .. }
            | TaskManagerEvent::ShutdownStarted { pattern_name, .. }
            | TaskManagerEvent::ShutdownCompleted { pattern_name, .. } => pattern_name,
        }
    }
}
