use resilience_core::events::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by the time limiter as calls complete or exceed their deadline.
#[derive(Debug, Clone)]
pub enum TimeLimiterEvent {
    /// The call completed within the timeout.
    Success {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// The call failed with an error before the timeout elapsed.
    Error {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// The call did not complete before the timeout elapsed.
    Timeout {
        pattern_name: String,
        timestamp: Instant,
        timeout_duration: Duration,
    },
}

impl ResilienceEvent for TimeLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TimeLimiterEvent::Success { .. } => "success",
            TimeLimiterEvent::Error { .. } => "error",
            TimeLimiterEvent::Timeout { .. } => "timeout",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TimeLimiterEvent::Success { timestamp, .. }
            | TimeLimiterEvent::Error { timestamp, .. }
            | TimeLimiterEvent::Timeout { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            TimeLimiterEvent::Success { pattern_name, .. }
            | TimeLimiterEvent::Error { pattern_name, .. }
            | TimeLimiterEvent::Timeout { pattern_name, .. } => pattern_name,
        }
    }
}
