use crate::CircuitState;
use resilience_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by the circuit breaker as calls are permitted, rejected,
/// and as the circuit transitions between states.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit transitioned from one state to another.
    StateTransition {
        pattern_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was permitted to reach the inner service.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected because the circuit is open.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A call completed successfully and was recorded in the window.
    SuccessRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call failed and was recorded in the window.
    FailureRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call exceeded `slow_call_duration_threshold`.
    SlowCallDetected {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
        state: CircuitState,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::SlowCallDetected { .. } => "slow_call_detected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::CallPermitted { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::CallRejected { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::SuccessRecorded { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
            CircuitBreakerEvent::SlowCallDetected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { pattern_name, .. } => pattern_name,
            CircuitBreakerEvent::CallPermitted { pattern_name, .. } => pattern_name,
            CircuitBreakerEvent::CallRejected { pattern_name, .. } => pattern_name,
            CircuitBreakerEvent::SuccessRecorded { pattern_name, .. } => pattern_name,
            CircuitBreakerEvent::FailureRecorded { pattern_name, .. } => pattern_name,
            CircuitBreakerEvent::SlowCallDetected { pattern_name, .. } => pattern_name,
        }
    }
}
