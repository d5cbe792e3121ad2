use resilience_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted as calls pass through, queue behind, or are rejected by a
/// bulkhead.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call was permitted to reach the inner service immediately or after
    /// waiting in the queue.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        concurrent_calls: usize,
    },
    /// A call was enqueued because the bulkhead was at capacity but the
    /// waiter queue had room.
    CallQueued {
        pattern_name: String,
        timestamp: Instant,
        queued_calls: usize,
    },
    /// A call was rejected immediately: the bulkhead and its waiter queue
    /// were both at capacity.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        max_concurrent_calls: usize,
    },
    /// A queued call gave up because `wait_timeout` elapsed before a permit
    /// became free.
    CallTimedOutWaiting {
        pattern_name: String,
        timestamp: Instant,
        wait_timeout: Duration,
    },
    /// A call finished successfully and released its permit.
    CallFinished {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// A call failed and released its permit.
    CallFailed {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallQueued { .. } => "call_queued",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallTimedOutWaiting { .. } => "call_timed_out_waiting",
            BulkheadEvent::CallFinished { .. } => "call_finished",
            BulkheadEvent::CallFailed { .. } => "call_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. } => *timestamp,
            BulkheadEvent::CallQueued { timestamp, .. } => *timestamp,
            BulkheadEvent::CallRejected { timestamp, .. } => *timestamp,
            BulkheadEvent::CallTimedOutWaiting { timestamp, .. } => *timestamp,
            BulkheadEvent::CallFinished { timestamp, .. } => *timestamp,
            BulkheadEvent::CallFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { pattern_name, .. } => pattern_name,
            BulkheadEvent::CallQueued { pattern_name, .. } => pattern_name,
            BulkheadEvent::CallRejected { pattern_name, .. } => pattern_name,
            BulkheadEvent::CallTimedOutWaiting { pattern_name, .. } => pattern_name,
            BulkheadEvent::CallFinished { pattern_name, .. } => pattern_name,
            BulkheadEvent::CallFailed { pattern_name, .. } => pattern_name,
        }
    }
}
