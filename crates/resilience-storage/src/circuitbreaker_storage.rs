use async_trait::async_trait;

use crate::error::StorageError;

/// Circuit state as seen through the storage contract. Mirrors the state
/// machine each circuit breaker instance drives, but is stored here so a
/// distributed backend can hold it on behalf of many processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Outcome of a single call, as reported to the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

/// Threshold parameters the storage backend needs in order to decide state
/// transitions on its own, without calling back into the circuit breaker
/// instance. Passed on every `record_result` call since a distributed
/// backend has no other way to learn them (they travel as script
/// arguments); kept `Copy` so passing them is free.
///
/// The window tracked is count-based (the last `window_size` outcomes),
/// matching the simplest sliding-window variant every backend (in-memory or
/// remote) can evaluate atomically; time-based windowing is left to the
/// in-memory circuit breaker's own implementation, which does not need to
/// go through this contract to do it efficiently.
#[derive(Debug, Clone, Copy)]
pub struct CircuitThresholds {
    /// Fraction of calls in the window that must fail to trip the circuit.
    pub failure_rate_threshold: f64,
    /// Minimum number of calls in the window before the rate is evaluated.
    pub minimum_calls: u64,
    /// Number of most recent calls tracked per key.
    pub window_size: u64,
    /// How long the circuit stays `Open` before a trial call is allowed.
    pub recovery_timeout_millis: u64,
    /// Consecutive successful trial calls required to close from `HalfOpen`.
    pub half_open_max_calls: u64,
}

/// A point-in-time view of a circuit's counters, as returned after recording
/// a result or taking a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
    /// Epoch millis the circuit last transitioned into `Open`, if it is
    /// currently open or half-open.
    pub opened_at_millis: Option<u64>,
}

/// Storage contract for circuit breaker state.
///
/// As with [`crate::RateLimiterStorage`], every method must be atomic with
/// respect to other callers sharing the same `key`.
#[async_trait]
pub trait CircuitBreakerStorage: Send + Sync + std::fmt::Debug {
    /// Record a call result and return the resulting snapshot, applying the
    /// count-based sliding-window threshold transition described by
    /// `thresholds`.
    async fn record_result(
        &self,
        key: &str,
        outcome: CallOutcome,
        thresholds: CircuitThresholds,
        now_millis: u64,
    ) -> Result<CircuitSnapshot, StorageError>;

    /// Attempt to transition an `Open` circuit whose `recovery_timeout_millis`
    /// has elapsed into `HalfOpen`. Returns `true` if this call performed the
    /// transition (i.e. this caller won the race to issue the trial call).
    async fn try_transition_half_open(
        &self,
        key: &str,
        thresholds: CircuitThresholds,
        now_millis: u64,
    ) -> Result<bool, StorageError>;

    /// Atomically decide whether this caller may proceed. Returns `true`
    /// when `Closed`. When `HalfOpen`, claims one of the bounded
    /// `half_open_max_calls` probe slots and returns `true` only if a slot
    /// was free — admitting at most `half_open_max_calls` concurrently
    /// in-flight probes regardless of how many callers race this check, per
    /// the single-probe intent of a half-open circuit. Returns `false` when
    /// `Open`, or when `HalfOpen` with no free slot. A claimed slot is
    /// released when the caller's outcome is reported via `record_result`.
    async fn try_claim_call(
        &self,
        key: &str,
        thresholds: CircuitThresholds,
        now_millis: u64,
    ) -> Result<bool, StorageError>;

    /// Force the circuit into a specific state, bypassing normal transition
    /// rules (used by `force_open`/`force_closed`/`reset`).
    async fn force_state(
        &self,
        key: &str,
        state: CircuitState,
        now_millis: u64,
    ) -> Result<(), StorageError>;

    /// Read the current snapshot without recording a result.
    async fn snapshot(&self, key: &str) -> Result<CircuitSnapshot, StorageError>;
}
