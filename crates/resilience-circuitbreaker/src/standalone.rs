//! A circuit breaker whose state lives in a shared
//! [`resilience_storage::CircuitBreakerStorage`] instead of process memory.
//!
//! Every [`try_acquire`](DistributedCircuitBreaker::try_acquire)/
//! [`record`](DistributedCircuitBreaker::record) call round-trips to the
//! backend, so this is for when replicas must agree on one circuit (e.g. a
//! fleet of workers all calling the same flaky downstream) rather than for
//! the common single-process case, which should use
//! [`CircuitBreakerLayer`](crate::CircuitBreakerLayer) instead.

use resilience_storage::{
    now_millis, CallOutcome, CircuitBreakerStorage, CircuitSnapshot, CircuitState as StorageState,
    CircuitThresholds, StorageError,
};
use std::sync::Arc;

/// A circuit breaker backed by a shared storage implementation.
#[derive(Clone)]
pub struct DistributedCircuitBreaker {
    storage: Arc<dyn CircuitBreakerStorage>,
    key: String,
    thresholds: CircuitThresholds,
}

impl DistributedCircuitBreaker {
    /// Creates a handle to a distributed circuit identified by `key`.
    pub fn new(
        storage: Arc<dyn CircuitBreakerStorage>,
        key: impl Into<String>,
        thresholds: CircuitThresholds,
    ) -> Self {
        Self {
            storage,
            key: key.into(),
            thresholds,
        }
    }

    /// Returns whether a call should be permitted right now, first trying to
    /// move an `Open` circuit whose recovery timeout has elapsed into
    /// `HalfOpen`, then claiming one of the bounded half-open probe slots.
    ///
    /// In `Closed` this always admits; in `Open` it never does; in
    /// `HalfOpen` at most `half_open_max_calls` callers are admitted
    /// concurrently — the claim is atomic against other racing callers, so
    /// this never lets more than the configured probe count through even
    /// when many callers check at once.
    pub async fn try_acquire(&self) -> Result<bool, StorageError> {
        self.storage
            .try_transition_half_open(&self.key, self.thresholds, now_millis())
            .await?;

        self.storage
            .try_claim_call(&self.key, self.thresholds, now_millis())
            .await
    }

    /// Records the outcome of a permitted call.
    pub async fn record(&self, outcome: CallOutcome) -> Result<CircuitSnapshot, StorageError> {
        self.storage
            .record_result(&self.key, outcome, self.thresholds, now_millis())
            .await
    }

    /// Returns the current snapshot without mutating state.
    pub async fn snapshot(&self) -> Result<CircuitSnapshot, StorageError> {
        self.storage.snapshot(&self.key).await
    }

    /// Forces the circuit into a specific state (operator override).
    pub async fn force_state(&self, state: StorageState) -> Result<(), StorageError> {
        self.storage
            .force_state(&self.key, state, now_millis())
            .await
    }

    /// Runs `op` if the circuit admits the call, recording its outcome;
    /// otherwise (or if `op` fails), runs `fallback` instead.
    ///
    /// The fallback's outcome is never recorded against the circuit: it is
    /// a neutral side-path that neither trips nor heals it — the underlying
    /// call still failed (or was never attempted). A storage round-trip
    /// failure while checking admission fails open: the call is attempted
    /// as if the circuit were closed, per the storage contract's fail-open
    /// default.
    pub async fn execute<T, E, Op, Fut, Fb, FbFut>(&self, op: Op, fallback: Fb) -> Result<T, E>
    where
        Op: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        Fb: FnOnce() -> FbFut,
        FbFut: std::future::Future<Output = Result<T, E>>,
    {
        let admitted = self.try_acquire().await.unwrap_or(true);
        if !admitted {
            return fallback().await;
        }

        match op().await {
            Ok(value) => {
                let _ = self.record(CallOutcome::Success).await;
                Ok(value)
            }
            Err(_) => {
                let _ = self.record(CallOutcome::Failure).await;
                fallback().await
            }
        }
    }
}
