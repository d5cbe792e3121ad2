use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;

/// Result of a single admission attempt against a rate limiter storage
/// backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitOutcome {
    /// The call is admitted. `remaining` is the number of further calls
    /// (or tokens) available before the next rejection under the current
    /// state, for observability and `Retry-After`-style headers.
    Allowed { remaining: u64 },
    /// The call is rejected. `retry_after` is the backend's best estimate of
    /// how long the caller should wait before trying again.
    Limited { retry_after: Duration },
}

impl RateLimitOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitOutcome::Allowed { .. })
    }
}

/// Storage contract for rate limiter algorithms.
///
/// Every method must be atomic with respect to other concurrent callers
/// sharing the same `key` — implementations backed by a single process can
/// use a mutex; implementations backed by a remote store must execute the
/// check-and-update as one server-side operation (e.g. a Lua script on
/// Redis) so that concurrent clients observe a single serialization order.
///
/// All time is passed in as `now_millis` (milliseconds since the Unix
/// epoch) rather than read internally, so the same implementation works
/// whether the caller's clock is a local `Instant` translated to wall time
/// or a clock shared across a fleet.
#[async_trait]
pub trait RateLimiterStorage: Send + Sync + std::fmt::Debug {
    /// Attempt to consume `cost` tokens from a continuously-refilling bucket
    /// identified by `key`, with the given `capacity` and `refill_per_sec`.
    async fn try_acquire_token_bucket(
        &self,
        key: &str,
        capacity: u64,
        refill_per_sec: f64,
        cost: u64,
        now_millis: u64,
    ) -> Result<RateLimitOutcome, StorageError>;

    /// Attempt to record one call against a fixed window counter identified
    /// by `key`, with `limit` calls allowed per `window`.
    async fn try_acquire_fixed_window(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_millis: u64,
    ) -> Result<RateLimitOutcome, StorageError>;

    /// Report the fixed window's current remaining count without recording
    /// a call against it. Unlike `try_acquire_fixed_window`, this never
    /// increments the window's counter — it rolls the window over if it has
    /// elapsed (so the peek reflects the window the caller would actually
    /// land in) but otherwise only reads state.
    async fn peek_fixed_window(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_millis: u64,
    ) -> Result<RateLimitOutcome, StorageError>;

    /// Remove all state associated with `key`, as if it had never been used.
    async fn reset(&self, key: &str) -> Result<(), StorageError>;
}
