//! Direct, non-Tower rate limiter handles backed by a pluggable
//! [`resilience_storage::RateLimiterStorage`].
//!
//! The [`RateLimiterLayer`](crate::RateLimiterLayer) above is local-only and
//! suits a single process. [`TokenBucket`] and [`FixedWindowLimiter`] instead
//! delegate the actual accounting to a storage backend, so the same limit can
//! be shared across every replica of a service by pointing them at the same
//! Redis instance.

use resilience_storage::{now_millis, RateLimitOutcome, RateLimiterStorage, StorageError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A point-in-time view of a rate limiter's remaining capacity, per
/// spec.md §6's `capacity() -> {limit, remaining, reset_at}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterCapacity {
    /// The configured limit (bucket capacity, or calls per window).
    pub limit: u64,
    /// Calls/tokens available right now without being denied.
    pub remaining: u64,
    /// When the limiter fully resets (bucket refills to `limit`, or the
    /// window rolls over), if the backend can report it.
    pub reset_at: Option<std::time::Duration>,
}

/// Caps how long `execute(.., wait: true)` will sleep across retries
/// before giving up, regardless of what `retry_after` asks for.
const MAX_WAIT: Duration = Duration::from_secs(30);

/// Error from [`TokenBucket::execute`]/[`FixedWindowLimiter::execute`]:
/// either the limiter denied the call, or `op` itself failed unchanged.
#[derive(Debug, Clone)]
pub enum RateLimiterExecuteError<E> {
    /// The limiter denied the call (immediately with `wait: false`, or
    /// after the capped wait elapsed with `wait: true`).
    RateLimited {
        /// Best-effort estimate of how long to wait before retrying.
        retry_after: Option<Duration>,
    },
    /// `op` ran and returned its own error, unchanged.
    Operation(E),
}

impl<E: std::fmt::Display> std::fmt::Display for RateLimiterExecuteError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateLimiterExecuteError::RateLimited { retry_after } => match retry_after {
                Some(d) => write!(f, "rate limited, retry after {:?}", d),
                None => write!(f, "rate limited"),
            },
            RateLimiterExecuteError::Operation(e) => write!(f, "operation error: {}", e),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RateLimiterExecuteError<E> {}

impl<E> From<RateLimiterExecuteError<E>> for resilience_core::ResilienceError<E> {
    fn from(err: RateLimiterExecuteError<E>) -> Self {
        match err {
            RateLimiterExecuteError::RateLimited { retry_after } => {
                resilience_core::ResilienceError::RateLimited { retry_after }
            }
            RateLimiterExecuteError::Operation(e) => resilience_core::ResilienceError::Application(e),
        }
    }
}

/// A continuously-refilling token bucket, shared across callers of the
/// same storage backend.
#[derive(Clone)]
pub struct TokenBucket {
    storage: Arc<dyn RateLimiterStorage>,
    key: String,
    capacity: u64,
    refill_per_sec: f64,
}

impl TokenBucket {
    /// Creates a handle to a token bucket identified by `key`.
    ///
    /// `capacity` tokens are available up front and refill at
    /// `refill_per_sec` tokens per second, capped at `capacity`.
    pub fn new(
        storage: Arc<dyn RateLimiterStorage>,
        key: impl Into<String>,
        capacity: u64,
        refill_per_sec: f64,
    ) -> Self {
        Self {
            storage,
            key: key.into(),
            capacity,
            refill_per_sec,
        }
    }

    /// Attempts to withdraw `cost` tokens, returning the remaining balance
    /// or the duration to wait before retrying.
    pub async fn try_acquire(&self, cost: u64) -> Result<RateLimitOutcome, StorageError> {
        self.storage
            .try_acquire_token_bucket(
                &self.key,
                self.capacity,
                self.refill_per_sec,
                cost,
                now_millis(),
            )
            .await
    }

    /// Resets the bucket to full capacity.
    pub async fn reset(&self) -> Result<(), StorageError> {
        self.storage.reset(&self.key).await
    }

    /// Attempts to withdraw a single token. Storage failures fail open: the
    /// call is reported as granted rather than surfacing as an error, per
    /// spec.md §4.2's "fail-open...to avoid turning the limiter into an
    /// outage amplifier" default.
    pub async fn try_acquire_one(&self) -> RateLimitOutcome {
        self.try_acquire(1)
            .await
            .unwrap_or(RateLimitOutcome::Allowed {
                remaining: self.capacity,
            })
    }

    /// Runs `op` if a token is available. If not and `wait` is `false`,
    /// fails immediately with [`RateLimiterExecuteError::RateLimited`]. If
    /// `wait` is `true`, sleeps for the denial's `retry_after` (capped at
    /// 30s total across retries) and retries once the sleep elapses,
    /// observing cancellation during the sleep.
    pub async fn execute<T, E, Op, Fut>(&self, op: Op, wait: bool) -> Result<T, RateLimiterExecuteError<E>>
    where
        Op: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut waited = Duration::ZERO;
        loop {
            match self.try_acquire_one().await {
                RateLimitOutcome::Allowed { .. } => {
                    return op().await.map_err(RateLimiterExecuteError::Operation);
                }
                RateLimitOutcome::Limited { retry_after } => {
                    if !wait || waited + retry_after > MAX_WAIT {
                        return Err(RateLimiterExecuteError::RateLimited {
                            retry_after: Some(retry_after),
                        });
                    }
                    tokio::time::sleep(retry_after).await;
                    waited += retry_after;
                }
            }
        }
    }

    /// Reports the bucket's configured capacity, current remaining tokens,
    /// and (if the backend can compute it) when it next fully refills.
    /// The peek is implemented as a zero-cost acquire, which refreshes the
    /// refill timestamp but withdraws nothing.
    pub async fn capacity(&self) -> Result<RateLimiterCapacity, StorageError> {
        let outcome = self
            .storage
            .try_acquire_token_bucket(&self.key, self.capacity, self.refill_per_sec, 0, now_millis())
            .await?;
        let remaining = match outcome {
            RateLimitOutcome::Allowed { remaining } => remaining,
            RateLimitOutcome::Limited { .. } => 0,
        };
        let deficit = self.capacity.saturating_sub(remaining);
        let reset_at = if self.refill_per_sec > 0.0 {
            Some(Duration::from_secs_f64(deficit as f64 / self.refill_per_sec))
        } else {
            None
        };
        Ok(RateLimiterCapacity {
            limit: self.capacity,
            remaining,
            reset_at,
        })
    }
}

/// A fixed window limiter, shared across callers of the same storage backend.
#[derive(Clone)]
pub struct FixedWindowLimiter {
    storage: Arc<dyn RateLimiterStorage>,
    key: String,
    limit: u64,
    window: Duration,
}

impl FixedWindowLimiter {
    /// Creates a handle to a fixed window limiter identified by `key`,
    /// allowing `limit` calls per `window`.
    pub fn new(
        storage: Arc<dyn RateLimiterStorage>,
        key: impl Into<String>,
        limit: u64,
        window: Duration,
    ) -> Self {
        Self {
            storage,
            key: key.into(),
            limit,
            window,
        }
    }

    /// Attempts to record one call against the window.
    pub async fn try_acquire(&self) -> Result<RateLimitOutcome, StorageError> {
        self.storage
            .try_acquire_fixed_window(&self.key, self.limit, self.window, now_millis())
            .await
    }

    /// Resets the window.
    pub async fn reset(&self) -> Result<(), StorageError> {
        self.storage.reset(&self.key).await
    }

    /// Attempts to record one call, failing open (reporting allowed) if the
    /// storage round-trip itself errors.
    pub async fn try_acquire_one(&self) -> RateLimitOutcome {
        self.try_acquire()
            .await
            .unwrap_or(RateLimitOutcome::Allowed {
                remaining: self.limit,
            })
    }

    /// Runs `op` if the window admits another call. Same wait/deny contract
    /// as [`TokenBucket::execute`].
    pub async fn execute<T, E, Op, Fut>(&self, op: Op, wait: bool) -> Result<T, RateLimiterExecuteError<E>>
    where
        Op: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut waited = Duration::ZERO;
        loop {
            match self.try_acquire_one().await {
                RateLimitOutcome::Allowed { .. } => {
                    return op().await.map_err(RateLimiterExecuteError::Operation);
                }
                RateLimitOutcome::Limited { retry_after } => {
                    if !wait || waited + retry_after > MAX_WAIT {
                        return Err(RateLimiterExecuteError::RateLimited {
                            retry_after: Some(retry_after),
                        });
                    }
                    tokio::time::sleep(retry_after).await;
                    waited += retry_after;
                }
            }
        }
    }

    /// Reports the window's configured limit, remaining calls, and when the
    /// window resets, via a zero-cost peek that does not count against the
    /// window.
    pub async fn capacity(&self) -> Result<RateLimiterCapacity, StorageError> {
        let outcome = self
            .storage
            .peek_fixed_window(&self.key, self.limit, self.window, now_millis())
            .await?;
        let remaining = match outcome {
            RateLimitOutcome::Allowed { remaining } => remaining,
            RateLimitOutcome::Limited { .. } => 0,
        };
        Ok(RateLimiterCapacity {
            limit: self.limit,
            remaining,
            reset_at: Some(self.window),
        })
    }
}
