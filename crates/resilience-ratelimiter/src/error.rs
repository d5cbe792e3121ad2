use std::fmt;
use std::time::Duration;

use resilience_core::ResilienceError;

/// Errors that can occur when using the rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterError {
    /// The rate limit was exceeded and no permit could be acquired within
    /// the configured wait timeout.
    RateLimitExceeded {
        /// Best-effort estimate of how long to wait before retrying.
        retry_after: Option<Duration>,
    },
    /// The underlying storage backend (distributed mode only) was
    /// unreachable; the caller's fail-open policy decided whether this was
    /// surfaced as an error or treated as an implicit allow.
    StorageUnavailable { backend: &'static str },
}

impl fmt::Display for RateLimiterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimiterError::RateLimitExceeded { retry_after } => match retry_after {
                Some(d) => write!(f, "rate limit exceeded, retry after {:?}", d),
                None => write!(f, "rate limit exceeded"),
            },
            RateLimiterError::StorageUnavailable { backend } => {
                write!(f, "rate limiter storage backend '{}' unavailable", backend)
            }
        }
    }
}

impl std::error::Error for RateLimiterError {}

impl<E> From<RateLimiterError> for ResilienceError<E> {
    fn from(err: RateLimiterError) -> Self {
        match err {
            RateLimiterError::RateLimitExceeded { retry_after } => {
                ResilienceError::RateLimited { retry_after }
            }
            RateLimiterError::StorageUnavailable { backend } => {
                ResilienceError::StorageUnavailable { backend }
            }
        }
    }
}
