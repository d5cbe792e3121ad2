use thiserror::Error;

/// Errors returned by the `TimeLimiter` service.
#[derive(Debug, Error)]
pub enum TimeLimiterError<E> {
    /// The configured deadline elapsed before the inner service completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> TimeLimiterError<E> {
    /// Returns true if the error indicates the deadline was exceeded.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeLimiterError::DeadlineExceeded)
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            TimeLimiterError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for TimeLimiterError<E> {
    fn from(err: E) -> Self {
        TimeLimiterError::Inner(err)
    }
}

impl<E> From<TimeLimiterError<E>> for resilience_core::ResilienceError<E> {
    fn from(err: TimeLimiterError<E>) -> Self {
        match err {
            TimeLimiterError::DeadlineExceeded => {
                resilience_core::ResilienceError::DeadlineExceeded { layer: "time_limiter" }
            }
            TimeLimiterError::Inner(e) => resilience_core::ResilienceError::Application(e),
        }
    }
}
