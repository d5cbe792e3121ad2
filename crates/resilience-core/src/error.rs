//! Common error types for resilience patterns.
//!
//! This module provides [`ResilienceError`], a unified error type that eliminates
//! the need for manual `From` trait implementations when composing multiple resilience
//! layers.
//!
//! # The Problem
//!
//! When using multiple resilience layers (bulkhead, circuit breaker, rate limiter, etc.),
//! you typically need to write repetitive `From` trait implementations:
//!
//! ```rust,ignore
//! // Without ResilienceError: boilerplate for every layer
//! impl From<BulkheadError> for ServiceError { /* ... */ }
//! impl From<CircuitBreakerError> for ServiceError { /* ... */ }
//! impl From<RateLimiterError> for ServiceError { /* ... */ }
//! impl From<TimeLimiterError> for ServiceError { /* ... */ }
//! ```
//!
//! # The Solution
//!
//! Use [`ResilienceError<E>`] as your service error type and let every
//! primitive's own error type convert into it with `From`:
//!
//! ```rust
//! use resilience_core::ResilienceError;
//!
//! #[derive(Debug, Clone)]
//! enum AppError {
//!     DatabaseDown,
//!     InvalidRequest,
//! }
//!
//! impl std::fmt::Display for AppError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         match self {
//!             AppError::DatabaseDown => write!(f, "Database down"),
//!             AppError::InvalidRequest => write!(f, "Invalid request"),
//!         }
//!     }
//! }
//!
//! impl std::error::Error for AppError {}
//!
//! type ServiceError = ResilienceError<AppError>;
//! ```
//!
//! # Pattern Matching
//!
//! ```rust
//! use resilience_core::ResilienceError;
//!
//! # #[derive(Debug)]
//! # struct AppError;
//! # impl std::fmt::Display for AppError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { Ok(()) }
//! # }
//! # impl std::error::Error for AppError {}
//! fn handle_error(error: ResilienceError<AppError>) {
//!     match error {
//!         ResilienceError::DeadlineExceeded { layer } => {
//!             eprintln!("Deadline exceeded in {}", layer);
//!         }
//!         ResilienceError::CircuitOpen { name } => {
//!             eprintln!("Circuit breaker {:?} is open", name);
//!         }
//!         ResilienceError::BulkheadFull { concurrent_calls, max_concurrent } => {
//!             eprintln!("Bulkhead full: {}/{}", concurrent_calls, max_concurrent);
//!         }
//!         ResilienceError::BulkheadTimeout { waited, max_wait } => {
//!             eprintln!("Waited {:?} of {:?} for a bulkhead slot", waited, max_wait);
//!         }
//!         ResilienceError::RateLimited { retry_after } => {
//!             eprintln!("Rate limited, retry after {:?}", retry_after);
//!         }
//!         ResilienceError::StorageUnavailable { backend } => {
//!             eprintln!("Storage backend {} unavailable, failing open", backend);
//!         }
//!         ResilienceError::Application(app_err) => {
//!             eprintln!("Application error: {}", app_err);
//!         }
//!     }
//! }
//! ```
//!
//! # Helper Methods
//!
//! ```rust
//! use resilience_core::ResilienceError;
//!
//! # #[derive(Debug)]
//! # struct AppError;
//! # impl std::fmt::Display for AppError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { Ok(()) }
//! # }
//! # impl std::error::Error for AppError {}
//! # let error: ResilienceError<AppError> = ResilienceError::DeadlineExceeded { layer: "test" };
//! if error.is_timeout() {
//!     // Handle timeout/deadline errors from any layer
//! } else if error.is_application() {
//!     let app_error = error.application_error().unwrap();
//!     // Handle application-specific error
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// A common error type that wraps all resilience layer errors.
///
/// This allows composing multiple resilience patterns without writing any
/// error conversion code. Each primitive's own error type converts into the
/// appropriate `ResilienceError` variant via `From`.
///
/// # Type Parameters
///
/// - `E`: The application-specific error type from the wrapped service
#[derive(Debug, Clone)]
pub enum ResilienceError<E> {
    /// A deadline was exceeded (timeout wrapper, or a nested deadline
    /// enforced by retry/bulkhead).
    DeadlineExceeded {
        /// The layer that enforced the deadline (e.g. "time_limiter", "bulkhead").
        layer: &'static str,
    },

    /// Circuit breaker is open, call rejected.
    CircuitOpen {
        /// Circuit breaker name (if configured).
        name: Option<String>,
    },

    /// Bulkhead admission queue is already at capacity; the call was
    /// rejected immediately without waiting.
    BulkheadFull {
        /// Current number of concurrent calls.
        concurrent_calls: usize,
        /// Maximum allowed concurrent calls.
        max_concurrent: usize,
    },

    /// The call was admitted to the bulkhead's wait queue but `wait_timeout`
    /// elapsed before a slot became free.
    BulkheadTimeout {
        /// How long the call actually waited.
        waited: Duration,
        /// The configured maximum wait duration.
        max_wait: Duration,
    },

    /// Rate limiter rejected the call.
    RateLimited {
        /// How long to wait before retrying (if available).
        retry_after: Option<Duration>,
    },

    /// A storage backend (circuit breaker or rate limiter state store) was
    /// unreachable; the caller fell back to the configured fail-open policy.
    StorageUnavailable {
        /// Name of the backend that failed (e.g. "redis", "in-memory").
        backend: &'static str,
    },

    /// A low-priority submission was rejected because the task manager's
    /// load signal was at or above its overload threshold.
    OverloadRejected,

    /// The task manager's admission queue was already at capacity.
    QueueFull {
        /// The configured queue capacity that was reached.
        max_queue_size: usize,
    },

    /// The task manager is draining or has finished shutting down and no
    /// longer accepts submissions.
    ShuttingDown,

    /// The call was cancelled before producing a result.
    Cancelled,

    /// The underlying application service returned an error.
    Application(E),
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResilienceError::DeadlineExceeded { layer } => {
                write!(f, "Deadline exceeded in {}", layer)
            }
            ResilienceError::CircuitOpen { name } => match name {
                Some(n) => write!(f, "Circuit breaker '{}' is open", n),
                None => write!(f, "Circuit breaker is open"),
            },
            ResilienceError::BulkheadFull {
                concurrent_calls,
                max_concurrent,
            } => write!(f, "Bulkhead full ({}/{})", concurrent_calls, max_concurrent),
            ResilienceError::BulkheadTimeout { waited, max_wait } => {
                write!(f, "Bulkhead wait timed out ({:?} of {:?})", waited, max_wait)
            }
            ResilienceError::RateLimited { retry_after } => match retry_after {
                Some(d) => write!(f, "Rate limited, retry after {:?}", d),
                None => write!(f, "Rate limited"),
            },
            ResilienceError::StorageUnavailable { backend } => {
                write!(f, "Storage backend '{}' unavailable", backend)
            }
            ResilienceError::OverloadRejected => {
                write!(f, "Rejected: system overloaded for low-priority submissions")
            }
            ResilienceError::QueueFull { max_queue_size } => {
                write!(f, "Admission queue is full ({} tasks already queued)", max_queue_size)
            }
            ResilienceError::ShuttingDown => write!(f, "Task manager is shutting down"),
            ResilienceError::Cancelled => write!(f, "Call was cancelled"),
            ResilienceError::Application(e) => write!(f, "Application error: {}", e),
        }
    }
}

impl<E> std::error::Error for ResilienceError<E> where E: std::error::Error {}

// From implementations for each primitive's error type live in that
// primitive's own crate, to avoid circular dependencies on this crate.

impl<E> ResilienceError<E> {
    /// Returns `true` if this is a deadline/timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::DeadlineExceeded { .. })
            || matches!(self, ResilienceError::BulkheadTimeout { .. })
    }

    /// Returns `true` if this is a circuit breaker error.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// Returns `true` if this is a bulkhead error (full or timed out).
    pub fn is_bulkhead_full(&self) -> bool {
        matches!(self, ResilienceError::BulkheadFull { .. })
            || matches!(self, ResilienceError::BulkheadTimeout { .. })
    }

    /// Returns `true` if this is a rate limiter error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ResilienceError::RateLimited { .. })
    }

    /// Returns `true` if this is a storage backend availability error.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, ResilienceError::StorageUnavailable { .. })
    }

    /// Returns `true` if this is a task-manager backpressure rejection
    /// (overload or a full admission queue).
    pub fn is_overload(&self) -> bool {
        matches!(
            self,
            ResilienceError::OverloadRejected | ResilienceError::QueueFull { .. }
        )
    }

    /// Returns `true` if this is a shutdown-in-progress error.
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, ResilienceError::ShuttingDown)
    }

    /// Returns `true` if this is a cancellation error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResilienceError::Cancelled)
    }

    /// Returns `true` if this is an application error.
    pub fn is_application(&self) -> bool {
        matches!(self, ResilienceError::Application(_))
    }

    /// Extracts the application error, if this is an `Application` variant.
    pub fn application_error(self) -> Option<E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the application error using a function.
    ///
    /// # Examples
    ///
    /// ```
    /// use resilience_core::ResilienceError;
    ///
    /// let err: ResilienceError<String> = ResilienceError::Application("error".to_string());
    /// let mapped: ResilienceError<usize> = err.map_application(|s| s.len());
    /// assert_eq!(mapped.application_error(), Some(5));
    /// ```
    pub fn map_application<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::DeadlineExceeded { layer } => {
                ResilienceError::DeadlineExceeded { layer }
            }
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::BulkheadFull {
                concurrent_calls,
                max_concurrent,
            } => ResilienceError::BulkheadFull {
                concurrent_calls,
                max_concurrent,
            },
            ResilienceError::BulkheadTimeout { waited, max_wait } => {
                ResilienceError::BulkheadTimeout { waited, max_wait }
            }
            ResilienceError::RateLimited { retry_after } => {
                ResilienceError::RateLimited { retry_after }
            }
            ResilienceError::StorageUnavailable { backend } => {
                ResilienceError::StorageUnavailable { backend }
            }
            ResilienceError::OverloadRejected => ResilienceError::OverloadRejected,
            ResilienceError::QueueFull { max_queue_size } => {
                ResilienceError::QueueFull { max_queue_size }
            }
            ResilienceError::ShuttingDown => ResilienceError::ShuttingDown,
            ResilienceError::Cancelled => ResilienceError::Cancelled,
            ResilienceError::Application(e) => ResilienceError::Application(f(e)),
        }
    }
}
