use thiserror::Error;

/// Error returned by a [`crate::RateLimiterStorage`] or
/// [`crate::CircuitBreakerStorage`] implementation.
///
/// Every primitive that depends on a storage backend is expected to treat
/// this as a fail-open signal: log/emit a [`resilience_core::ResilienceError::StorageUnavailable`]
/// event and let the call through rather than reject it, since a storage
/// outage is an availability problem of the resilience layer itself, not of
/// the protected operation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached (connection refused, pool exhausted,
    /// network timeout).
    #[error("storage backend '{backend}' unavailable: {message}")]
    Unavailable {
        backend: &'static str,
        message: String,
    },

    /// The backend responded but the response could not be interpreted
    /// (unexpected type, corrupt script output).
    #[error("storage backend '{backend}' returned an invalid response: {message}")]
    Protocol {
        backend: &'static str,
        message: String,
    },
}

impl StorageError {
    pub fn backend(&self) -> &'static str {
        match self {
            StorageError::Unavailable { backend, .. } => backend,
            StorageError::Protocol { backend, .. } => backend,
        }
    }
}
