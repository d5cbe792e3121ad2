//! Error types for bulkhead pattern.

/// Errors that can occur when using a bulkhead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BulkheadError {
    /// The bulkhead and its waiter queue were both at capacity; the call was
    /// rejected without waiting at all.
    #[error("bulkhead is full: max concurrent calls ({max_concurrent_calls}) reached and the waiter queue is also full")]
    BulkheadFull {
        /// Maximum concurrent calls allowed.
        max_concurrent_calls: usize,
    },
    /// The call was admitted to the waiter queue but `wait_timeout` elapsed
    /// before a permit became free.
    #[error("timed out after {waited:?} waiting for a bulkhead permit")]
    BulkheadTimeout {
        /// How long the call waited before giving up.
        waited: std::time::Duration,
    },
}

/// Result type for bulkhead operations.
pub type Result<T> = std::result::Result<T, BulkheadError>;

impl<E> From<BulkheadError> for resilience_core::ResilienceError<E> {
    fn from(err: BulkheadError) -> Self {
        match err {
            BulkheadError::BulkheadFull {
                max_concurrent_calls,
            } => resilience_core::ResilienceError::BulkheadFull {
                concurrent_calls: max_concurrent_calls,
                max_concurrent: max_concurrent_calls,
            },
            BulkheadError::BulkheadTimeout { waited } => {
                resilience_core::ResilienceError::BulkheadTimeout {
                    waited,
                    max_wait: waited,
                }
            }
        }
    }
}
