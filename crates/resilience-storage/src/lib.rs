//! Pluggable storage contract for rate limiters and circuit breakers.
//!
//! [`RateLimiterStorage`] and [`CircuitBreakerStorage`] are the seams each
//! primitive is generic over. [`memory::InMemoryStorage`] implements both
//! for single-process use and is the default everywhere; the `redis`
//! feature adds [`redis_backend::RedisStorage`] for sharing state across a
//! fleet.

mod circuitbreaker_storage;
mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis_backend;
mod ratelimiter_storage;

pub use circuitbreaker_storage::{
    CallOutcome, CircuitBreakerStorage, CircuitSnapshot, CircuitState, CircuitThresholds,
};
pub use error::StorageError;
pub use memory::InMemoryStorage;
pub use ratelimiter_storage::{RateLimitOutcome, RateLimiterStorage};

#[cfg(feature = "redis")]
pub use redis_backend::RedisStorage;

/// Milliseconds since the Unix epoch, as every storage method expects.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
