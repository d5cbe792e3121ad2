//! Process-local storage backend.
//!
//! Both traits are backed by a single `tokio::sync::Mutex`-guarded map. Idle
//! entries are not swept by a background task; instead each access checks
//! whether the entry's last-touched time makes it eligible for eviction and
//! drops it inline, avoiding an extra spawned task for housekeeping.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::circuitbreaker_storage::{
    CallOutcome, CircuitBreakerStorage, CircuitSnapshot, CircuitState, CircuitThresholds,
};
use crate::error::StorageError;
use crate::ratelimiter_storage::{RateLimitOutcome, RateLimiterStorage};

/// How long an entry may go untouched before it is evicted on next access.
const IDLE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy)]
struct TokenBucketEntry {
    tokens: f64,
    last_refill_millis: u64,
    last_touched_millis: u64,
}

#[derive(Debug, Clone, Copy)]
struct FixedWindowEntry {
    window_start_millis: u64,
    count: u64,
    last_touched_millis: u64,
}

#[derive(Debug, Clone)]
struct CircuitEntry {
    state: CircuitState,
    outcomes: VecDeque<bool>,
    opened_at_millis: Option<u64>,
    half_open_successes: u64,
    /// Probe slots currently claimed by admitted `HalfOpen` callers that
    /// have not yet reported an outcome. Bounds concurrent admission at
    /// `half_open_max_calls`, separately from `half_open_successes` (which
    /// only counts toward closing).
    half_open_in_flight: u64,
    last_touched_millis: u64,
}

impl CircuitEntry {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            outcomes: VecDeque::new(),
            opened_at_millis: None,
            half_open_successes: 0,
            half_open_in_flight: 0,
            last_touched_millis: 0,
        }
    }

    fn snapshot(&self) -> CircuitSnapshot {
        let failure_count = self.outcomes.iter().filter(|ok| !**ok).count() as u64;
        let success_count = self.outcomes.iter().filter(|ok| **ok).count() as u64;
        CircuitSnapshot {
            state: self.state,
            failure_count,
            success_count,
            opened_at_millis: self.opened_at_millis,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    token_buckets: HashMap<String, TokenBucketEntry>,
    fixed_windows: HashMap<String, FixedWindowEntry>,
    circuits: HashMap<String, CircuitEntry>,
}

/// In-memory implementation of both storage contracts, suitable for a
/// single process.
#[derive(Debug)]
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    fn evict_if_idle(last_touched_millis: u64, now_millis: u64) -> bool {
        now_millis.saturating_sub(last_touched_millis) > IDLE_TTL.as_millis() as u64
    }
}

#[async_trait]
impl RateLimiterStorage for InMemoryStorage {
    async fn try_acquire_token_bucket(
        &self,
        key: &str,
        capacity: u64,
        refill_per_sec: f64,
        cost: u64,
        now_millis: u64,
    ) -> Result<RateLimitOutcome, StorageError> {
        let mut tables = self.tables.lock().await;

        let entry = tables
            .token_buckets
            .entry(key.to_string())
            .and_modify(|e| {
                if Self::evict_if_idle(e.last_touched_millis, now_millis) {
                    e.tokens = capacity as f64;
                    e.last_refill_millis = now_millis;
                }
            })
            .or_insert(TokenBucketEntry {
                tokens: capacity as f64,
                last_refill_millis: now_millis,
                last_touched_millis: now_millis,
            });

        let elapsed_secs =
            now_millis.saturating_sub(entry.last_refill_millis) as f64 / 1000.0;
        entry.tokens = (entry.tokens + elapsed_secs * refill_per_sec).min(capacity as f64);
        entry.last_refill_millis = now_millis;
        entry.last_touched_millis = now_millis;

        if entry.tokens >= cost as f64 {
            entry.tokens -= cost as f64;
            Ok(RateLimitOutcome::Allowed {
                remaining: entry.tokens as u64,
            })
        } else {
            let deficit = cost as f64 - entry.tokens;
            let wait_secs = if refill_per_sec > 0.0 {
                deficit / refill_per_sec
            } else {
                f64::MAX
            };
            Ok(RateLimitOutcome::Limited {
                retry_after: Duration::from_secs_f64(wait_secs.max(0.0)),
            })
        }
    }

    async fn try_acquire_fixed_window(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_millis: u64,
    ) -> Result<RateLimitOutcome, StorageError> {
        let mut tables = self.tables.lock().await;
        let window_millis = window.as_millis() as u64;

        let entry = tables
            .fixed_windows
            .entry(key.to_string())
            .or_insert(FixedWindowEntry {
                window_start_millis: now_millis,
                count: 0,
                last_touched_millis: now_millis,
            });

        if now_millis.saturating_sub(entry.window_start_millis) >= window_millis {
            entry.window_start_millis = now_millis;
            entry.count = 0;
        }
        entry.last_touched_millis = now_millis;

        if entry.count < limit {
            entry.count += 1;
            Ok(RateLimitOutcome::Allowed {
                remaining: limit - entry.count,
            })
        } else {
            let reset_at = entry.window_start_millis + window_millis;
            let retry_after = Duration::from_millis(reset_at.saturating_sub(now_millis));
            Ok(RateLimitOutcome::Limited { retry_after })
        }
    }

    async fn peek_fixed_window(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_millis: u64,
    ) -> Result<RateLimitOutcome, StorageError> {
        let mut tables = self.tables.lock().await;
        let window_millis = window.as_millis() as u64;

        let entry = tables
            .fixed_windows
            .entry(key.to_string())
            .or_insert(FixedWindowEntry {
                window_start_millis: now_millis,
                count: 0,
                last_touched_millis: now_millis,
            });

        if now_millis.saturating_sub(entry.window_start_millis) >= window_millis {
            entry.window_start_millis = now_millis;
            entry.count = 0;
        }

        if entry.count < limit {
            Ok(RateLimitOutcome::Allowed {
                remaining: limit - entry.count,
            })
        } else {
            let reset_at = entry.window_start_millis + window_millis;
            let retry_after = Duration::from_millis(reset_at.saturating_sub(now_millis));
            Ok(RateLimitOutcome::Limited { retry_after })
        }
    }

    async fn reset(&self, key: &str) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().await;
        tables.token_buckets.remove(key);
        tables.fixed_windows.remove(key);
        Ok(())
    }
}

#[async_trait]
impl CircuitBreakerStorage for InMemoryStorage {
    async fn record_result(
        &self,
        key: &str,
        outcome: CallOutcome,
        thresholds: CircuitThresholds,
        now_millis: u64,
    ) -> Result<CircuitSnapshot, StorageError> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .circuits
            .entry(key.to_string())
            .or_insert_with(CircuitEntry::new);
        entry.last_touched_millis = now_millis;

        match entry.state {
            CircuitState::Closed => {
                entry.outcomes.push_back(outcome == CallOutcome::Success);
                while entry.outcomes.len() as u64 > thresholds.window_size {
                    entry.outcomes.pop_front();
                }
                if entry.outcomes.len() as u64 >= thresholds.minimum_calls {
                    let failures = entry.outcomes.iter().filter(|ok| !**ok).count() as f64;
                    let rate = failures / entry.outcomes.len() as f64;
                    if rate >= thresholds.failure_rate_threshold {
                        entry.state = CircuitState::Open;
                        entry.opened_at_millis = Some(now_millis);
                    }
                }
            }
            CircuitState::HalfOpen => {
                entry.half_open_in_flight = entry.half_open_in_flight.saturating_sub(1);
                match outcome {
                    CallOutcome::Failure => {
                        entry.state = CircuitState::Open;
                        entry.opened_at_millis = Some(now_millis);
                        entry.half_open_successes = 0;
                        entry.half_open_in_flight = 0;
                    }
                    CallOutcome::Success => {
                        entry.half_open_successes += 1;
                        if entry.half_open_successes >= thresholds.half_open_max_calls {
                            entry.state = CircuitState::Closed;
                            entry.outcomes.clear();
                            entry.opened_at_millis = None;
                            entry.half_open_successes = 0;
                            entry.half_open_in_flight = 0;
                        }
                    }
                }
            }
            CircuitState::Open => {
                // A result arriving while open (e.g. a racing in-flight call)
                // does not change state; only try_transition_half_open does.
            }
        }

        Ok(entry.snapshot())
    }

    async fn try_transition_half_open(
        &self,
        key: &str,
        thresholds: CircuitThresholds,
        now_millis: u64,
    ) -> Result<bool, StorageError> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .circuits
            .entry(key.to_string())
            .or_insert_with(CircuitEntry::new);

        if entry.state != CircuitState::Open {
            return Ok(false);
        }
        let opened_at = match entry.opened_at_millis {
            Some(t) => t,
            None => return Ok(false),
        };
        if now_millis.saturating_sub(opened_at) < thresholds.recovery_timeout_millis {
            return Ok(false);
        }

        entry.state = CircuitState::HalfOpen;
        entry.half_open_successes = 0;
        entry.half_open_in_flight = 0;
        entry.last_touched_millis = now_millis;
        Ok(true)
    }

    async fn try_claim_call(
        &self,
        key: &str,
        thresholds: CircuitThresholds,
        now_millis: u64,
    ) -> Result<bool, StorageError> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .circuits
            .entry(key.to_string())
            .or_insert_with(CircuitEntry::new);
        entry.last_touched_millis = now_millis;

        match entry.state {
            CircuitState::Closed => Ok(true),
            CircuitState::Open => Ok(false),
            CircuitState::HalfOpen => {
                if entry.half_open_in_flight < thresholds.half_open_max_calls {
                    entry.half_open_in_flight += 1;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn force_state(
        &self,
        key: &str,
        state: CircuitState,
        now_millis: u64,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .circuits
            .entry(key.to_string())
            .or_insert_with(CircuitEntry::new);
        entry.state = state;
        entry.last_touched_millis = now_millis;
        entry.half_open_successes = 0;
        entry.half_open_in_flight = 0;
        match state {
            CircuitState::Open => entry.opened_at_millis = Some(now_millis),
            CircuitState::Closed => {
                entry.opened_at_millis = None;
                entry.outcomes.clear();
            }
            CircuitState::HalfOpen => {}
        }
        Ok(())
    }

    async fn snapshot(&self, key: &str) -> Result<CircuitSnapshot, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .circuits
            .get(key)
            .map(CircuitEntry::snapshot)
            .unwrap_or(CircuitSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at_millis: None,
            }))
    }
}
