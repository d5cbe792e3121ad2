//! Redis-backed storage, for sharing rate limiter and circuit breaker state
//! across processes.
//!
//! Every operation is implemented as a single `redis::Script` (a Lua script
//! evaluated server-side via `EVALSHA`/`EVAL`), so the read-modify-write
//! sequence a naive `GET` + `SET` would require is instead one atomic
//! round-trip — the same approach the contract's in-memory counterpart gets
//! for free from a mutex.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;

use crate::circuitbreaker_storage::{
    CallOutcome, CircuitBreakerStorage, CircuitSnapshot, CircuitState, CircuitThresholds,
};
use crate::error::StorageError;
use crate::ratelimiter_storage::{RateLimitOutcome, RateLimiterStorage};

const BACKEND: &str = "redis";

fn unavailable(err: impl std::fmt::Display) -> StorageError {
    StorageError::Unavailable {
        backend: BACKEND,
        message: err.to_string(),
    }
}

fn protocol(err: impl std::fmt::Display) -> StorageError {
    StorageError::Protocol {
        backend: BACKEND,
        message: err.to_string(),
    }
}

/// Redis-backed implementation of [`RateLimiterStorage`] and
/// [`CircuitBreakerStorage`], built on a [`deadpool_redis::Pool`].
#[derive(Debug, Clone)]
pub struct RedisStorage {
    pool: Pool,
}

impl RedisStorage {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, StorageError> {
        self.pool.get().await.map_err(unavailable)
    }
}

// KEYS[1] = bucket key, ARGV[1] = capacity, ARGV[2] = refill_per_sec,
// ARGV[3] = cost, ARGV[4] = now_millis. Returns {allowed, remaining_or_wait_ms}.
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_per_sec = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now = tonumber(ARGV[4])

local tokens = capacity
local last_refill = now
local state = redis.call("HMGET", key, "tokens", "last_refill")
if state[1] then
    tokens = tonumber(state[1])
    last_refill = tonumber(state[2])
end

local elapsed_secs = math.max(0, now - last_refill) / 1000.0
tokens = math.min(capacity, tokens + elapsed_secs * refill_per_sec)

if tokens >= cost then
    tokens = tokens - cost
    redis.call("HMSET", key, "tokens", tokens, "last_refill", now)
    redis.call("PEXPIRE", key, 3600000)
    return {1, math.floor(tokens)}
else
    redis.call("HMSET", key, "tokens", tokens, "last_refill", now)
    redis.call("PEXPIRE", key, 3600000)
    local deficit = cost - tokens
    local wait_ms = 0
    if refill_per_sec > 0 then
        wait_ms = math.floor((deficit / refill_per_sec) * 1000)
    end
    return {0, wait_ms}
end
"#;

// KEYS[1] = window key, ARGV[1] = limit, ARGV[2] = window_ms, ARGV[3] = now_millis.
const FIXED_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local window_start = now
local count = 0
local state = redis.call("HMGET", key, "window_start", "count")
if state[1] then
    window_start = tonumber(state[1])
    count = tonumber(state[2])
end

if now - window_start >= window_ms then
    window_start = now
    count = 0
end

if count < limit then
    count = count + 1
    redis.call("HMSET", key, "window_start", window_start, "count", count)
    redis.call("PEXPIRE", key, window_ms * 2)
    return {1, limit - count}
else
    redis.call("HMSET", key, "window_start", window_start, "count", count)
    redis.call("PEXPIRE", key, window_ms * 2)
    local reset_at = window_start + window_ms
    return {0, reset_at - now}
end
"#;

// Same shape as FIXED_WINDOW_SCRIPT but never increments `count` — only
// rolls the window over if it has elapsed, so a peek reflects the window
// the next real acquire would land in without consuming a slot from it.
const FIXED_WINDOW_PEEK_SCRIPT: &str = r#"
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local window_start = now
local count = 0
local state = redis.call("HMGET", key, "window_start", "count")
if state[1] then
    window_start = tonumber(state[1])
    count = tonumber(state[2])
end

if now - window_start >= window_ms then
    window_start = now
    count = 0
end

if count < limit then
    return {1, limit - count}
else
    local reset_at = window_start + window_ms
    return {0, reset_at - now}
end
"#;

#[async_trait]
impl RateLimiterStorage for RedisStorage {
    async fn try_acquire_token_bucket(
        &self,
        key: &str,
        capacity: u64,
        refill_per_sec: f64,
        cost: u64,
        now_millis: u64,
    ) -> Result<RateLimitOutcome, StorageError> {
        let mut conn = self.connection().await?;
        let (allowed, value): (i64, i64) = redis::Script::new(TOKEN_BUCKET_SCRIPT)
            .key(key)
            .arg(capacity)
            .arg(refill_per_sec)
            .arg(cost)
            .arg(now_millis)
            .invoke_async(&mut conn)
            .await
            .map_err(protocol)?;

        if allowed == 1 {
            Ok(RateLimitOutcome::Allowed {
                remaining: value as u64,
            })
        } else {
            Ok(RateLimitOutcome::Limited {
                retry_after: Duration::from_millis(value.max(0) as u64),
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
        let mut conn = self.connection().await?;
        let (allowed, value): (i64, i64) = redis::Script::new(FIXED_WINDOW_SCRIPT)
            .key(key)
            .arg(limit)
            .arg(window.as_millis() as u64)
            .arg(now_millis)
            .invoke_async(&mut conn)
            .await
            .map_err(protocol)?;

        if allowed == 1 {
            Ok(RateLimitOutcome::Allowed {
                remaining: value as u64,
            })
        } else {
            Ok(RateLimitOutcome::Limited {
                retry_after: Duration::from_millis(value.max(0) as u64),
            })
        }
    }

    async fn peek_fixed_window(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_millis: u64,
    ) -> Result<RateLimitOutcome, StorageError> {
        let mut conn = self.connection().await?;
        let (allowed, value): (i64, i64) = redis::Script::new(FIXED_WINDOW_PEEK_SCRIPT)
            .key(key)
            .arg(limit)
            .arg(window.as_millis() as u64)
            .arg(now_millis)
            .invoke_async(&mut conn)
            .await
            .map_err(protocol)?;

        if allowed == 1 {
            Ok(RateLimitOutcome::Allowed {
                remaining: value as u64,
            })
        } else {
            Ok(RateLimitOutcome::Limited {
                retry_after: Duration::from_millis(value.max(0) as u64),
            })
        }
    }

    async fn reset(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(protocol)?;
        Ok(())
    }
}

// KEYS[1] = circuit key, ARGV[1] = outcome ("success"|"failure"),
// ARGV[2] = failure_rate_threshold, ARGV[3] = minimum_calls,
// ARGV[4] = window_size, ARGV[5] = half_open_max_calls, ARGV[6] = now_millis.
// Returns {state, failure_count, success_count, opened_at_or_0}.
const RECORD_RESULT_SCRIPT: &str = r#"
local key = KEYS[1]
local outcome = ARGV[1]
local failure_rate_threshold = tonumber(ARGV[2])
local minimum_calls = tonumber(ARGV[3])
local window_size = tonumber(ARGV[4])
local half_open_max_calls = tonumber(ARGV[5])
local now = tonumber(ARGV[6])

local state = redis.call("HGET", key, "state") or "closed"
local opened_at = tonumber(redis.call("HGET", key, "opened_at") or "0")
local half_open_successes = tonumber(redis.call("HGET", key, "half_open_successes") or "0")
local half_open_in_flight = tonumber(redis.call("HGET", key, "half_open_in_flight") or "0")

if state == "closed" then
    redis.call("RPUSH", key .. ":outcomes", outcome)
    redis.call("LTRIM", key .. ":outcomes", -window_size, -1)
    local outcomes = redis.call("LRANGE", key .. ":outcomes", 0, -1)
    local failures = 0
    for _, o in ipairs(outcomes) do
        if o == "failure" then failures = failures + 1 end
    end
    if #outcomes >= minimum_calls then
        local rate = failures / #outcomes
        if rate >= failure_rate_threshold then
            state = "open"
            opened_at = now
        end
    end
elseif state == "half_open" then
    if half_open_in_flight > 0 then half_open_in_flight = half_open_in_flight - 1 end
    if outcome == "failure" then
        state = "open"
        opened_at = now
        half_open_successes = 0
        half_open_in_flight = 0
    else
        half_open_successes = half_open_successes + 1
        if half_open_successes >= half_open_max_calls then
            state = "closed"
            half_open_successes = 0
            half_open_in_flight = 0
            opened_at = 0
            redis.call("DEL", key .. ":outcomes")
        end
    end
end

redis.call("HMSET", key, "state", state, "opened_at", opened_at, "half_open_successes", half_open_successes, "half_open_in_flight", half_open_in_flight)
redis.call("PEXPIRE", key, 3600000)

local outcomes = redis.call("LRANGE", key .. ":outcomes", 0, -1)
local failures = 0
local successes = 0
for _, o in ipairs(outcomes) do
    if o == "failure" then failures = failures + 1 else successes = successes + 1 end
end

return {state, failures, successes, opened_at}
"#;

const TRY_HALF_OPEN_SCRIPT: &str = r#"
local key = KEYS[1]
local recovery_timeout_ms = tonumber(ARGV[1])
local now = tonumber(ARGV[2])

local state = redis.call("HGET", key, "state") or "closed"
if state ~= "open" then
    return 0
end
local opened_at = tonumber(redis.call("HGET", key, "opened_at") or "0")
if now - opened_at < recovery_timeout_ms then
    return 0
end

redis.call("HMSET", key, "state", "half_open", "half_open_successes", 0, "half_open_in_flight", 0)
return 1
"#;

// KEYS[1] = circuit key, ARGV[1] = half_open_max_calls, ARGV[2] = now_millis.
// Returns 1 if the caller may proceed, 0 otherwise. Claims a half-open
// probe slot atomically so at most half_open_max_calls callers are ever
// admitted concurrently.
const TRY_CLAIM_CALL_SCRIPT: &str = r#"
local key = KEYS[1]
local half_open_max_calls = tonumber(ARGV[1])
local now = tonumber(ARGV[2])

local state = redis.call("HGET", key, "state") or "closed"
if state == "closed" then
    return 1
end
if state == "open" then
    return 0
end

local half_open_in_flight = tonumber(redis.call("HGET", key, "half_open_in_flight") or "0")
if half_open_in_flight < half_open_max_calls then
    redis.call("HSET", key, "half_open_in_flight", half_open_in_flight + 1)
    redis.call("PEXPIRE", key, 3600000)
    return 1
end
return 0
"#;

fn parse_state(raw: &str) -> Result<CircuitState, StorageError> {
    match raw {
        "closed" => Ok(CircuitState::Closed),
        "open" => Ok(CircuitState::Open),
        "half_open" => Ok(CircuitState::HalfOpen),
        other => Err(protocol(format!("unknown circuit state '{other}'"))),
    }
}

#[async_trait]
impl CircuitBreakerStorage for RedisStorage {
    async fn record_result(
        &self,
        key: &str,
        outcome: CallOutcome,
        thresholds: CircuitThresholds,
        now_millis: u64,
    ) -> Result<CircuitSnapshot, StorageError> {
        let mut conn = self.connection().await?;
        let outcome_str = match outcome {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
        };
        let (state, failure_count, success_count, opened_at): (String, u64, u64, i64) =
            redis::Script::new(RECORD_RESULT_SCRIPT)
                .key(key)
                .arg(outcome_str)
                .arg(thresholds.failure_rate_threshold)
                .arg(thresholds.minimum_calls)
                .arg(thresholds.window_size)
                .arg(thresholds.half_open_max_calls)
                .arg(now_millis)
                .invoke_async(&mut conn)
                .await
                .map_err(protocol)?;

        Ok(CircuitSnapshot {
            state: parse_state(&state)?,
            failure_count,
            success_count,
            opened_at_millis: if opened_at > 0 {
                Some(opened_at as u64)
            } else {
                None
            },
        })
    }

    async fn try_transition_half_open(
        &self,
        key: &str,
        thresholds: CircuitThresholds,
        now_millis: u64,
    ) -> Result<bool, StorageError> {
        let mut conn = self.connection().await?;
        let transitioned: i64 = redis::Script::new(TRY_HALF_OPEN_SCRIPT)
            .key(key)
            .arg(thresholds.recovery_timeout_millis)
            .arg(now_millis)
            .invoke_async(&mut conn)
            .await
            .map_err(protocol)?;
        Ok(transitioned == 1)
    }

    async fn try_claim_call(
        &self,
        key: &str,
        thresholds: CircuitThresholds,
        now_millis: u64,
    ) -> Result<bool, StorageError> {
        let mut conn = self.connection().await?;
        let claimed: i64 = redis::Script::new(TRY_CLAIM_CALL_SCRIPT)
            .key(key)
            .arg(thresholds.half_open_max_calls)
            .arg(now_millis)
            .invoke_async(&mut conn)
            .await
            .map_err(protocol)?;
        Ok(claimed == 1)
    }

    async fn force_state(
        &self,
        key: &str,
        state: CircuitState,
        now_millis: u64,
    ) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let state_str = match state {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        let opened_at = if state == CircuitState::Open {
            now_millis
        } else {
            0
        };
        redis::cmd("HMSET")
            .arg(key)
            .arg("state")
            .arg(state_str)
            .arg("opened_at")
            .arg(opened_at)
            .arg("half_open_successes")
            .arg(0)
            .arg("half_open_in_flight")
            .arg(0)
            .query_async::<()>(&mut conn)
            .await
            .map_err(protocol)?;
        if state == CircuitState::Closed {
            redis::cmd("DEL")
                .arg(format!("{key}:outcomes"))
                .query_async::<()>(&mut conn)
                .await
                .map_err(protocol)?;
        }
        Ok(())
    }

    async fn snapshot(&self, key: &str) -> Result<CircuitSnapshot, StorageError> {
        let mut conn = self.connection().await?;
        let state: Option<String> = redis::cmd("HGET")
            .arg(key)
            .arg("state")
            .query_async(&mut conn)
            .await
            .map_err(protocol)?;
        let Some(state) = state else {
            return Ok(CircuitSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at_millis: None,
            });
        };
        let opened_at: i64 = redis::cmd("HGET")
            .arg(key)
            .arg("opened_at")
            .query_async(&mut conn)
            .await
            .unwrap_or(0);
        let outcomes: Vec<String> = redis::cmd("LRANGE")
            .arg(format!("{key}:outcomes"))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .unwrap_or_default();
        let failure_count = outcomes.iter().filter(|o| o.as_str() == "failure").count() as u64;
        let success_count = outcomes.len() as u64 - failure_count;

        Ok(CircuitSnapshot {
            state: parse_state(&state)?,
            failure_count,
            success_count,
            opened_at_millis: if opened_at > 0 {
                Some(opened_at as u64)
            } else {
                None
            },
        })
    }
}
