use crate::config::WindowType;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Result of attempting to acquire a permit.
/// `Ok(wait_duration)` means permit acquired (possibly after waiting).
/// `Err(timeout)` means acquisition failed; `timeout` is the configured
/// wait timeout that would have been exceeded.
type AcquireResult = Result<Duration, Duration>;

/// Fixed window rate limiter state.
///
/// Resets all permits at fixed interval boundaries.
#[derive(Debug)]
struct FixedWindowState {
    limit_for_period: usize,
    refresh_period: Duration,
    timeout_duration: Duration,
    available_permits: usize,
    period_start: Instant,
}

impl FixedWindowState {
    fn new(limit_for_period: usize, refresh_period: Duration, timeout_duration: Duration) -> Self {
        Self {
            limit_for_period,
            refresh_period,
            timeout_duration,
            available_permits: limit_for_period,
            period_start: Instant::now(),
        }
    }

    fn try_acquire(&mut self) -> AcquireResult {
        let now = Instant::now();

        if now.duration_since(self.period_start) >= self.refresh_period {
            self.refresh(now);
        }

        if self.available_permits > 0 {
            self.available_permits -= 1;
            return Ok(Duration::ZERO);
        }

        let time_until_refresh = self
            .refresh_period
            .saturating_sub(now.duration_since(self.period_start));

        if time_until_refresh > self.timeout_duration {
            Err(self.timeout_duration)
        } else {
            Ok(time_until_refresh)
        }
    }

    fn refresh(&mut self, now: Instant) {
        self.available_permits = self.limit_for_period;
        self.period_start = now;
    }

    fn available_permits(&self) -> usize {
        self.available_permits
    }
}

/// Continuously-refilling token bucket.
///
/// Unlike [`FixedWindowState`], capacity accrues smoothly at
/// `limit_for_period / refresh_period` tokens per second rather than
/// resetting in one step, so it never allows the `2x` boundary burst a
/// fixed window does.
#[derive(Debug)]
struct TokenBucketState {
    capacity: f64,
    refill_per_sec: f64,
    timeout_duration: Duration,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketState {
    fn new(limit_for_period: usize, refresh_period: Duration, timeout_duration: Duration) -> Self {
        let capacity = limit_for_period as f64;
        let refill_per_sec = capacity / refresh_period.as_secs_f64().max(f64::EPSILON);
        Self {
            capacity,
            refill_per_sec,
            timeout_duration,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self) -> AcquireResult {
        let now = Instant::now();
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(Duration::ZERO);
        }

        let deficit = 1.0 - self.tokens;
        let wait = Duration::from_secs_f64(deficit / self.refill_per_sec);
        if wait > self.timeout_duration {
            Err(self.timeout_duration)
        } else {
            Ok(wait)
        }
    }

    fn available_permits(&self) -> usize {
        self.tokens as usize
    }
}

/// Sliding log rate limiter state.
///
/// Stores timestamps of each request and counts those within the window.
/// Provides precise rate limiting but uses O(n) memory.
#[derive(Debug)]
struct SlidingLogState {
    limit_for_period: usize,
    window_duration: Duration,
    timeout_duration: Duration,
    /// Timestamps of requests within the current window.
    request_log: VecDeque<Instant>,
}

impl SlidingLogState {
    fn new(limit_for_period: usize, window_duration: Duration, timeout_duration: Duration) -> Self {
        Self {
            limit_for_period,
            window_duration,
            timeout_duration,
            request_log: VecDeque::with_capacity(limit_for_period),
        }
    }

    fn try_acquire(&mut self) -> AcquireResult {
        let now = Instant::now();

        while let Some(&timestamp) = self.request_log.front() {
            if now.duration_since(timestamp) >= self.window_duration {
                self.request_log.pop_front();
            } else {
                break;
            }
        }

        if self.request_log.len() < self.limit_for_period {
            self.request_log.push_back(now);
            return Ok(Duration::ZERO);
        }

        if let Some(&oldest) = self.request_log.front() {
            let time_until_slot = oldest
                .checked_add(self.window_duration)
                .map(|expiry| expiry.saturating_duration_since(now))
                .unwrap_or(Duration::ZERO);

            if time_until_slot > self.timeout_duration {
                Err(self.timeout_duration)
            } else {
                Ok(time_until_slot)
            }
        } else {
            Ok(Duration::ZERO)
        }
    }

    fn available_permits(&self) -> usize {
        self.limit_for_period.saturating_sub(self.request_log.len())
    }
}

/// Sliding window counter rate limiter state.
///
/// Uses weighted averaging between current and previous buckets.
/// Provides approximate sliding window with O(1) memory.
#[derive(Debug)]
struct SlidingCounterState {
    limit_for_period: usize,
    bucket_duration: Duration,
    timeout_duration: Duration,
    /// Count of requests in the previous bucket.
    previous_count: usize,
    /// Count of requests in the current bucket.
    current_count: usize,
    /// When the current bucket started.
    bucket_start: Instant,
}

impl SlidingCounterState {
    fn new(limit_for_period: usize, bucket_duration: Duration, timeout_duration: Duration) -> Self {
        Self {
            limit_for_period,
            bucket_duration,
            timeout_duration,
            previous_count: 0,
            current_count: 0,
            bucket_start: Instant::now(),
        }
    }

    fn try_acquire(&mut self) -> AcquireResult {
        let now = Instant::now();
        self.maybe_rotate_bucket(now);

        let elapsed = now.duration_since(self.bucket_start);
        let elapsed_ratio = elapsed.as_secs_f64() / self.bucket_duration.as_secs_f64();
        let elapsed_ratio = elapsed_ratio.clamp(0.0, 1.0);

        let previous_weight = 1.0 - elapsed_ratio;
        let weighted_count =
            (self.previous_count as f64 * previous_weight) + self.current_count as f64;

        if weighted_count < self.limit_for_period as f64 {
            self.current_count += 1;
            return Ok(Duration::ZERO);
        }

        let time_until_slot = self.estimate_wait_time(elapsed_ratio);

        if time_until_slot > self.timeout_duration {
            Err(self.timeout_duration)
        } else {
            Ok(time_until_slot)
        }
    }

    fn maybe_rotate_bucket(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.bucket_start);

        if elapsed >= self.bucket_duration {
            let buckets_passed =
                (elapsed.as_secs_f64() / self.bucket_duration.as_secs_f64()) as u32;

            if buckets_passed >= 2 {
                self.previous_count = 0;
                self.current_count = 0;
            } else {
                self.previous_count = self.current_count;
                self.current_count = 0;
            }

            self.bucket_start = now;
        }
    }

    fn estimate_wait_time(&self, current_ratio: f64) -> Duration {
        let limit = self.limit_for_period as f64;
        let current = self.current_count as f64;
        let previous = self.previous_count as f64;

        if previous == 0.0 {
            let remaining = self.bucket_duration.as_secs_f64() * (1.0 - current_ratio);
            return Duration::from_secs_f64(remaining);
        }

        let target_ratio = (previous + current - limit + 0.1) / previous;

        if target_ratio <= current_ratio {
            Duration::ZERO
        } else if target_ratio >= 1.0 {
            let remaining = self.bucket_duration.as_secs_f64() * (1.0 - current_ratio);
            Duration::from_secs_f64(remaining)
        } else {
            let wait_ratio = target_ratio - current_ratio;
            Duration::from_secs_f64(wait_ratio * self.bucket_duration.as_secs_f64())
        }
    }

    fn available_permits(&self) -> usize {
        let now = Instant::now();
        let elapsed = now.duration_since(self.bucket_start);
        let elapsed_ratio =
            (elapsed.as_secs_f64() / self.bucket_duration.as_secs_f64()).clamp(0.0, 1.0);
        let previous_weight = 1.0 - elapsed_ratio;
        let weighted_count =
            (self.previous_count as f64 * previous_weight) + self.current_count as f64;

        self.limit_for_period
            .saturating_sub(weighted_count.ceil() as usize)
    }
}

/// Enum-based rate limiter state that dispatches to the appropriate implementation.
#[derive(Debug)]
enum RateLimiterStateInner {
    Fixed(FixedWindowState),
    TokenBucket(TokenBucketState),
    SlidingLog(SlidingLogState),
    SlidingCounter(SlidingCounterState),
}

impl RateLimiterStateInner {
    fn new(
        window_type: WindowType,
        limit_for_period: usize,
        refresh_period: Duration,
        timeout_duration: Duration,
    ) -> Self {
        match window_type {
            WindowType::Fixed => Self::Fixed(FixedWindowState::new(
                limit_for_period,
                refresh_period,
                timeout_duration,
            )),
            WindowType::TokenBucket => Self::TokenBucket(TokenBucketState::new(
                limit_for_period,
                refresh_period,
                timeout_duration,
            )),
            WindowType::SlidingLog => Self::SlidingLog(SlidingLogState::new(
                limit_for_period,
                refresh_period,
                timeout_duration,
            )),
            WindowType::SlidingCounter => Self::SlidingCounter(SlidingCounterState::new(
                limit_for_period,
                refresh_period,
                timeout_duration,
            )),
        }
    }

    fn try_acquire(&mut self) -> AcquireResult {
        match self {
            Self::Fixed(state) => state.try_acquire(),
            Self::TokenBucket(state) => state.try_acquire(),
            Self::SlidingLog(state) => state.try_acquire(),
            Self::SlidingCounter(state) => state.try_acquire(),
        }
    }

    fn available_permits(&self) -> usize {
        match self {
            Self::Fixed(state) => state.available_permits(),
            Self::TokenBucket(state) => state.available_permits(),
            Self::SlidingLog(state) => state.available_permits(),
            Self::SlidingCounter(state) => state.available_permits(),
        }
    }
}

/// Shared rate limiter that can be cloned across services.
#[derive(Debug, Clone)]
pub(crate) struct SharedRateLimiter {
    state: Arc<Mutex<RateLimiterStateInner>>,
}

impl SharedRateLimiter {
    pub(crate) fn new(
        window_type: WindowType,
        limit_for_period: usize,
        refresh_period: Duration,
        timeout_duration: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimiterStateInner::new(
                window_type,
                limit_for_period,
                refresh_period,
                timeout_duration,
            ))),
        }
    }

    /// Attempts to acquire a permit.
    /// Returns `Ok(duration_waited)` if successful, `Err(timeout)` if the
    /// configured wait timeout would be (or was) exceeded.
    pub(crate) async fn acquire(&self) -> AcquireResult {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.try_acquire()
        };

        match result {
            Ok(Duration::ZERO) => Ok(Duration::ZERO),
            Ok(wait_duration) => {
                sleep(wait_duration).await;

                let mut state = self.state.lock().unwrap();
                match state.try_acquire() {
                    Ok(additional_wait) => Ok(wait_duration + additional_wait),
                    Err(timeout) => Err(timeout),
                }
            }
            Err(timeout) => Err(timeout),
        }
    }

    /// Returns the current number of available permits.
    pub(crate) fn available_permits(&self) -> usize {
        self.state.lock().unwrap().available_permits()
    }
}
