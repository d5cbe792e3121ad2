//! In-process performance and backpressure metrics.
//!
//! Grounded on the teacher's `metrics`-crate integration pattern used
//! throughout every primitive (`describe_counter!`/`counter!`/`gauge!`/
//! `histogram!`); this module additionally keeps the atomics-based snapshot
//! `get_performance_metrics()` needs without requiring a reader to stand up
//! a Prometheus exporter. No histogram crate (e.g. `hdrhistogram`) is in the
//! workspace, so latency percentiles are computed from a small fixed-capacity
//! ring buffer of recent samples instead.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[cfg(feature = "metrics")]
use std::sync::Once;

const LATENCY_SAMPLE_CAPACITY: usize = 1024;

#[cfg(feature = "metrics")]
static DESCRIBE_METRICS: Once = Once::new();

#[cfg(feature = "metrics")]
fn describe_metrics_once() {
    DESCRIBE_METRICS.call_once(|| {
        metrics::describe_counter!(
            "task_manager_tasks_submitted_total",
            "Tasks submitted to the task manager"
        );
        metrics::describe_counter!(
            "task_manager_tasks_completed_total",
            "Tasks that completed successfully"
        );
        metrics::describe_counter!("task_manager_tasks_failed_total", "Tasks that failed");
        metrics::describe_counter!(
            "task_manager_tasks_timed_out_total",
            "Tasks that exceeded their deadline"
        );
        metrics::describe_counter!(
            "task_manager_tasks_rejected_total",
            "Tasks rejected by admission control"
        );
        metrics::describe_gauge!("task_manager_in_flight", "Tasks currently running");
        metrics::describe_gauge!(
            "task_manager_queue_depth",
            "Tasks waiting in the priority admission queue"
        );
        metrics::describe_gauge!(
            "task_manager_concurrency_limit",
            "Current concurrency limit"
        );
        metrics::describe_gauge!("task_manager_load_signal", "Most recently sampled load signal");
        metrics::describe_histogram!(
            "task_manager_task_duration_seconds",
            "Task execution duration"
        );
    });
}

/// Atomics-backed counters and a bounded latency sample buffer.
pub struct PerformanceMetrics {
    name: String,
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_timed_out: AtomicU64,
    tasks_rejected_overload: AtomicU64,
    tasks_rejected_queue_full: AtomicU64,
    in_flight: AtomicUsize,
    load_signal_millis: AtomicU64,
    latencies_millis: Mutex<Vec<u32>>,
}

/// A point-in-time snapshot returned by `get_performance_metrics()`.
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetricsSnapshot {
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_timed_out: u64,
    pub tasks_rejected: u64,
    pub in_flight: usize,
    pub queue_depth: usize,
    pub current_concurrency_limit: usize,
    pub load_signal: f64,
    pub p50_latency: Option<Duration>,
    pub p95_latency: Option<Duration>,
    pub p99_latency: Option<Duration>,
}

/// A snapshot returned by `get_backpressure_metrics()`.
#[derive(Debug, Clone, Default)]
pub struct BackpressureMetricsSnapshot {
    pub queue_depth: usize,
    pub max_queue_size: usize,
    pub rejections_overload: u64,
    pub rejections_queue_full: u64,
    pub load_signal: f64,
}

impl PerformanceMetrics {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        #[cfg(feature = "metrics")]
        describe_metrics_once();

        Self {
            name: name.into(),
            tasks_submitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_timed_out: AtomicU64::new(0),
            tasks_rejected_overload: AtomicU64::new(0),
            tasks_rejected_queue_full: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            load_signal_millis: AtomicU64::new(0),
            latencies_millis: Mutex::new(Vec::with_capacity(LATENCY_SAMPLE_CAPACITY)),
        }
    }

    pub(crate) fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("task_manager_tasks_submitted_total", "task_manager" => self.name.clone())
            .increment(1);
    }

    pub(crate) fn record_admitted(&self) {
        let in_flight = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        #[cfg(feature = "metrics")]
        metrics::gauge!("task_manager_in_flight", "task_manager" => self.name.clone())
            .set(in_flight as f64);
    }

    pub(crate) fn record_finished(&self, duration: Duration, failed: bool) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        if failed {
            self.tasks_failed.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            metrics::counter!("task_manager_tasks_failed_total", "task_manager" => self.name.clone())
                .increment(1);
        } else {
            self.tasks_completed.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            metrics::counter!("task_manager_tasks_completed_total", "task_manager" => self.name.clone())
                .increment(1);
        }

        let millis = duration.as_millis().min(u32::MAX as u128) as u32;
        let mut samples = self.latencies_millis.lock().expect("latency buffer poisoned");
        if samples.len() == LATENCY_SAMPLE_CAPACITY {
            samples.remove(0);
        }
        samples.push(millis);
        drop(samples);

        #[cfg(feature = "metrics")]
        metrics::histogram!("task_manager_task_duration_seconds", "task_manager" => self.name.clone())
            .record(duration.as_secs_f64());
    }

    pub(crate) fn record_timed_out(&self) {
        self.tasks_timed_out.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("task_manager_tasks_timed_out_total", "task_manager" => self.name.clone())
            .increment(1);
    }

    pub(crate) fn record_rejected_overload(&self) {
        self.tasks_rejected_overload.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("task_manager_tasks_rejected_total", "task_manager" => self.name.clone(), "reason" => "overload")
            .increment(1);
    }

    pub(crate) fn record_rejected_queue_full(&self) {
        self.tasks_rejected_queue_full.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("task_manager_tasks_rejected_total", "task_manager" => self.name.clone(), "reason" => "queue_full")
            .increment(1);
    }

    pub(crate) fn record_load_signal(&self, load: f64) {
        self.load_signal_millis
            .store((load.clamp(0.0, 1.0) * 1000.0) as u64, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::gauge!("task_manager_load_signal", "task_manager" => self.name.clone()).set(load);
    }

    pub(crate) fn record_concurrency_limit(&self, limit: usize) {
        #[cfg(feature = "metrics")]
        metrics::gauge!("task_manager_concurrency_limit", "task_manager" => self.name.clone())
            .set(limit as f64);
        #[cfg(not(feature = "metrics"))]
        let _ = limit;
    }

    fn load_signal(&self) -> f64 {
        self.load_signal_millis.load(Ordering::Relaxed) as f64 / 1000.0
    }

    fn percentiles(&self) -> (Option<Duration>, Option<Duration>, Option<Duration>) {
        let mut samples = self
            .latencies_millis
            .lock()
            .expect("latency buffer poisoned")
            .clone();
        if samples.is_empty() {
            return (None, None, None);
        }
        samples.sort_unstable();
        let pick = |p: f64| {
            let idx = ((samples.len() as f64 - 1.0) * p).round() as usize;
            Duration::from_millis(samples[idx.min(samples.len() - 1)] as u64)
        };
        (Some(pick(0.50)), Some(pick(0.95)), Some(pick(0.99)))
    }

    pub(crate) fn snapshot(
        &self,
        queue_depth: usize,
        current_concurrency_limit: usize,
    ) -> PerformanceMetricsSnapshot {
        let (p50, p95, p99) = self.percentiles();
        PerformanceMetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_timed_out: self.tasks_timed_out.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected_overload.load(Ordering::Relaxed)
                + self.tasks_rejected_queue_full.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
            queue_depth,
            current_concurrency_limit,
            load_signal: self.load_signal(),
            p50_latency: p50,
            p95_latency: p95,
            p99_latency: p99,
        }
    }

    pub(crate) fn backpressure_snapshot(
        &self,
        queue_depth: usize,
        max_queue_size: usize,
    ) -> BackpressureMetricsSnapshot {
        BackpressureMetricsSnapshot {
            queue_depth,
            max_queue_size,
            rejections_overload: self.tasks_rejected_overload.load(Ordering::Relaxed),
            rejections_queue_full: self.tasks_rejected_queue_full.load(Ordering::Relaxed),
            load_signal: self.load_signal(),
        }
    }

    pub(crate) fn reset(&self) {
        self.tasks_submitted.store(0, Ordering::Relaxed);
        self.tasks_completed.store(0, Ordering::Relaxed);
        self.tasks_failed.store(0, Ordering::Relaxed);
        self.tasks_timed_out.store(0, Ordering::Relaxed);
        self.tasks_rejected_overload.store(0, Ordering::Relaxed);
        self.tasks_rejected_queue_full.store(0, Ordering::Relaxed);
        self.latencies_millis
            .lock()
            .expect("latency buffer poisoned")
            .clear();
        // in_flight and load_signal reflect current state, not accumulated
        // history, so they are left untouched by reset.
    }
}
