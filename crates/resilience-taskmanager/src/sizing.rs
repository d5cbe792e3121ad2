//! Threshold-based adaptive concurrency controller.
//!
//! Spec §4.7.3 describes a single-step threshold policy, not full AIMD or
//! Vegas: step the limit by exactly one in the direction the sampled load
//! signal indicates, with hysteresis on the increase side so the limit
//! doesn't chatter around the threshold. The atomics-based, lock-free shape
//! mirrors `resilience_core::aimd::AimdController`, but the step logic
//! itself is this simpler policy.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Which way [`ThresholdController::step`] moved the limit, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resize {
    Increased { old: usize, new: usize },
    Decreased { old: usize, new: usize },
}

/// Lock-free controller that nudges a concurrency limit up or down by one
/// in response to a sampled load signal in `[0.0, 1.0]`.
pub(crate) struct ThresholdController {
    current: AtomicUsize,
    min: usize,
    max: usize,
    cpu_threshold: f64,
    hysteresis: f64,
}

impl ThresholdController {
    pub(crate) fn new(initial: usize, min: usize, max: usize, cpu_threshold: f64, hysteresis: f64) -> Self {
        Self {
            current: AtomicUsize::new(initial.clamp(min, max)),
            min,
            max,
            cpu_threshold,
            hysteresis,
        }
    }

    pub(crate) fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Samples `load` and, if the threshold rule fires, steps the limit by
    /// one and returns the change. A concurrent call racing on the same
    /// boundary loses the CAS and simply reports no change this tick; the
    /// background sampler runs on a fixed cadence so it retries next tick.
    pub(crate) fn step(&self, load: f64) -> Option<Resize> {
        let current = self.current.load(Ordering::Acquire);
        if load > self.cpu_threshold && current > self.min {
            let new = current - 1;
            if self
                .current
                .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(Resize::Decreased { old: current, new });
            }
        } else if load < self.cpu_threshold - self.hysteresis && current < self.max {
            let new = current + 1;
            if self
                .current
                .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(Resize::Increased { old: current, new });
            }
        }
        None
    }
}

/// Samples a load signal in `[0.0, 1.0]` driving [`ThresholdController`].
///
/// Spec §4.7.3 leaves the signal's source unspecified. The default
/// [`UtilizationLoadSampler`] uses the manager's own concurrency
/// utilization (`in_flight / limit`) so the crate has a working policy with
/// no extra dependency; callers that want true CPU load can supply their own
/// sampler (e.g. backed by a system-metrics crate) via
/// [`crate::TaskManagerBuilder::load_sampler`].
pub trait LoadSampler: Send + Sync + 'static {
    /// Returns the current load signal, clamped to `[0.0, 1.0]`.
    fn sample(&self) -> f64;
}

/// Default [`LoadSampler`]: reports concurrency utilization as a proxy for
/// load.
pub(crate) struct UtilizationLoadSampler {
    pub(crate) in_flight: std::sync::Arc<AtomicUsize>,
    pub(crate) limit: std::sync::Arc<AtomicUsize>,
}

impl LoadSampler for UtilizationLoadSampler {
    fn sample(&self) -> f64 {
        let limit = self.limit.load(Ordering::Acquire).max(1);
        let in_flight = self.in_flight.load(Ordering::Acquire);
        (in_flight as f64 / limit as f64).clamp(0.0, 1.0)
    }
}
