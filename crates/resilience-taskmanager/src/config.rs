//! Configuration for the task manager.

use crate::events::TaskManagerEvent;
use crate::executor_adapter::{wrap_executor, DynExecutor};
use crate::sizing::LoadSampler;
use resilience_core::events::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Backpressure knobs controlling admission to the priority queue, mirroring
/// the Python `BackpressureSettings` this crate is grounded on.
#[derive(Clone)]
pub struct BackpressureSettings {
    pub(crate) enable_priority_queue: bool,
    pub(crate) max_queue_size: usize,
    pub(crate) low_priority_rejection_threshold: f64,
}

impl BackpressureSettings {
    /// Creates a new configuration builder.
    pub fn builder() -> BackpressureSettingsBuilder {
        BackpressureSettingsBuilder::new()
    }
}

impl Default for BackpressureSettings {
    fn default() -> Self {
        BackpressureSettingsBuilder::new().build()
    }
}

/// Builder for [`BackpressureSettings`].
pub struct BackpressureSettingsBuilder {
    enable_priority_queue: bool,
    max_queue_size: usize,
    low_priority_rejection_threshold: f64,
}

impl BackpressureSettingsBuilder {
    fn new() -> Self {
        Self {
            enable_priority_queue: true,
            max_queue_size: 1_000,
            low_priority_rejection_threshold: 0.9,
        }
    }

    /// Enables or disables the priority admission queue. When disabled,
    /// `schedule_task_with_priority` still orders by FIFO only.
    ///
    /// Default: `true`.
    pub fn enable_priority_queue(mut self, enabled: bool) -> Self {
        self.enable_priority_queue = enabled;
        self
    }

    /// Maximum number of tasks allowed to wait in the admission queue at
    /// once.
    ///
    /// Default: 1000.
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Load signal at or above which [`resilience_core::context::TaskPriority::Low`]
    /// submissions are rejected with `OverloadRejected` rather than queued.
    ///
    /// Default: 0.9.
    pub fn low_priority_rejection_threshold(mut self, threshold: f64) -> Self {
        self.low_priority_rejection_threshold = threshold;
        self
    }

    /// Builds the settings.
    pub fn build(self) -> BackpressureSettings {
        BackpressureSettings {
            enable_priority_queue: self.enable_priority_queue,
            max_queue_size: self.max_queue_size,
            low_priority_rejection_threshold: self.low_priority_rejection_threshold,
        }
    }
}

impl Default for BackpressureSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable configuration for a [`crate::TaskManager`].
pub(crate) struct TaskManagerConfig {
    pub(crate) name: String,
    pub(crate) max_concurrent_tasks: usize,
    pub(crate) min_concurrent_tasks: usize,
    pub(crate) default_timeout: Option<Duration>,
    pub(crate) adaptive_concurrency: bool,
    pub(crate) cpu_threshold: f64,
    pub(crate) hysteresis: f64,
    pub(crate) sample_interval: Duration,
    pub(crate) backpressure: BackpressureSettings,
    pub(crate) drain_timeout: Duration,
    pub(crate) load_sampler: Option<Arc<dyn LoadSampler>>,
    pub(crate) event_listeners: EventListeners<TaskManagerEvent>,
    pub(crate) executor: Option<Arc<dyn DynExecutor>>,
}

/// Builder for [`crate::TaskManager`], matching the config-builder
/// convention every other primitive in the workspace uses.
pub struct TaskManagerBuilder {
    name: String,
    max_concurrent_tasks: usize,
    min_concurrent_tasks: usize,
    default_timeout: Option<Duration>,
    adaptive_concurrency: bool,
    cpu_threshold: f64,
    hysteresis: f64,
    sample_interval: Duration,
    backpressure: BackpressureSettings,
    drain_timeout: Duration,
    load_sampler: Option<Arc<dyn LoadSampler>>,
    event_listeners: EventListeners<TaskManagerEvent>,
    executor: Option<Arc<dyn DynExecutor>>,
}

impl TaskManagerBuilder {
    pub(crate) fn new() -> Self {
        Self {
            name: "task-manager".to_string(),
            max_concurrent_tasks: 64,
            min_concurrent_tasks: 1,
            default_timeout: None,
            adaptive_concurrency: false,
            cpu_threshold: 0.8,
            hysteresis: 0.2,
            sample_interval: Duration::from_secs(1),
            backpressure: BackpressureSettings::default(),
            drain_timeout: Duration::from_secs(30),
            load_sampler: None,
            event_listeners: EventListeners::new(),
            executor: None,
        }
    }

    /// Sets the initial (and, without adaptive concurrency, the fixed)
    /// concurrency limit.
    ///
    /// Default: 64.
    pub fn max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    /// Floor the adaptive controller will not shrink below.
    ///
    /// Default: 1.
    pub fn min_concurrent_tasks(mut self, min: usize) -> Self {
        self.min_concurrent_tasks = min;
        self
    }

    /// Default timeout applied to `schedule_task_with_priority` when no
    /// per-call timeout is given.
    ///
    /// Default: `None` (no timeout).
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Enables the threshold-based adaptive concurrency controller (§4.7.3).
    ///
    /// Default: `false`.
    pub fn adaptive_concurrency(mut self, enabled: bool) -> Self {
        self.adaptive_concurrency = enabled;
        self
    }

    /// Load signal above which the adaptive controller decreases the limit.
    ///
    /// Default: 0.8.
    pub fn cpu_threshold(mut self, threshold: f64) -> Self {
        self.cpu_threshold = threshold;
        self
    }

    /// Band below `cpu_threshold` the load signal must drop into before the
    /// controller increases the limit again.
    ///
    /// Default: 0.2.
    pub fn hysteresis(mut self, hysteresis: f64) -> Self {
        self.hysteresis = hysteresis;
        self
    }

    /// How often the adaptive controller samples the load signal.
    ///
    /// Default: 1 second.
    pub fn sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Backpressure settings governing the priority admission queue.
    pub fn backpressure_settings(mut self, settings: BackpressureSettings) -> Self {
        self.backpressure = settings;
        self
    }

    /// How long [`crate::TaskManager::shutdown`] waits for the queue to
    /// drain before cancelling remaining tasks.
    ///
    /// Default: 30 seconds.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Supplies a custom [`LoadSampler`] for the adaptive controller,
    /// instead of the default concurrency-utilization proxy.
    pub fn load_sampler(mut self, sampler: impl LoadSampler) -> Self {
        self.load_sampler = Some(Arc::new(sampler));
        self
    }

    /// Sets the name reported in metrics and events.
    ///
    /// Default: "task-manager".
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Supplies the executor used to spawn dispatched tasks and the
    /// optional background load sampler, instead of the current tokio
    /// runtime handle.
    ///
    /// Default: `tokio::runtime::Handle::current()`, resolved at `build()`.
    pub fn executor(mut self, executor: impl resilience_executor::Executor) -> Self {
        self.executor = Some(wrap_executor(executor));
        self
    }

    /// Registers a callback invoked whenever a submission is rejected
    /// (overload or queue-full).
    pub fn on_task_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&'static str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TaskManagerEvent::TaskRejected { reason, .. } = event {
                f(reason);
            }
        }));
        self
    }

    /// Registers a callback invoked once [`crate::TaskManager::shutdown`]
    /// finishes draining (and, if necessary, cancelling) all tasks.
    pub fn on_shutdown_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TaskManagerEvent::ShutdownCompleted { cancelled, .. } = event {
                f(*cancelled);
            }
        }));
        self
    }

    /// Builds the [`crate::TaskManager`].
    pub fn build(self) -> crate::manager::TaskManager {
        let config = TaskManagerConfig {
            name: self.name,
            max_concurrent_tasks: self.max_concurrent_tasks,
            min_concurrent_tasks: self.min_concurrent_tasks,
            default_timeout: self.default_timeout,
            adaptive_concurrency: self.adaptive_concurrency,
            cpu_threshold: self.cpu_threshold,
            hysteresis: self.hysteresis,
            sample_interval: self.sample_interval,
            backpressure: self.backpressure,
            drain_timeout: self.drain_timeout,
            load_sampler: self.load_sampler,
            event_listeners: self.event_listeners,
            executor: self.executor,
        };
        crate::manager::TaskManager::from_config(config)
    }
}

impl Default for TaskManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
