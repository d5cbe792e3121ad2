//! The task manager itself: a semaphore-gated executor with a priority
//! admission queue, optional adaptive concurrency, and a cooperative
//! shutdown sequence.

use crate::config::{BackpressureSettings, TaskManagerBuilder, TaskManagerConfig};
use crate::error::TaskManagerError;
use crate::events::TaskManagerEvent;
use crate::executor_adapter::{default_executor, DynExecutor};
use crate::metrics::{BackpressureMetricsSnapshot, PerformanceMetrics, PerformanceMetricsSnapshot};
use crate::queue::AdmissionQueue;
use crate::sizing::{LoadSampler, Resize, ThresholdController, UtilizationLoadSampler};
use resilience_core::context::{self, TaskContext, TaskPriority};
use resilience_core::events::EventListeners;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

struct Inner {
    name: String,
    semaphore: Arc<Semaphore>,
    limit: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    pending_shrinks: AtomicUsize,
    default_timeout: Option<Duration>,
    queue: AdmissionQueue,
    backpressure: BackpressureSettings,
    metrics: PerformanceMetrics,
    event_listeners: EventListeners<TaskManagerEvent>,
    draining: AtomicBool,
    shutdown_complete: AtomicBool,
    drain_timeout: Duration,
    executor: Arc<dyn DynExecutor>,
    load_sampler: Arc<dyn LoadSampler>,
    sizing: ThresholdController,
    adaptive_concurrency: bool,
    sample_interval: Duration,
    running: Mutex<Vec<JoinHandle<()>>>,
    dispatcher_handle: Mutex<Option<JoinHandle<()>>>,
    sampler_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn emit(&self, event: TaskManagerEvent) {
        self.event_listeners.emit(&event);
    }
}

/// A coordinated admission point for concurrent work: a resizable semaphore
/// gate, a priority admission queue for overflow, and the bookkeeping
/// (metrics, events, ambient context, shutdown) tying them together.
///
/// Cloning a `TaskManager` is cheap; every clone shares the same underlying
/// state.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    /// Starts building a [`TaskManager`] with the crate's defaults.
    pub fn builder() -> TaskManagerBuilder {
        TaskManagerBuilder::new()
    }

    pub(crate) fn from_config(config: TaskManagerConfig) -> Self {
        let executor = config.executor.unwrap_or_else(default_executor);
        let limit = Arc::new(AtomicUsize::new(config.max_concurrent_tasks));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let load_sampler: Arc<dyn LoadSampler> = match config.load_sampler {
            Some(sampler) => sampler,
            None => Arc::new(UtilizationLoadSampler {
                in_flight: Arc::clone(&in_flight),
                limit: Arc::clone(&limit),
            }),
        };
        let name = config.name.clone();

        let inner = Arc::new(Inner {
            name: config.name,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_tasks)),
            limit,
            in_flight,
            pending_shrinks: AtomicUsize::new(0),
            default_timeout: config.default_timeout,
            queue: AdmissionQueue::new(config.backpressure.max_queue_size),
            backpressure: config.backpressure,
            metrics: PerformanceMetrics::new(name),
            event_listeners: config.event_listeners,
            draining: AtomicBool::new(false),
            shutdown_complete: AtomicBool::new(false),
            drain_timeout: config.drain_timeout,
            executor,
            load_sampler,
            sizing: ThresholdController::new(
                config.max_concurrent_tasks,
                config.min_concurrent_tasks,
                config.max_concurrent_tasks,
                config.cpu_threshold,
                config.hysteresis,
            ),
            adaptive_concurrency: config.adaptive_concurrency,
            sample_interval: config.sample_interval,
            running: Mutex::new(Vec::new()),
            dispatcher_handle: Mutex::new(None),
            sampler_handle: Mutex::new(None),
        });

        let dispatcher_inner = Arc::clone(&inner);
        let dispatcher_handle = inner
            .executor
            .spawn_boxed(Box::pin(dispatcher_loop(dispatcher_inner)));
        *inner.dispatcher_handle.lock().expect("dispatcher handle mutex poisoned") = Some(dispatcher_handle);

        if inner.adaptive_concurrency {
            let sampler_inner = Arc::clone(&inner);
            let sampler_handle = inner
                .executor
                .spawn_boxed(Box::pin(sampler_loop(sampler_inner)));
            *inner.sampler_handle.lock().expect("sampler handle mutex poisoned") = Some(sampler_handle);
        }

        Self { inner }
    }

    /// Runs `op` once a concurrency permit is free, bypassing the priority
    /// admission queue entirely. Useful for callers that already apply their
    /// own backpressure and just want the shared concurrency gate.
    pub async fn run_with_semaphore<F, Fut, T, E>(&self, op: F) -> Result<T, TaskManagerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("task manager semaphore closed");
        self.admit();
        let ctx = context::current();
        let start = Instant::now();
        let result = context::scope(ctx, op()).await;
        let duration = start.elapsed();
        self.finish(duration, result.is_err());
        self.release_permit(permit);
        result.map_err(TaskManagerError::Operation)
    }

    /// Like [`Self::run_with_semaphore`], but fails with
    /// [`TaskManagerError::DeadlineExceeded`] if `op` doesn't finish within
    /// `timeout`.
    pub async fn run_with_timeout<F, Fut, T, E>(
        &self,
        op: F,
        timeout: Duration,
    ) -> Result<T, TaskManagerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("task manager semaphore closed");
        self.admit();
        let deadline = Instant::now() + timeout;
        let ctx = context::current().with_deadline(deadline);
        let start = Instant::now();
        let outcome = tokio::time::timeout(timeout, context::scope(ctx, op())).await;
        let duration = start.elapsed();
        let result = match outcome {
            Ok(result) => {
                self.finish(duration, result.is_err());
                result.map_err(TaskManagerError::Operation)
            }
            Err(_) => {
                self.inner.metrics.record_timed_out();
                self.finish(duration, true);
                Err(TaskManagerError::DeadlineExceeded { elapsed: duration })
            }
        };
        self.release_permit(permit);
        result
    }

    /// Submits `op` for execution at `priority`, going through the priority
    /// admission queue when one is enabled.
    ///
    /// Rejects immediately with [`TaskManagerError::OverloadRejected`] if the
    /// sampled load is at or above the low-priority rejection threshold and
    /// `priority` is [`TaskPriority::Low`], or with
    /// [`TaskManagerError::QueueFull`] if the queue is already at capacity.
    pub async fn schedule_task_with_priority<F, Fut, T, E>(
        &self,
        op: F,
        priority: TaskPriority,
        timeout: Option<Duration>,
    ) -> Result<T, TaskManagerError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        if self.inner.draining.load(Ordering::Acquire) {
            return Err(TaskManagerError::ShuttingDown);
        }

        self.inner.metrics.record_submitted();
        let load = self.inner.load_sampler.sample();
        self.inner.metrics.record_load_signal(load);

        if priority == TaskPriority::Low && load >= self.inner.backpressure.low_priority_rejection_threshold {
            self.inner.metrics.record_rejected_overload();
            self.inner.emit(TaskManagerEvent::TaskRejected {
                pattern_name: self.inner.name.clone(),
                timestamp: Instant::now(),
                reason: "overload",
            });
            return Err(TaskManagerError::OverloadRejected);
        }

        let timeout = timeout.or(self.inner.default_timeout);

        if !self.inner.backpressure.enable_priority_queue {
            return match timeout {
                Some(timeout) => self.run_with_timeout(op, timeout).await,
                None => self.run_with_semaphore(op).await,
            };
        }

        let (tx, rx) = oneshot::channel::<Result<T, TaskManagerError<E>>>();
        let ctx = context::current();
        let inner = Arc::clone(&self.inner);
        let run: futures::future::BoxFuture<'static, ()> = Box::pin(async move {
            let start = Instant::now();
            let scoped = context::scope(ctx, op());
            let outcome = match timeout {
                Some(timeout) => tokio::time::timeout(timeout, scoped).await,
                None => Ok(scoped.await),
            };
            let duration = start.elapsed();
            let pattern_name = inner.name.clone();
            match outcome {
                Ok(result) => {
                    let failed = result.is_err();
                    inner.metrics.record_finished(duration, failed);
                    inner.in_flight.fetch_sub(1, Ordering::AcqRel);
                    inner.emit(TaskManagerEvent::TaskCompleted {
                        pattern_name,
                        timestamp: Instant::now(),
                        duration,
                        failed,
                    });
                    let _ = tx.send(result.map_err(TaskManagerError::Operation));
                }
                Err(_) => {
                    inner.metrics.record_timed_out();
                    inner.metrics.record_finished(duration, true);
                    inner.in_flight.fetch_sub(1, Ordering::AcqRel);
                    inner.emit(TaskManagerEvent::TaskTimedOut {
                        pattern_name,
                        timestamp: Instant::now(),
                        elapsed: duration,
                    });
                    let _ = tx.send(Err(TaskManagerError::DeadlineExceeded { elapsed: duration }));
                }
            }
        });

        match self.inner.queue.try_enqueue(priority, run) {
            Ok(depth) => {
                self.inner.emit(TaskManagerEvent::TaskQueued {
                    pattern_name: self.inner.name.clone(),
                    timestamp: Instant::now(),
                    queue_depth: depth,
                });
            }
            Err(()) => {
                self.inner.metrics.record_rejected_queue_full();
                self.inner.emit(TaskManagerEvent::TaskRejected {
                    pattern_name: self.inner.name.clone(),
                    timestamp: Instant::now(),
                    reason: "queue_full",
                });
                return Err(TaskManagerError::QueueFull {
                    max_queue_size: self.inner.backpressure.max_queue_size,
                });
            }
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TaskManagerError::Cancelled),
        }
    }

    /// Returns the ambient [`TaskContext`] of the task currently executing.
    pub fn get_current_context(&self) -> TaskContext {
        context::current()
    }

    /// Returns a snapshot of the manager's performance counters.
    pub fn get_performance_metrics(&self) -> PerformanceMetricsSnapshot {
        self.inner
            .metrics
            .snapshot(self.inner.queue.depth(), self.inner.limit.load(Ordering::Acquire))
    }

    /// Returns a snapshot of the manager's backpressure counters.
    pub fn get_backpressure_metrics(&self) -> BackpressureMetricsSnapshot {
        self.inner.metrics.backpressure_snapshot(
            self.inner.queue.depth(),
            self.inner.backpressure.max_queue_size,
        )
    }

    /// Clears accumulated counters. `in_flight` and the most recent load
    /// signal are left untouched since they describe current, not
    /// historical, state.
    pub fn reset_metrics(&self) {
        self.inner.metrics.reset();
    }

    /// Stops accepting new submissions, waits up to `drain_timeout` (or the
    /// manager's configured default) for in-flight and queued work to
    /// finish, then cancels anything still outstanding.
    ///
    /// Idempotent: once a shutdown is underway, later calls return
    /// immediately.
    pub async fn shutdown(&self, drain_timeout: Option<Duration>) {
        if self.inner.draining.swap(true, Ordering::AcqRel) {
            return;
        }

        self.inner.emit(TaskManagerEvent::ShutdownStarted {
            pattern_name: self.inner.name.clone(),
            timestamp: Instant::now(),
        });
        self.inner.queue.wake_all();

        let effective_drain = drain_timeout.unwrap_or(self.inner.drain_timeout);
        let start = Instant::now();
        while self.inner.queue.depth() > 0 || self.inner.in_flight.load(Ordering::Acquire) > 0 {
            if start.elapsed() >= effective_drain {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let cancelled = {
            let mut running = self.inner.running.lock().expect("running tasks mutex poisoned");
            running.retain(|handle| !handle.is_finished());
            let count = running.len();
            for handle in running.drain(..) {
                handle.abort();
            }
            count
        };

        if let Some(handle) = self
            .inner
            .sampler_handle
            .lock()
            .expect("sampler handle mutex poisoned")
            .take()
        {
            handle.abort();
        }
        if let Some(handle) = self
            .inner
            .dispatcher_handle
            .lock()
            .expect("dispatcher handle mutex poisoned")
            .take()
        {
            handle.abort();
        }

        self.inner.shutdown_complete.store(true, Ordering::Release);
        self.inner.emit(TaskManagerEvent::ShutdownCompleted {
            pattern_name: self.inner.name.clone(),
            timestamp: Instant::now(),
            cancelled,
        });
    }

    fn admit(&self) {
        self.inner.metrics.record_admitted();
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self, duration: Duration, failed: bool) {
        self.inner.metrics.record_finished(duration, failed);
        self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    fn release_permit(&self, permit: OwnedSemaphorePermit) {
        release_permit(permit, &self.inner);
    }
}

/// Returns the permit's capacity to the pool, unless a pending shrink is
/// waiting to be absorbed, in which case the permit is forgotten instead so
/// an in-flight task is never cancelled just to shrink the limit.
fn release_permit(permit: OwnedSemaphorePermit, inner: &Inner) {
    let consumed = inner
        .pending_shrinks
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
            if pending > 0 {
                Some(pending - 1)
            } else {
                None
            }
        })
        .is_ok();
    if consumed {
        permit.forget();
    }
}

async fn dispatcher_loop(inner: Arc<Inner>) {
    loop {
        if inner.shutdown_complete.load(Ordering::Acquire) {
            return;
        }

        let permit = match inner.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        match inner.queue.wait_for_next(&inner.draining).await {
            Some(task) => {
                inner.metrics.record_admitted();
                inner.in_flight.fetch_add(1, Ordering::AcqRel);
                inner.emit(TaskManagerEvent::TaskAdmitted {
                    pattern_name: inner.name.clone(),
                    timestamp: Instant::now(),
                    in_flight: inner.in_flight.load(Ordering::Acquire),
                });

                let task_inner = Arc::clone(&inner);
                let handle = inner.executor.spawn_boxed(Box::pin(async move {
                    task.run.await;
                    release_permit(permit, &task_inner);
                }));
                inner
                    .running
                    .lock()
                    .expect("running tasks mutex poisoned")
                    .push(handle);
            }
            None => {
                release_permit(permit, &inner);
                return;
            }
        }
    }
}

async fn sampler_loop(inner: Arc<Inner>) {
    loop {
        tokio::time::sleep(inner.sample_interval).await;
        if inner.shutdown_complete.load(Ordering::Acquire) {
            return;
        }

        let load = inner.load_sampler.sample();
        inner.metrics.record_load_signal(load);

        if let Some(resize) = inner.sizing.step(load) {
            let (old, new) = match resize {
                Resize::Increased { old, new } => {
                    inner.semaphore.add_permits(new - old);
                    (old, new)
                }
                Resize::Decreased { old, new } => {
                    inner.pending_shrinks.fetch_add(old - new, Ordering::AcqRel);
                    (old, new)
                }
            };
            inner.limit.store(new, Ordering::Release);
            inner.metrics.record_concurrency_limit(new);
            inner.emit(TaskManagerEvent::ConcurrencyLimitChanged {
                pattern_name: inner.name.clone(),
                timestamp: Instant::now(),
                old_limit: old,
                new_limit: new,
            });
        }
    }
}
