//! Bulkhead service implementation.

use crate::config::BulkheadConfig;
use crate::error::BulkheadError;
use crate::events::BulkheadEvent;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::Semaphore;
use tower::Service;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Bulkhead service that limits concurrent calls and bounds the queue of
/// callers waiting for a permit.
#[derive(Clone)]
pub struct Bulkhead<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
    /// Callers currently queued behind the semaphore (not yet holding a
    /// permit). Incremented before acquiring, decremented on every exit
    /// path from the wait (admitted, timed out, or queue-full rejection
    /// never increments it at all).
    waiters: Arc<AtomicUsize>,
    config: Arc<BulkheadConfig>,
}

impl<S> Bulkhead<S> {
    /// Creates a new bulkhead service.
    pub(crate) fn new(inner: S, config: BulkheadConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_calls));
        Self {
            inner,
            semaphore,
            waiters: Arc::new(AtomicUsize::new(0)),
            config: Arc::new(config),
        }
    }
}

/// Decrements the waiter counter when dropped, guaranteeing the count is
/// released on every exit path out of the wait (admitted, timed out,
/// cancelled).
struct WaiterGuard(Arc<AtomicUsize>);

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<S, Request> Service<Request> for Bulkhead<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: From<BulkheadError> + Send + 'static,
    Request: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let semaphore = Arc::clone(&self.semaphore);
        let waiters = Arc::clone(&self.waiters);
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();
        let start_time = Instant::now();

        Box::pin(async move {
            // Fast path: a permit is immediately available.
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    // Bulkhead is at capacity. Only join the queue if it has
                    // room; otherwise reject immediately (step 2/overflow of
                    // spec §4.6).
                    let queued = waiters.fetch_add(1, Ordering::AcqRel) + 1;
                    if queued > config.max_queue_size {
                        waiters.fetch_sub(1, Ordering::AcqRel);
                        let event = BulkheadEvent::CallRejected {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            max_concurrent_calls: config.max_concurrent_calls,
                        };
                        config.event_listeners.emit(&event);

                        #[cfg(feature = "metrics")]
                        counter!("bulkhead_calls_rejected_total", "bulkhead" => config.name.clone())
                            .increment(1);

                        return Err(BulkheadError::BulkheadFull {
                            max_concurrent_calls: config.max_concurrent_calls,
                        }
                        .into());
                    }

                    let _guard = WaiterGuard(Arc::clone(&waiters));
                    config.event_listeners.emit(&BulkheadEvent::CallQueued {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        queued_calls: queued,
                    });

                    let acquire = semaphore.acquire_owned();
                    let admitted = match config.max_wait_duration {
                        Some(wait_timeout) => {
                            match tokio::time::timeout(wait_timeout, acquire).await {
                                Ok(result) => result,
                                Err(_) => {
                                    let event = BulkheadEvent::CallTimedOutWaiting {
                                        pattern_name: config.name.clone(),
                                        timestamp: Instant::now(),
                                        wait_timeout,
                                    };
                                    config.event_listeners.emit(&event);

                                    #[cfg(feature = "metrics")]
                                    counter!("bulkhead_calls_rejected_total", "bulkhead" => config.name.clone())
                                        .increment(1);

                                    return Err(BulkheadError::BulkheadTimeout {
                                        waited: start_time.elapsed(),
                                    }
                                    .into());
                                }
                            }
                        }
                        None => acquire.await,
                    };

                    match admitted {
                        Ok(permit) => permit,
                        Err(_) => {
                            // Semaphore closed; treat as capacity rejection.
                            return Err(BulkheadError::BulkheadFull {
                                max_concurrent_calls: config.max_concurrent_calls,
                            }
                            .into());
                        }
                    }
                }
            };

            // Emit call permitted event
            let concurrent_calls =
                config.max_concurrent_calls - semaphore.available_permits();
            let event = BulkheadEvent::CallPermitted {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                concurrent_calls,
            };
            config.event_listeners.emit(&event);

            #[cfg(feature = "metrics")]
            {
                counter!("bulkhead_calls_permitted_total", "bulkhead" => config.name.clone())
                    .increment(1);
                gauge!("bulkhead_concurrent_calls", "bulkhead" => config.name.clone())
                    .set(concurrent_calls as f64);
            }

            // Call the inner service
            let result = inner.call(request).await;

            // Drop the permit to release the slot. This runs regardless of
            // whether the call succeeded or failed: the permit is held on
            // the stack and is dropped at the end of scope either way.
            drop(permit);

            let duration = start_time.elapsed();

            // Emit completion event
            match &result {
                Ok(_) => {
                    let event = BulkheadEvent::CallFinished {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    };
                    config.event_listeners.emit(&event);

                    #[cfg(feature = "metrics")]
                    counter!("bulkhead_calls_finished_total", "bulkhead" => config.name.clone())
                        .increment(1);
                }
                Err(_) => {
                    let event = BulkheadEvent::CallFailed {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    };
                    config.event_listeners.emit(&event);

                    #[cfg(feature = "metrics")]
                    counter!("bulkhead_calls_failed_total", "bulkhead" => config.name.clone())
                        .increment(1);
                }
            }

            #[cfg(feature = "metrics")]
            {
                let new_concurrent = config.max_concurrent_calls - semaphore.available_permits();
                gauge!("bulkhead_concurrent_calls", "bulkhead" => config.name.clone())
                    .set(new_concurrent as f64);
            }

            result
        })
    }
}
