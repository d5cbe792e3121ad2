//! Coordinated task manager for Tower services.
//!
//! Where the other primitives in this workspace are `tower::Layer`s that
//! wrap a single service, [`TaskManager`] is a standalone admission point
//! shared across many call sites: a resizable concurrency gate, a priority
//! admission queue for overflow, optional adaptive sizing driven by a
//! sampled load signal, and a cooperative shutdown sequence.
//!
//! # Basic Example
//!
//! ```rust
//! use resilience_taskmanager::TaskManager;
//!
//! # async fn example() {
//! let manager = TaskManager::builder()
//!     .max_concurrent_tasks(32)
//!     .name("order-processing")
//!     .build();
//!
//! let result = manager
//!     .run_with_semaphore(|| async { Ok::<_, std::io::Error>(42) })
//!     .await;
//! # let _ = result;
//! # }
//! ```
//!
//! # Priority Admission
//!
//! Work submitted through [`TaskManager::schedule_task_with_priority`] is
//! ordered by [`resilience_core::context::TaskPriority`] once the shared
//! concurrency limit is saturated, and is rejected outright rather than
//! queued once the load signal or the queue itself is past capacity:
//!
//! ```rust
//! use resilience_taskmanager::TaskManager;
//! use resilience_core::context::TaskPriority;
//!
//! # async fn example() {
//! let manager = TaskManager::builder().max_concurrent_tasks(4).build();
//!
//! let result = manager
//!     .schedule_task_with_priority(
//!         || async { Ok::<_, std::io::Error>("done") },
//!         TaskPriority::High,
//!         None,
//!     )
//!     .await;
//! # let _ = result;
//! # }
//! ```

mod config;
mod error;
mod events;
mod executor_adapter;
mod manager;
mod metrics;
mod queue;
mod sizing;

pub use config::{BackpressureSettings, BackpressureSettingsBuilder, TaskManagerBuilder};
pub use error::TaskManagerError;
pub use events::TaskManagerEvent;
pub use manager::TaskManager;
pub use metrics::{BackpressureMetricsSnapshot, PerformanceMetricsSnapshot};
pub use sizing::LoadSampler;
