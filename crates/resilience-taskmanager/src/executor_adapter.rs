//! Object-safe shim over [`resilience_executor::Executor`].
//!
//! `Executor::spawn` is generic over the future type, so the trait itself
//! isn't object-safe. `TaskManager` needs a concrete, non-generic handle it
//! can store and clone around its dispatcher and sampler loops, so every
//! spawn is funneled through a boxed future and this narrower trait instead.

use futures::future::BoxFuture;
use resilience_executor::Executor;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub(crate) trait DynExecutor: Send + Sync {
    fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> JoinHandle<()>;
}

impl<E: Executor> DynExecutor for E {
    fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> JoinHandle<()> {
        self.spawn(future)
    }
}

pub(crate) fn wrap_executor<E: Executor>(executor: E) -> Arc<dyn DynExecutor> {
    Arc::new(executor)
}

pub(crate) fn default_executor() -> Arc<dyn DynExecutor> {
    wrap_executor(tokio::runtime::Handle::current())
}
