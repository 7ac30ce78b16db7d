//! Driver wrapper that runs a hook before each storage operation.
//!
//! Hooks can stall an operation until a test releases it or fail it outright,
//! which makes slow or flaky backends reproducible with a [`VolatileDriver`](super::VolatileDriver)
//! underneath.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::Result;
use crate::driver::{Driver, Listener, ListenerId, Updated, Updater};

/// The storage operation a hook is about to observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    Contains,
    Get,
    Set,
    Update,
    Clear,
}

/// Called before the wrapped driver runs an operation.
///
/// Returning an error aborts the operation; the wrapped driver is not touched.
#[async_trait]
pub trait DriverHook: Send + Sync {
    /// `key` is `None` for [`DriverOp::Clear`].
    async fn before(&self, op: DriverOp, key: Option<&str>) -> Result<()>;
}

/// A [`Driver`] that consults a [`DriverHook`] before delegating.
///
/// Listener registration is passed through without consulting the hook.
#[derive(Clone)]
pub struct HookedDriver<D> {
    inner: D,
    hook: Arc<dyn DriverHook>,
}

impl<D> HookedDriver<D> {
    pub fn new(inner: D, hook: Arc<dyn DriverHook>) -> Self {
        Self { inner, hook }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    async fn before(&self, op: DriverOp, key: Option<&str>) -> Result<()> {
        trace!(?op, key, "Running driver hook");
        self.hook.before(op, key).await
    }
}

#[async_trait]
impl<D, E> Driver<E> for HookedDriver<D>
where
    D: Driver<E>,
    E: Clone + Send + Sync + 'static,
{
    async fn contains(&self, key: &str) -> Result<bool> {
        self.before(DriverOp::Contains, Some(key)).await?;
        self.inner.contains(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<E>> {
        self.before(DriverOp::Get, Some(key)).await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, entry: E) -> Result<Option<E>> {
        self.before(DriverOp::Set, Some(key)).await?;
        self.inner.set(key, entry).await
    }

    async fn update(&self, key: &str, updater: Updater<E>) -> Result<Updated<E>> {
        self.before(DriverOp::Update, Some(key)).await?;
        self.inner.update(key, updater).await
    }

    async fn clear(&self) -> Result<()> {
        self.before(DriverOp::Clear, None).await?;
        self.inner.clear().await
    }

    async fn add_listener(&self, listener: Listener<E>) -> ListenerId {
        self.inner.add_listener(listener).await
    }

    async fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.remove_listener(id).await
    }
}
