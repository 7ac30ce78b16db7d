//! Storage driver contract.
//!
//! A [`Driver`] is the narrow interface every storage backend implements: keyed
//! reads and writes, an atomic read-modify-write, and change notification.
//! Backends may be in-process ([`VolatileDriver`]), on disk or remote; callers only
//! depend on this trait and must tolerate arbitrary latency from any method.
//!
//! ## Notification
//!
//! Every successful `set`, `update` and `clear` invokes each registered listener
//! with `(key, new value or None)` before the call completes. Delivery for one key
//! follows the order of that key's writes; nothing is promised across keys.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

pub mod errors;
pub mod hooked;
pub mod key;
pub mod volatile;

pub use errors::DriverError;
pub use hooked::{DriverHook, DriverOp, HookedDriver};
pub use key::StorageKey;
pub use volatile::{VolatileDriver, VolatileMemory};

/// Callback invoked with `(key, new value)` after each mutation; `None` means cleared.
///
/// Listeners run inside the driver's critical section and must not call back
/// into the same driver.
pub type Listener<E> = Arc<dyn Fn(&str, Option<&E>) + Send + Sync>;

/// Read-modify-write function passed to [`Driver::update`].
pub type Updater<E> = Box<dyn FnOnce(Option<E>) -> E + Send>;

/// Handle returned by [`Driver::add_listener`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Result of [`Driver::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Updated<E> {
    /// True if no entry existed before the update
    pub was_new: bool,
    pub entry: E,
}

/// Storage backend contract.
///
/// All implementations must be `Send` and `Sync` so one instance can be shared by
/// every caller of a storage key.
#[async_trait]
pub trait Driver<E>: Send + Sync
where
    E: Clone + Send + Sync + 'static,
{
    /// Returns whether an entry exists for `key`.
    async fn contains(&self, key: &str) -> Result<bool>;

    /// Returns the entry for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<E>>;

    /// Stores `entry` under `key`, returning the previous entry.
    async fn set(&self, key: &str, entry: E) -> Result<Option<E>>;

    /// Replaces the entry for `key` with `updater(previous)`.
    ///
    /// The read, the call to `updater` and the write happen without any other
    /// caller of this driver interleaving.
    async fn update(&self, key: &str, updater: Updater<E>) -> Result<Updated<E>>;

    /// Removes every entry, notifying listeners once per removed key.
    async fn clear(&self) -> Result<()>;

    /// Registers a change listener.
    async fn add_listener(&self, listener: Listener<E>) -> ListenerId;

    /// Unregisters a listener; returns whether it was registered.
    async fn remove_listener(&self, id: ListenerId) -> bool;
}
