//! In-process storage driver.
//!
//! [`VolatileDriver`] keeps entries in a map guarded by a single async mutex. Every
//! operation, including listener notification, runs inside that critical section,
//! so `update` is atomic and listeners see writes to one key in order.
//!
//! [`VolatileMemory`] hands out one shared driver per storage-key namespace.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::Result;
use crate::constants::{RAMDISK_PROTOCOL, VOLATILE_PROTOCOL};
use crate::driver::errors::DriverError;
use crate::driver::key::StorageKey;
use crate::driver::{Driver, Listener, ListenerId, Updated, Updater};

struct VolatileStore<E> {
    /// Entries; the lock also serializes notification
    entries: Mutex<HashMap<String, E>>,
    listeners: RwLock<BTreeMap<ListenerId, Listener<E>>>,
    next_listener: AtomicU64,
}

/// A [`Driver`] backed by process memory.
///
/// Cloning yields another handle to the same store.
pub struct VolatileDriver<E> {
    store: Arc<VolatileStore<E>>,
}

impl<E> Clone for VolatileDriver<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<E> fmt::Debug for VolatileDriver<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolatileDriver").finish_non_exhaustive()
    }
}

impl<E> Default for VolatileDriver<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> VolatileDriver<E> {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(VolatileStore {
                entries: Mutex::new(HashMap::new()),
                listeners: RwLock::new(BTreeMap::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.store.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether two handles share one store.
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    async fn notify(&self, key: &str, value: Option<&E>) {
        let listeners = self.store.listeners.read().await;
        trace!(key, listeners = listeners.len(), "Notifying listeners");
        for listener in listeners.values() {
            listener(key, value);
        }
    }
}

#[async_trait]
impl<E> Driver<E> for VolatileDriver<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.store.entries.lock().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<E>> {
        Ok(self.store.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: E) -> Result<Option<E>> {
        let mut entries = self.store.entries.lock().await;
        let previous = entries.insert(key.to_string(), entry.clone());
        self.notify(key, Some(&entry)).await;
        drop(entries);
        Ok(previous)
    }

    async fn update(&self, key: &str, updater: Updater<E>) -> Result<Updated<E>> {
        let mut entries = self.store.entries.lock().await;
        let previous = entries.get(key).cloned();
        let was_new = previous.is_none();
        let entry = updater(previous);
        entries.insert(key.to_string(), entry.clone());
        self.notify(key, Some(&entry)).await;
        drop(entries);
        Ok(Updated { was_new, entry })
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.store.entries.lock().await;
        let removed: Vec<String> = entries.drain().map(|(key, _)| key).collect();
        debug!(removed = removed.len(), "Clearing volatile store");
        for key in &removed {
            self.notify(key, None).await;
        }
        Ok(())
    }

    async fn add_listener(&self, listener: Listener<E>) -> ListenerId {
        let id = ListenerId(self.store.next_listener.fetch_add(1, Ordering::Relaxed));
        self.store.listeners.write().await.insert(id, listener);
        id
    }

    async fn remove_listener(&self, id: ListenerId) -> bool {
        self.store.listeners.write().await.remove(&id).is_some()
    }
}

/// Registry of volatile stores, one per storage-key namespace.
///
/// Keys with the `volatile` or `ramdisk` protocol and the same namespace resolve
/// to the same [`VolatileDriver`].
pub struct VolatileMemory<E> {
    stores: Mutex<HashMap<String, VolatileDriver<E>>>,
}

impl<E> Default for VolatileMemory<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for VolatileMemory<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolatileMemory").finish_non_exhaustive()
    }
}

impl<E> VolatileMemory<E> {
    pub fn new() -> Self {
        Self {
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the driver for `key`'s namespace, creating it on first use.
    pub async fn driver_for(&self, key: &StorageKey) -> Result<VolatileDriver<E>> {
        let protocol = key.protocol();
        if protocol != VOLATILE_PROTOCOL && protocol != RAMDISK_PROTOCOL {
            return Err(DriverError::UnsupportedProtocol {
                protocol: protocol.to_string(),
            }
            .into());
        }
        let mut stores = self.stores.lock().await;
        let driver = stores
            .entry(key.namespace().to_string())
            .or_insert_with(VolatileDriver::new)
            .clone();
        Ok(driver)
    }

    /// Number of namespaces with a store.
    pub async fn namespaces(&self) -> usize {
        self.stores.lock().await.len()
    }
}

impl<E> VolatileMemory<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Clears every store and forgets all namespaces.
    ///
    /// Handles obtained earlier keep working but no longer share state with
    /// handles obtained after the reset.
    pub async fn reset(&self) -> Result<()> {
        let stores: Vec<VolatileDriver<E>> = {
            let mut stores = self.stores.lock().await;
            stores.drain().map(|(_, driver)| driver).collect()
        };
        for driver in stores {
            driver.clear().await?;
        }
        Ok(())
    }
}
