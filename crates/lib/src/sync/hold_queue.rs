//! Dependency-gated release of records.
//!
//! A record bundles the references it depends on, each with the version that
//! reference must reach, and a callback. [`HoldQueue::process_reference_id`]
//! reports the current version of one reference; once every dependency of a
//! record is satisfied the record is removed and its callback runs exactly once.
//!
//! All bookkeeping happens inside one async mutex. Callbacks run after that
//! section is left, so they may enqueue or process further references.
//!
//! Dropping an [`HoldQueue::enqueue_and_wait`] future before it resolves removes
//! its record. If the mutex is busy at that moment the record id is queued and
//! removed by the next caller that takes the lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::Result;
use crate::constants::DEFAULT_RELEASE_TIMEOUT_MS;
use crate::crdt::{ReferenceId, VersionVector};
use crate::sync::error::SyncError;

/// A dependency on `id` having reached at least `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldReference {
    pub id: ReferenceId,
    pub version: VersionVector,
}

impl HeldReference {
    pub fn new(id: impl Into<ReferenceId>, version: VersionVector) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

/// Identifies one enqueued record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record-{}", self.0)
    }
}

/// Snapshot of a record that has not been released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub id: RecordId,
    pub outstanding: BTreeMap<ReferenceId, VersionVector>,
}

/// Hold queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HoldQueueConfig {
    /// Default bound for [`HoldQueue::enqueue_and_wait`], in milliseconds.
    pub release_timeout_ms: u64,
}

impl Default for HoldQueueConfig {
    fn default() -> Self {
        Self {
            release_timeout_ms: DEFAULT_RELEASE_TIMEOUT_MS,
        }
    }
}

impl HoldQueueConfig {
    pub fn release_timeout(&self) -> Duration {
        Duration::from_millis(self.release_timeout_ms)
    }
}

type ReleaseCallback = Box<dyn FnOnce() + Send>;

struct Record {
    outstanding: BTreeMap<ReferenceId, VersionVector>,
    on_release: ReleaseCallback,
}

struct QueueState {
    next_record: u64,
    records: HashMap<RecordId, Record>,
    /// reference id -> records still waiting on it
    index: HashMap<ReferenceId, BTreeSet<RecordId>>,
    /// Records whose waiter went away while the lock was held elsewhere
    abandoned: mpsc::UnboundedReceiver<RecordId>,
}

impl QueueState {
    fn new(abandoned: mpsc::UnboundedReceiver<RecordId>) -> Self {
        Self {
            next_record: 0,
            records: HashMap::new(),
            index: HashMap::new(),
            abandoned,
        }
    }

    fn remove_record(&mut self, record: RecordId) -> Option<Record> {
        let removed = self.records.remove(&record)?;
        for reference in removed.outstanding.keys() {
            self.unindex(reference, record);
        }
        Some(removed)
    }

    fn prune_abandoned(&mut self) {
        while let Ok(record) = self.abandoned.try_recv() {
            if self.remove_record(record).is_some() {
                debug!(%record, "Dropped abandoned hold record");
            }
        }
    }

    fn unindex(&mut self, reference: &str, record: RecordId) {
        if let Some(records) = self.index.get_mut(reference) {
            records.remove(&record);
            if records.is_empty() {
                self.index.remove(reference);
            }
        }
    }
}

/// Queue of records waiting for their references to catch up.
pub struct HoldQueue {
    state: Mutex<QueueState>,
    abandon: mpsc::UnboundedSender<RecordId>,
    config: HoldQueueConfig,
}

impl fmt::Debug for HoldQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HoldQueue")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for HoldQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldQueue {
    pub fn new() -> Self {
        Self::with_config(HoldQueueConfig::default())
    }

    pub fn with_config(config: HoldQueueConfig) -> Self {
        let (abandon, abandoned) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(QueueState::new(abandoned)),
            abandon,
            config,
        }
    }

    async fn lock(&self) -> MutexGuard<'_, QueueState> {
        let mut state = self.state.lock().await;
        state.prune_abandoned();
        state
    }

    pub fn config(&self) -> &HoldQueueConfig {
        &self.config
    }

    /// Enqueues one record depending on every reference in `entities`.
    ///
    /// Requirements for the same reference are joined. A record with no
    /// requirements is released before this returns.
    pub async fn enqueue<I, F>(&self, entities: I, on_release: F) -> RecordId
    where
        I: IntoIterator<Item = HeldReference>,
        F: FnOnce() + Send + 'static,
    {
        let mut outstanding: BTreeMap<ReferenceId, VersionVector> = BTreeMap::new();
        for held in entities {
            let required = outstanding.entry(held.id).or_default();
            *required = required.merge_with(&held.version);
        }

        let mut state = self.lock().await;
        let record = RecordId(state.next_record);
        state.next_record += 1;

        if outstanding.is_empty() {
            drop(state);
            debug!(%record, "Releasing record with no dependencies");
            on_release();
            return record;
        }

        for reference in outstanding.keys() {
            state
                .index
                .entry(reference.clone())
                .or_default()
                .insert(record);
        }
        trace!(%record, dependencies = outstanding.len(), "Enqueued hold record");
        state.records.insert(
            record,
            Record {
                outstanding,
                on_release: Box::new(on_release),
            },
        );
        record
    }

    /// Reports that `id` is now at `current`, releasing every record this satisfies.
    ///
    /// Returns the number of records released by this call. Records whose
    /// requirement for `id` is not yet dominated stay queued.
    pub async fn process_reference_id(&self, id: &str, current: &VersionVector) -> usize {
        let mut released: Vec<(RecordId, ReleaseCallback)> = Vec::new();
        {
            let mut state = self.lock().await;
            let Some(waiting) = state.index.get(id).cloned() else {
                return 0;
            };
            for record_id in waiting {
                let Some(record) = state.records.get_mut(&record_id) else {
                    continue;
                };
                let satisfied = record
                    .outstanding
                    .get(id)
                    .is_some_and(|required| current.dominates(required));
                if !satisfied {
                    trace!(record = %record_id, reference = id, %current, "Reference still behind");
                    continue;
                }
                record.outstanding.remove(id);
                let done = record.outstanding.is_empty();
                state.unindex(id, record_id);
                if done && let Some(record) = state.records.remove(&record_id) {
                    released.push((record_id, record.on_release));
                }
            }
        }

        let count = released.len();
        for (record_id, on_release) in released {
            debug!(record = %record_id, reference = id, "Releasing hold record");
            on_release();
        }
        count
    }

    /// Removes a pending record without running its callback.
    ///
    /// Returns the references it was still waiting on, or `None` if the record
    /// is unknown or already released.
    pub async fn cancel(&self, record: RecordId) -> Option<BTreeMap<ReferenceId, VersionVector>> {
        let removed = self.lock().await.remove_record(record)?;
        warn!(%record, outstanding = removed.outstanding.len(), "Cancelled hold record");
        Some(removed.outstanding)
    }

    /// Every pending record with its outstanding references, ordered by id.
    pub async fn pending(&self) -> Vec<PendingRecord> {
        let state = self.lock().await;
        let mut pending: Vec<PendingRecord> = state
            .records
            .iter()
            .map(|(id, record)| PendingRecord {
                id: *id,
                outstanding: record.outstanding.clone(),
            })
            .collect();
        pending.sort_by_key(|p| p.id);
        pending
    }

    /// Number of pending records.
    pub async fn len(&self) -> usize {
        self.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Enqueues a record and waits for its release.
    ///
    /// `timeout` defaults to [`HoldQueueConfig::release_timeout`]. On timeout the
    /// record is cancelled and [`SyncError::HoldTimeout`] lists what was still
    /// outstanding.
    pub async fn enqueue_and_wait<I>(&self, entities: I, timeout: Option<Duration>) -> Result<()>
    where
        I: IntoIterator<Item = HeldReference>,
    {
        let (tx, rx) = oneshot::channel::<()>();
        let record = self
            .enqueue(entities, move || {
                let _ = tx.send(());
            })
            .await;
        let mut guard = WaitGuard {
            queue: self,
            record,
            armed: true,
        };

        let bound = timeout.unwrap_or_else(|| self.config.release_timeout());
        let outcome = match tokio::time::timeout(bound, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SyncError::HoldCancelled { record }.into()),
            Err(_) => match self.cancel(record).await {
                Some(outstanding) => {
                    warn!(%record, timeout_ms = bound.as_millis() as u64, "Hold record timed out");
                    Err(SyncError::HoldTimeout {
                        record,
                        outstanding: outstanding.into_keys().collect(),
                    }
                    .into())
                }
                // Released between the timeout firing and the cancel
                None => Ok(()),
            },
        };
        guard.armed = false;
        outcome
    }
}

/// Removes the record of an [`HoldQueue::enqueue_and_wait`] call that was dropped
/// before it finished waiting.
struct WaitGuard<'a> {
    queue: &'a HoldQueue,
    record: RecordId,
    armed: bool,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.queue.state.try_lock() {
            Ok(mut state) => {
                if state.remove_record(self.record).is_some() {
                    debug!(record = %self.record, "Dropped abandoned hold record");
                }
            }
            // The receiver lives in the queue, so the send cannot fail.
            Err(_) => {
                let _ = self.queue.abandon.send(self.record);
            }
        }
    }
}
