//! Versioned OR-Set of [`Referenceable`] values.
//!
//! [`CrdtCollection`] couples an [`OrSet`] with a version vector. Each accepted add
//! mints the token `(actor, version[actor])`, so tokens are unique across replicas
//! and any replica can tell from its own vector whether it has seen a token. That
//! is what lets [`CrdtCollection::merge`] tell "removed here" apart from "not yet
//! seen here" without tombstones.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::Result;
use crate::crdt::errors::CrdtError;
use crate::crdt::literal::Literalize;
use crate::crdt::orset::{CollectionEntry, OrSet, ReferenceId, ValueStamp, WriteToken};
use crate::crdt::traits::{Crdt, CrdtChange, MergeChanges, Referenceable};
use crate::crdt::version::{Actor, VersionVector};

/// Serializable state of a [`CrdtCollection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Referenceable")]
pub struct CollectionData<T> {
    pub values: OrSet<T>,
    pub version: VersionVector,
}

impl<T> Default for CollectionData<T> {
    fn default() -> Self {
        Self {
            values: OrSet::default(),
            version: VersionVector::new(),
        }
    }
}

impl<T: Referenceable> Literalize for CollectionData<T> {
    const KIND: &'static str = "collection";
}

/// Tokens the receiver of a [`FastForward`] must drop from one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedKeys {
    pub id: ReferenceId,
    pub keys: BTreeSet<WriteToken>,
}

/// Catch-up operation produced by a merge for the lagging replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "T: Referenceable")]
pub struct FastForward<T> {
    /// Entries whose tokens the receiver must gain
    pub added: Vec<CollectionEntry<T>>,
    pub removed: Vec<RemovedKeys>,
    /// The receiver must dominate this vector
    pub old_version: VersionVector,
    pub new_version: VersionVector,
}

impl<T> FastForward<T> {
    /// True if applying this would not change a replica at `old_version`.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.old_version == self.new_version
    }
}

/// Operations accepted by [`CrdtCollection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", bound = "T: Referenceable")]
pub enum CollectionOperation<T> {
    Add {
        actor: Actor,
        version: VersionVector,
        added: T,
    },
    Remove {
        actor: Actor,
        version: VersionVector,
        removed: T,
    },
    FastForward(FastForward<T>),
}

impl<T: Referenceable> Literalize for CollectionOperation<T> {
    const KIND: &'static str = "collection-op";
}

pub(crate) fn check_value<T: Referenceable>(value: &T) -> Result<()> {
    if value.id().is_empty() {
        return Err(CrdtError::invalid("collection values must have a non-empty id").into());
    }
    Ok(())
}

/// True when `clock` is exactly one step ahead of `current` for `actor`.
pub(crate) fn is_next_add(actor: &str, clock: &VersionVector, current: &VersionVector) -> bool {
    current.get(actor).checked_add(1) == Some(clock.get(actor))
}

impl<T: Referenceable> CollectionData<T> {
    /// Records an add by `actor` at `clock`, which must already be sequence-checked.
    pub(crate) fn add_at(&mut self, actor: &str, clock: &VersionVector, value: T) {
        let token = WriteToken::new(actor, clock.get(actor));
        let written_by = ValueStamp::new(token.clone(), clock);
        let id = value.id().to_string();
        self.values.assign(id, value, token, written_by);
        self.version.set(actor, clock.get(actor));
    }

    /// Applies a fast-forward produced by a merge on another replica.
    pub(crate) fn apply_fast_forward(&mut self, op: &FastForward<T>) -> Result<bool> {
        if !self.version.dominates(&op.old_version) {
            trace!(
                current = %self.version,
                required = %op.old_version,
                "Rejecting fast-forward from an unseen base"
            );
            return Ok(false);
        }
        for entry in &op.added {
            check_value(&entry.value)?;
            let unseen: BTreeSet<WriteToken> = entry
                .keys
                .iter()
                .filter(|t| !t.observed_by(&self.version))
                .cloned()
                .collect();
            self.values
                .absorb(entry.value.id(), &entry.value, &entry.written_by, &unseen);
        }
        for removed in &op.removed {
            let keys: Vec<WriteToken> = removed.keys.iter().cloned().collect();
            self.values.remove(&removed.id, &keys);
        }
        self.version = self.version.merge_with(&op.new_version);
        Ok(true)
    }

    /// Joins `other` into `self`, returning the fast-forward `other` needs.
    pub(crate) fn merge_from(&mut self, other: &CollectionData<T>) -> Option<FastForward<T>> {
        let new_version = self.version.merge_with(&other.version);
        let ids: BTreeSet<&str> = self.values.ids().chain(other.values.ids()).collect();

        let mut merged = BTreeMap::new();
        let mut added = Vec::new();
        let mut removed = Vec::new();

        for id in ids {
            let mine = self.values.entry(id);
            let theirs = other.values.entry(id);
            let empty = BTreeSet::new();
            let my_keys = mine.map(|e| &e.keys).unwrap_or(&empty);
            let their_keys = theirs.map(|e| &e.keys).unwrap_or(&empty);

            let kept: BTreeSet<WriteToken> = my_keys
                .iter()
                .filter(|t| their_keys.contains(*t) || !t.observed_by(&other.version))
                .chain(
                    their_keys
                        .iter()
                        .filter(|t| !my_keys.contains(*t) && !t.observed_by(&self.version)),
                )
                .cloned()
                .collect();

            let dropped_by_other: BTreeSet<WriteToken> =
                their_keys.difference(&kept).cloned().collect();
            if !dropped_by_other.is_empty() {
                removed.push(RemovedKeys {
                    id: id.to_string(),
                    keys: dropped_by_other,
                });
            }

            if kept.is_empty() {
                continue;
            }
            // The later write wins whichever side it came from.
            let source = match (mine, theirs) {
                (Some(m), Some(t)) if t.written_by > m.written_by => t,
                (Some(m), _) => m,
                (None, Some(t)) => t,
                (None, None) => continue,
            };
            let entry = CollectionEntry {
                value: source.value.clone(),
                keys: kept,
                written_by: source.written_by.clone(),
            };
            let their_writer = theirs.map(|t| &t.written_by);
            if !entry.keys.is_subset(their_keys) || their_writer != Some(&entry.written_by) {
                added.push(entry.clone());
            }
            merged.insert(id.to_string(), entry);
        }

        self.values.replace_entries(merged);
        let old_version = std::mem::replace(&mut self.version, new_version.clone());
        let fast_forward = FastForward {
            added,
            removed,
            old_version: other.version.clone(),
            new_version,
        };
        debug!(
            added = fast_forward.added.len(),
            removed = fast_forward.removed.len(),
            from = %old_version,
            to = %self.version,
            "Merged collection data"
        );
        (!fast_forward.is_noop()).then_some(fast_forward)
    }
}

/// A versioned OR-Set CRDT.
///
/// # Examples
///
/// ```
/// use converge::crdt::{CollectionOperation, Crdt, CrdtCollection, Reference, VersionVector};
///
/// let mut set = CrdtCollection::new();
/// let op = CollectionOperation::Add {
///     actor: "alice".into(),
///     version: VersionVector::from_iter([("alice", 1)]),
///     added: Reference::new("r1"),
/// };
/// assert!(set.apply_operation(&op).unwrap());
/// assert_eq!(set.consumer_view().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CrdtCollection<T> {
    model: CollectionData<T>,
}

impl<T> Default for CrdtCollection<T> {
    fn default() -> Self {
        Self {
            model: CollectionData::default(),
        }
    }
}

impl<T: Referenceable> CrdtCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: CollectionData<T>) -> Self {
        Self { model: data }
    }

    pub fn version(&self) -> &VersionVector {
        &self.model.version
    }

    pub fn len(&self) -> usize {
        self.model.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.model.values.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.model.values.contains(id)
    }

    /// The live tokens of `id`.
    pub fn keys(&self, id: &str) -> BTreeSet<WriteToken> {
        self.model.values.keys(id)
    }

    /// Removes every token observed by `clock` from every element.
    pub(crate) fn clear_observed(&mut self, clock: &VersionVector) -> bool {
        self.model.values.clear_observed(clock)
    }

    fn add(&mut self, actor: &str, clock: &VersionVector, value: &T) -> Result<bool> {
        check_value(value)?;
        if !is_next_add(actor, clock, &self.model.version) {
            trace!(
                actor,
                current = self.model.version.get(actor),
                proposed = clock.get(actor),
                "Rejecting out-of-sequence add"
            );
            return Ok(false);
        }
        self.model.add_at(actor, clock, value.clone());
        Ok(true)
    }

    fn remove(&mut self, actor: &str, clock: &VersionVector, value: &T) -> Result<bool> {
        check_value(value)?;
        if !self.model.values.contains(value.id()) {
            return Ok(false);
        }
        // Removes do not advance the clock.
        if clock.get(actor) != self.model.version.get(actor) {
            trace!(actor, "Rejecting remove from a stale clock");
            return Ok(false);
        }
        Ok(self.model.values.remove_observed(value.id(), clock))
    }
}

impl<T: Referenceable> Crdt for CrdtCollection<T> {
    type Data = CollectionData<T>;
    type Operation = CollectionOperation<T>;
    type ConsumerView = Vec<T>;

    fn apply_operation(&mut self, op: &CollectionOperation<T>) -> Result<bool> {
        match op {
            CollectionOperation::Add {
                actor,
                version,
                added,
            } => self.add(actor, version, added),
            CollectionOperation::Remove {
                actor,
                version,
                removed,
            } => self.remove(actor, version, removed),
            CollectionOperation::FastForward(ff) => self.model.apply_fast_forward(ff),
        }
    }

    fn merge(
        &mut self,
        other: &CollectionData<T>,
    ) -> Result<MergeChanges<CollectionData<T>, CollectionOperation<T>>> {
        if self.model == *other {
            return Ok(MergeChanges::none());
        }
        let before = self.model.clone();
        let fast_forward = self.model.merge_from(other);
        let model_change = if self.model == before {
            CrdtChange::empty()
        } else {
            CrdtChange::Model {
                model: self.model.clone(),
            }
        };
        let other_change = match fast_forward {
            Some(ff) => CrdtChange::operations(vec![CollectionOperation::FastForward(ff)]),
            None => CrdtChange::empty(),
        };
        Ok(MergeChanges {
            model_change,
            other_change,
        })
    }

    fn data(&self) -> CollectionData<T> {
        self.model.clone()
    }

    fn consumer_view(&self) -> Vec<T> {
        self.model.values.values().cloned().collect()
    }
}
