//! Single-value register built on the collection model.
//!
//! A set first retires every token the writer has observed and then adds the new
//! value, so the register holds one entry unless two writers assigned it
//! concurrently. Concurrent assignments all survive in the data; the consumer view
//! shows the one written last.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::Result;
use crate::crdt::collection::{CollectionData, FastForward, check_value, is_next_add};
use crate::crdt::literal::Literalize;
use crate::crdt::orset::CollectionEntry;
use crate::crdt::traits::{Crdt, CrdtChange, MergeChanges, Referenceable};
use crate::crdt::version::{Actor, VersionVector};

/// Serializable state of a [`CrdtSingleton`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent, bound = "T: Referenceable")]
pub struct SingletonData<T>(pub CollectionData<T>);

impl<T> Default for SingletonData<T> {
    fn default() -> Self {
        Self(CollectionData::default())
    }
}

impl<T: Referenceable> Literalize for SingletonData<T> {
    const KIND: &'static str = "singleton";
}

/// Operations accepted by [`CrdtSingleton`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", bound = "T: Referenceable")]
pub enum SingletonOperation<T> {
    Set {
        actor: Actor,
        version: VersionVector,
        value: T,
    },
    Clear {
        actor: Actor,
        version: VersionVector,
    },
    FastForward(FastForward<T>),
}

impl<T: Referenceable> Literalize for SingletonOperation<T> {
    const KIND: &'static str = "singleton-op";
}

/// Last-assignment-wins register.
#[derive(Debug, Clone, PartialEq)]
pub struct CrdtSingleton<T> {
    model: CollectionData<T>,
}

impl<T> Default for CrdtSingleton<T> {
    fn default() -> Self {
        Self {
            model: CollectionData::default(),
        }
    }
}

impl<T: Referenceable> CrdtSingleton<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: SingletonData<T>) -> Self {
        Self { model: data.0 }
    }

    pub fn version(&self) -> &VersionVector {
        &self.model.version
    }

    /// Every value currently held, including concurrent assignments.
    pub fn candidates(&self) -> Vec<&T> {
        self.model.values.values().collect()
    }

    pub(crate) fn clear_observed(&mut self, clock: &VersionVector) -> bool {
        self.model.values.clear_observed(clock)
    }

    fn set(&mut self, actor: &str, clock: &VersionVector, value: &T) -> Result<bool> {
        check_value(value)?;
        if !is_next_add(actor, clock, &self.model.version) {
            trace!(actor, "Rejecting out-of-sequence singleton set");
            return Ok(false);
        }
        self.model.values.clear_observed(clock);
        self.model.add_at(actor, clock, value.clone());
        Ok(true)
    }

    fn clear(&mut self, actor: &str, clock: &VersionVector) -> bool {
        if clock.get(actor) != self.model.version.get(actor) {
            trace!(actor, "Rejecting singleton clear from a stale clock");
            return false;
        }
        self.model.values.clear_observed(clock);
        true
    }
}

impl<T: Referenceable> Crdt for CrdtSingleton<T> {
    type Data = SingletonData<T>;
    type Operation = SingletonOperation<T>;
    type ConsumerView = Option<T>;

    fn apply_operation(&mut self, op: &SingletonOperation<T>) -> Result<bool> {
        match op {
            SingletonOperation::Set {
                actor,
                version,
                value,
            } => self.set(actor, version, value),
            SingletonOperation::Clear { actor, version } => Ok(self.clear(actor, version)),
            SingletonOperation::FastForward(ff) => self.model.apply_fast_forward(ff),
        }
    }

    fn merge(
        &mut self,
        other: &SingletonData<T>,
    ) -> Result<MergeChanges<SingletonData<T>, SingletonOperation<T>>> {
        if self.model == other.0 {
            return Ok(MergeChanges::none());
        }
        let before = self.model.clone();
        let fast_forward = self.model.merge_from(&other.0);
        let model_change = if self.model == before {
            CrdtChange::empty()
        } else {
            CrdtChange::Model {
                model: SingletonData(self.model.clone()),
            }
        };
        let other_change = match fast_forward {
            Some(ff) => CrdtChange::operations(vec![SingletonOperation::FastForward(ff)]),
            None => CrdtChange::empty(),
        };
        Ok(MergeChanges {
            model_change,
            other_change,
        })
    }

    fn data(&self) -> SingletonData<T> {
        SingletonData(self.model.clone())
    }

    fn consumer_view(&self) -> Option<T> {
        self.model
            .values
            .iter()
            .map(|(_, entry)| entry)
            .max_by(|a: &&CollectionEntry<T>, b| a.written_by.cmp(&b.written_by))
            .map(|entry| entry.value.clone())
    }
}
