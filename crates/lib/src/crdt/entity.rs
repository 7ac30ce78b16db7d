//! Structured records composed of named singleton and collection fields.
//!
//! Fields converge independently: each field keeps its own sub-model and checks
//! operation sequence against its own clock. The entity also keeps a shared
//! version vector joining every accepted operation's clock; that vector is what
//! describes the record as a whole, e.g. for the hold queue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::crdt::collection::{CollectionData, CollectionOperation, CrdtCollection};
use crate::crdt::errors::CrdtError;
use crate::crdt::literal::Literalize;
use crate::crdt::singleton::{CrdtSingleton, SingletonData, SingletonOperation};
use crate::crdt::traits::{Crdt, CrdtChange, MergeChanges, Referenceable};
use crate::crdt::version::{Actor, VersionVector};

/// Name of an entity field.
pub type FieldName = String;

const SINGLETON_FIELD: &str = "singleton";
const COLLECTION_FIELD: &str = "collection";

/// Serializable state of a [`CrdtEntity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Referenceable")]
pub struct EntityData<T> {
    pub singletons: BTreeMap<FieldName, SingletonData<T>>,
    pub collections: BTreeMap<FieldName, CollectionData<T>>,
    pub version: VersionVector,
}

impl<T> Default for EntityData<T> {
    fn default() -> Self {
        Self {
            singletons: BTreeMap::new(),
            collections: BTreeMap::new(),
            version: VersionVector::new(),
        }
    }
}

impl<T: Referenceable> Literalize for EntityData<T> {
    const KIND: &'static str = "entity";
}

/// Operations accepted by [`CrdtEntity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", bound = "T: Referenceable")]
pub enum EntityOperation<T> {
    Set {
        field: FieldName,
        actor: Actor,
        version: VersionVector,
        value: T,
    },
    Clear {
        field: FieldName,
        actor: Actor,
        version: VersionVector,
    },
    Add {
        field: FieldName,
        actor: Actor,
        version: VersionVector,
        added: T,
    },
    Remove {
        field: FieldName,
        actor: Actor,
        version: VersionVector,
        removed: T,
    },
    ClearAll {
        actor: Actor,
        version: VersionVector,
    },
}

impl<T> EntityOperation<T> {
    pub fn version(&self) -> &VersionVector {
        match self {
            EntityOperation::Set { version, .. }
            | EntityOperation::Clear { version, .. }
            | EntityOperation::Add { version, .. }
            | EntityOperation::Remove { version, .. }
            | EntityOperation::ClearAll { version, .. } => version,
        }
    }
}

impl<T: Referenceable> Literalize for EntityOperation<T> {
    const KIND: &'static str = "entity-op";
}

/// The consumer view of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntity<T> {
    pub singletons: BTreeMap<FieldName, Option<T>>,
    pub collections: BTreeMap<FieldName, Vec<T>>,
}

/// A record whose fields are singleton and collection CRDTs.
#[derive(Debug, Clone, PartialEq)]
pub struct CrdtEntity<T> {
    singletons: BTreeMap<FieldName, CrdtSingleton<T>>,
    collections: BTreeMap<FieldName, CrdtCollection<T>>,
    version: VersionVector,
}

impl<T: Referenceable> CrdtEntity<T> {
    /// Creates an empty entity with the given field layout.
    pub fn new<S, C>(singleton_fields: S, collection_fields: C) -> Result<Self>
    where
        S: IntoIterator,
        S::Item: Into<FieldName>,
        C: IntoIterator,
        C::Item: Into<FieldName>,
    {
        let mut singletons = BTreeMap::new();
        for field in singleton_fields {
            let field = field.into();
            if singletons.contains_key(&field) {
                return Err(CrdtError::DuplicateField { field }.into());
            }
            singletons.insert(field, CrdtSingleton::new());
        }
        let mut collections = BTreeMap::new();
        for field in collection_fields {
            let field = field.into();
            if singletons.contains_key(&field) || collections.contains_key(&field) {
                return Err(CrdtError::DuplicateField { field }.into());
            }
            collections.insert(field, CrdtCollection::new());
        }
        Ok(Self {
            singletons,
            collections,
            version: VersionVector::new(),
        })
    }

    /// Rebuilds an entity from its data; the layout is taken from the data.
    pub fn from_data(data: EntityData<T>) -> Result<Self> {
        if let Some(field) = data
            .singletons
            .keys()
            .find(|f| data.collections.contains_key(*f))
        {
            return Err(CrdtError::DuplicateField {
                field: field.clone(),
            }
            .into());
        }
        Ok(Self {
            singletons: data
                .singletons
                .into_iter()
                .map(|(f, d)| (f, CrdtSingleton::from_data(d)))
                .collect(),
            collections: data
                .collections
                .into_iter()
                .map(|(f, d)| (f, CrdtCollection::from_data(d)))
                .collect(),
            version: data.version,
        })
    }

    /// The shared version vector of the whole record.
    pub fn version(&self) -> &VersionVector {
        &self.version
    }

    pub fn singleton(&self, field: &str) -> Option<&CrdtSingleton<T>> {
        self.singletons.get(field)
    }

    pub fn collection(&self, field: &str) -> Option<&CrdtCollection<T>> {
        self.collections.get(field)
    }

    fn singleton_mut(&mut self, field: &str) -> Result<&mut CrdtSingleton<T>> {
        if self.collections.contains_key(field) {
            return Err(CrdtError::FieldKindMismatch {
                field: field.to_string(),
                expected: SINGLETON_FIELD,
            }
            .into());
        }
        self.singletons.get_mut(field).ok_or_else(|| {
            CrdtError::UnknownField {
                field: field.to_string(),
            }
            .into()
        })
    }

    fn collection_mut(&mut self, field: &str) -> Result<&mut CrdtCollection<T>> {
        if self.singletons.contains_key(field) {
            return Err(CrdtError::FieldKindMismatch {
                field: field.to_string(),
                expected: COLLECTION_FIELD,
            }
            .into());
        }
        self.collections.get_mut(field).ok_or_else(|| {
            CrdtError::UnknownField {
                field: field.to_string(),
            }
            .into()
        })
    }

    fn clear_all(&mut self, clock: &VersionVector) {
        for field in self.singletons.values_mut() {
            field.clear_observed(clock);
        }
        for field in self.collections.values_mut() {
            field.clear_observed(clock);
        }
    }
}

impl<T: Referenceable> Crdt for CrdtEntity<T> {
    type Data = EntityData<T>;
    type Operation = EntityOperation<T>;
    type ConsumerView = RawEntity<T>;

    fn apply_operation(&mut self, op: &EntityOperation<T>) -> Result<bool> {
        let applied = match op {
            EntityOperation::Set {
                field,
                actor,
                version,
                value,
            } => self
                .singleton_mut(field)?
                .apply_operation(&SingletonOperation::Set {
                    actor: actor.clone(),
                    version: version.clone(),
                    value: value.clone(),
                })?,
            EntityOperation::Clear {
                field,
                actor,
                version,
            } => self
                .singleton_mut(field)?
                .apply_operation(&SingletonOperation::Clear {
                    actor: actor.clone(),
                    version: version.clone(),
                })?,
            EntityOperation::Add {
                field,
                actor,
                version,
                added,
            } => self
                .collection_mut(field)?
                .apply_operation(&CollectionOperation::Add {
                    actor: actor.clone(),
                    version: version.clone(),
                    added: added.clone(),
                })?,
            EntityOperation::Remove {
                field,
                actor,
                version,
                removed,
            } => self
                .collection_mut(field)?
                .apply_operation(&CollectionOperation::Remove {
                    actor: actor.clone(),
                    version: version.clone(),
                    removed: removed.clone(),
                })?,
            EntityOperation::ClearAll { version, .. } => {
                self.clear_all(version);
                true
            }
        };
        if applied {
            self.version = self.version.merge_with(op.version());
        }
        Ok(applied)
    }

    fn merge(
        &mut self,
        other: &EntityData<T>,
    ) -> Result<MergeChanges<EntityData<T>, EntityOperation<T>>> {
        for field in other.singletons.keys() {
            if !self.singletons.contains_key(field) {
                return Err(CrdtError::UnknownField {
                    field: field.clone(),
                }
                .into());
            }
        }
        for field in other.collections.keys() {
            if !self.collections.contains_key(field) {
                return Err(CrdtError::UnknownField {
                    field: field.clone(),
                }
                .into());
            }
        }

        let mut changed = false;
        for (field, model) in self.singletons.iter_mut() {
            let theirs = other.singletons.get(field).cloned().unwrap_or_default();
            let changes = model.merge(&theirs)?;
            changed |= !changes.model_change.is_empty() || !changes.other_change.is_empty();
        }
        for (field, model) in self.collections.iter_mut() {
            let theirs = other.collections.get(field).cloned().unwrap_or_default();
            let changes = model.merge(&theirs)?;
            changed |= !changes.model_change.is_empty() || !changes.other_change.is_empty();
        }
        let merged_version = self.version.merge_with(&other.version);
        changed |= merged_version != self.version || merged_version != other.version;
        self.version = merged_version;

        debug!(changed, version = %self.version, "Merged entity data");
        if !changed {
            return Ok(MergeChanges::none());
        }
        let change = CrdtChange::Model { model: self.data() };
        Ok(MergeChanges {
            model_change: change.clone(),
            other_change: change,
        })
    }

    fn data(&self) -> EntityData<T> {
        EntityData {
            singletons: self
                .singletons
                .iter()
                .map(|(f, m)| (f.clone(), m.data()))
                .collect(),
            collections: self
                .collections
                .iter()
                .map(|(f, m)| (f.clone(), m.data()))
                .collect(),
            version: self.version.clone(),
        }
    }

    fn consumer_view(&self) -> RawEntity<T> {
        RawEntity {
            singletons: self
                .singletons
                .iter()
                .map(|(f, m)| (f.clone(), m.consumer_view()))
                .collect(),
            collections: self
                .collections
                .iter()
                .map(|(f, m)| (f.clone(), m.consumer_view()))
                .collect(),
        }
    }
}
