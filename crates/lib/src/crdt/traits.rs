//! Core traits shared by every CRDT model.
//!
//! - [`Crdt`]: apply operations, merge remote state, expose data and consumer views
//! - [`CrdtChange`]: the delta a merge hands back for each side
//! - [`Referenceable`]: values with a stable identity, stored in collections

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::crdt::literal::Literalize;

/// A change produced by a merge, to be applied to one side.
///
/// Operation lists are preferred since they are small; models that cannot express
/// a catch-up as operations hand back their full post-merge data instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "changeType", rename_all = "camelCase")]
pub enum CrdtChange<D, O> {
    Operations { operations: Vec<O> },
    Model { model: D },
}

impl<D, O> CrdtChange<D, O> {
    /// An operation list with nothing in it.
    pub fn empty() -> Self {
        CrdtChange::Operations {
            operations: Vec::new(),
        }
    }

    pub fn operations(operations: Vec<O>) -> Self {
        CrdtChange::Operations { operations }
    }

    /// True for an empty operation list.
    pub fn is_empty(&self) -> bool {
        matches!(self, CrdtChange::Operations { operations } if operations.is_empty())
    }
}

/// The pair of changes returned by [`Crdt::merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeChanges<D, O> {
    /// What the merging model applied to catch up with the other side.
    pub model_change: CrdtChange<D, O>,
    /// What the other side has to apply to catch up with the merged model.
    pub other_change: CrdtChange<D, O>,
}

impl<D, O> MergeChanges<D, O> {
    pub fn none() -> Self {
        Self {
            model_change: CrdtChange::empty(),
            other_change: CrdtChange::empty(),
        }
    }
}

/// A conflict-free replicated data type.
///
/// Models are owned by a single caller at a time; concurrent replicas only meet
/// through [`Crdt::merge`] and through operations exchanged as literals.
///
/// Applying an operation returns:
/// - `Ok(true)` when the operation took effect (or was already subsumed),
/// - `Ok(false)` when it was rejected as stale or out of sequence, which the caller
///   resolves by refreshing its base state and retrying,
/// - `Err(_)` when the operation is malformed.
pub trait Crdt {
    /// The serializable state of the model.
    type Data: Literalize + Clone + PartialEq + Debug;
    /// The closed set of operations this model accepts.
    type Operation: Literalize + Clone + PartialEq + Debug;
    /// The plain view handed to consumers.
    type ConsumerView;

    /// Applies a single operation.
    fn apply_operation(&mut self, op: &Self::Operation) -> Result<bool>;

    /// Merges `other` into this model and reports the changes needed on each side.
    ///
    /// After the call, this model holds the merged state. Applying `other_change`
    /// to a model holding `other` yields the same state.
    fn merge(&mut self, other: &Self::Data) -> Result<MergeChanges<Self::Data, Self::Operation>>;

    /// Returns a copy of the current state.
    fn data(&self) -> Self::Data;

    /// Returns the consumer-facing view of the current state.
    fn consumer_view(&self) -> Self::ConsumerView;

    /// Applies a change produced by a merge on another replica.
    ///
    /// Operation lists are applied in order and the result is `true` only if every
    /// operation was accepted. Model changes are merged in and always succeed.
    fn apply_change(&mut self, change: &CrdtChange<Self::Data, Self::Operation>) -> Result<bool> {
        match change {
            CrdtChange::Operations { operations } => {
                let mut all_applied = true;
                for op in operations {
                    all_applied &= self.apply_operation(op)?;
                }
                Ok(all_applied)
            }
            CrdtChange::Model { model } => {
                self.merge(model)?;
                Ok(true)
            }
        }
    }
}

/// A value with a stable, non-empty string identity.
pub trait Referenceable:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn id(&self) -> &str;
}
