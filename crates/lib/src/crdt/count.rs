//! Grow-only counter.
//!
//! Each actor owns a partial sum. Operations from one actor must arrive in strict
//! version sequence; operations from different actors commute. Merging produces
//! `MultiIncrement` operations rather than a state dump, so the catch-up payload
//! only names the actors that are behind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::Result;
use crate::crdt::errors::CrdtError;
use crate::crdt::literal::Literalize;
use crate::crdt::traits::{Crdt, CrdtChange, MergeChanges};
use crate::crdt::version::{Actor, VersionRange, VersionVector};

/// Serializable state of a [`CrdtCount`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountData {
    /// Partial sum contributed by each actor
    pub values: BTreeMap<Actor, u64>,
    pub version: VersionVector,
}

impl Literalize for CountData {
    const KIND: &'static str = "count";
}

/// Operations accepted by [`CrdtCount`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CountOperation {
    /// Adds one; the range must be exactly one step.
    Increment { actor: Actor, version: VersionRange },
    /// Adds a positive `value` in one step over any forward range.
    MultiIncrement {
        actor: Actor,
        version: VersionRange,
        value: u64,
    },
}

impl CountOperation {
    pub fn increment(actor: impl Into<Actor>, from: u64) -> Self {
        CountOperation::Increment {
            actor: actor.into(),
            version: VersionRange::step(from),
        }
    }

    pub fn multi_increment(actor: impl Into<Actor>, version: VersionRange, value: u64) -> Self {
        CountOperation::MultiIncrement {
            actor: actor.into(),
            version,
            value,
        }
    }

    pub fn actor(&self) -> &str {
        match self {
            CountOperation::Increment { actor, .. }
            | CountOperation::MultiIncrement { actor, .. } => actor,
        }
    }
}

impl Literalize for CountOperation {
    const KIND: &'static str = "count-op";
}

/// A counter whose consumer view is the sum of all actors' partial sums.
///
/// # Examples
///
/// ```
/// use converge::crdt::{Crdt, CountOperation, CrdtCount};
///
/// let mut alice = CrdtCount::new();
/// assert!(alice.apply_operation(&CountOperation::increment("alice", 0)).unwrap());
/// // A replay of the same step is stale.
/// assert!(!alice.apply_operation(&CountOperation::increment("alice", 0)).unwrap());
/// assert_eq!(alice.consumer_view(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrdtCount {
    model: CountData,
}

impl CrdtCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: CountData) -> Self {
        Self { model: data }
    }

    /// The version vector of the counter.
    pub fn version(&self) -> &VersionVector {
        &self.model.version
    }

    /// The partial sum contributed by `actor`.
    pub fn value_of(&self, actor: &str) -> u64 {
        self.model.values.get(actor).copied().unwrap_or(0)
    }

    fn add(&mut self, actor: &str, version: VersionRange, delta: u64) -> Result<bool> {
        let current = self.model.version.get(actor);
        if version.from != current {
            trace!(
                actor,
                current,
                from = version.from,
                "Rejecting out-of-sequence count operation"
            );
            return Ok(false);
        }
        let total = self.value_of(actor).checked_add(delta).ok_or_else(|| {
            CrdtError::invalid(format!("partial sum of {actor} would overflow"))
        })?;
        self.model.values.insert(actor.to_string(), total);
        self.model.version.set(actor, version.to);
        Ok(true)
    }
}

impl Crdt for CrdtCount {
    type Data = CountData;
    type Operation = CountOperation;
    type ConsumerView = u64;

    fn apply_operation(&mut self, op: &CountOperation) -> Result<bool> {
        match op {
            CountOperation::Increment { actor, version } => {
                if version.from.checked_add(1) != Some(version.to) {
                    return Err(CrdtError::invalid(format!(
                        "increment must advance exactly one version, got {} -> {}",
                        version.from, version.to
                    ))
                    .into());
                }
                self.add(actor, *version, 1)
            }
            CountOperation::MultiIncrement {
                actor,
                version,
                value,
            } => {
                if !version.is_forward() {
                    return Err(CrdtError::invalid(format!(
                        "version range must advance, got {} -> {}",
                        version.from, version.to
                    ))
                    .into());
                }
                if *value == 0 {
                    return Err(CrdtError::invalid("increment value must be positive").into());
                }
                self.add(actor, *version, *value)
            }
        }
    }

    fn merge(&mut self, other: &CountData) -> Result<MergeChanges<CountData, CountOperation>> {
        let mut model_ops = Vec::new();
        let mut other_ops = Vec::new();

        for (actor, other_value) in &other.values {
            let this_value = self.value_of(actor);
            let this_version = self.model.version.get(actor);
            let other_version = other.version.get(actor);

            if *other_value > this_value {
                if this_version >= other_version {
                    return Err(CrdtError::DivergentVersions {
                        kind: CountData::KIND,
                        actor: actor.clone(),
                    }
                    .into());
                }
                let op = CountOperation::multi_increment(
                    actor.clone(),
                    VersionRange::new(this_version, other_version),
                    other_value - this_value,
                );
                model_ops.push(op);
            } else if this_value > *other_value {
                if other_version >= this_version {
                    return Err(CrdtError::DivergentVersions {
                        kind: CountData::KIND,
                        actor: actor.clone(),
                    }
                    .into());
                }
                other_ops.push(CountOperation::multi_increment(
                    actor.clone(),
                    VersionRange::new(other_version, this_version),
                    this_value - other_value,
                ));
            }
        }

        for (actor, this_value) in &self.model.values {
            if other.values.contains_key(actor) || *this_value == 0 {
                continue;
            }
            let this_version = self.model.version.get(actor);
            let other_version = other.version.get(actor);
            if other_version >= this_version {
                return Err(CrdtError::DivergentVersions {
                    kind: CountData::KIND,
                    actor: actor.clone(),
                }
                .into());
            }
            other_ops.push(CountOperation::multi_increment(
                actor.clone(),
                VersionRange::new(other_version, this_version),
                *this_value,
            ));
        }

        // Divergence is checked for every actor before anything is written.
        for op in &model_ops {
            if let CountOperation::MultiIncrement {
                actor,
                version,
                value,
            } = op
            {
                *self.model.values.entry(actor.clone()).or_insert(0) += value;
                self.model.version.set(actor.clone(), version.to);
            }
        }
        self.model.version = self.model.version.merge_with(&other.version);

        debug!(
            model_ops = model_ops.len(),
            other_ops = other_ops.len(),
            "Merged count models"
        );
        Ok(MergeChanges {
            model_change: CrdtChange::operations(model_ops),
            other_change: CrdtChange::operations(other_ops),
        })
    }

    fn data(&self) -> CountData {
        self.model.clone()
    }

    fn consumer_view(&self) -> u64 {
        // Partial sums are bounded individually; their total saturates.
        self.model.values.values().fold(0, |total, v| total.saturating_add(*v))
    }
}
