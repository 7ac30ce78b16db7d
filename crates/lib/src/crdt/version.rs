//! Version vectors: per-actor counters expressing causal history.
//!
//! A [`VersionVector`] maps each [`Actor`] to the highest [`Version`] of that actor's
//! operations that have been observed. Absent actors are implicitly at version `0`,
//! and equality follows that rule, so `{a: 0}` and `{}` compare equal.
//!
//! Vectors are plain values. [`VersionVector::merge_with`], [`VersionVector::minus`]
//! and [`VersionVector::dominates`] never mutate their operands.
//!
//! # Examples
//!
//! ```
//! use converge::crdt::VersionVector;
//!
//! let a = VersionVector::from_iter([("alice", 2), ("bob", 1)]);
//! let b = VersionVector::from_iter([("alice", 1), ("carol", 4)]);
//!
//! let merged = a.merge_with(&b);
//! assert_eq!(merged.get("alice"), 2);
//! assert_eq!(merged.get("carol"), 4);
//! assert!(merged.dominates(&a));
//! assert!(merged.dominates(&b));
//! assert!(!a.dominates(&b));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a single writer.
pub type Actor = String;

/// A per-actor operation counter.
pub type Version = u64;

/// Mapping from actor to the highest version observed for that actor.
///
/// Monotonicity is a convention, not a checked invariant: [`VersionVector::set`]
/// overwrites unconditionally. The CRDT models reject regressions through their
/// sequence checks instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionVector {
    entries: BTreeMap<Actor, Version>,
}

impl VersionVector {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the version recorded for `actor`, or `0` if the actor is absent.
    pub fn get(&self, actor: &str) -> Version {
        self.entries.get(actor).copied().unwrap_or(0)
    }

    /// Overwrites the version recorded for `actor`.
    pub fn set(&mut self, actor: impl Into<Actor>, version: Version) {
        self.entries.insert(actor.into(), version);
    }

    /// Advances `actor` by one and returns the new version.
    ///
    /// Saturates at [`Version::MAX`].
    pub fn increment(&mut self, actor: &str) -> Version {
        let next = self.get(actor).saturating_add(1);
        self.entries.insert(actor.to_string(), next);
        next
    }

    /// True iff every actor present in `other` is at least as recent in `self`.
    ///
    /// The relation is reflexive: every vector dominates itself, and two empty
    /// vectors dominate each other.
    pub fn dominates(&self, other: &VersionVector) -> bool {
        other
            .entries
            .iter()
            .all(|(actor, version)| self.get(actor) >= *version)
    }

    /// Returns the pointwise maximum of `self` and `other`.
    pub fn merge_with(&self, other: &VersionVector) -> VersionVector {
        let mut merged = self.clone();
        for (actor, version) in &other.entries {
            let entry = merged.entries.entry(actor.clone()).or_insert(0);
            *entry = (*entry).max(*version);
        }
        merged
    }

    /// Returns the pointwise non-negative difference `self - other`, omitting zeros.
    ///
    /// If `other` dominates `self` the result is empty.
    pub fn minus(&self, other: &VersionVector) -> VersionVector {
        if other.dominates(self) {
            return VersionVector::new();
        }
        self.entries
            .iter()
            .filter_map(|(actor, version)| {
                let diff = version.saturating_sub(other.get(actor));
                (diff > 0).then(|| (actor.clone(), diff))
            })
            .collect()
    }

    /// True if no actor has a non-zero version.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|v| *v == 0)
    }

    /// Iterates over the recorded `(actor, version)` pairs in actor order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Version)> {
        self.entries.iter().map(|(a, v)| (a.as_str(), *v))
    }

    /// Iterates over the actors with a recorded entry.
    pub fn actors(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl PartialEq for VersionVector {
    fn eq(&self, other: &Self) -> bool {
        self.dominates(other) && other.dominates(self)
    }
}

impl Eq for VersionVector {}

impl<A: Into<Actor>> FromIterator<(A, Version)> for VersionVector {
    fn from_iter<I: IntoIterator<Item = (A, Version)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(a, v)| (a.into(), v)).collect(),
        }
    }
}

impl fmt::Display for VersionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (actor, version)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{actor}: {version}")?;
        }
        write!(f, "}}")
    }
}

/// A `from -> to` span of one actor's versions carried by counter operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub from: Version,
    pub to: Version,
}

impl VersionRange {
    pub fn new(from: Version, to: Version) -> Self {
        Self { from, to }
    }

    /// The range covering the single step after `from`.
    ///
    /// At [`Version::MAX`] the range is empty, which counters reject.
    pub fn step(from: Version) -> Self {
        Self {
            from,
            to: from.saturating_add(1),
        }
    }

    /// True if the range advances, i.e. `to > from`.
    pub fn is_forward(&self) -> bool {
        self.to > self.from
    }
}
