//! Observed-remove set keyed by element id.
//!
//! Membership is tracked with [`WriteToken`]s rather than booleans. Every add
//! contributes tokens; a remove only takes away tokens it names. An element is
//! present while at least one of its tokens survives, so a remove never cancels an
//! add it has not seen.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::crdt::errors::CrdtError;
use crate::crdt::version::{Actor, Version, VersionVector};

/// Identifier of an element held in a collection.
pub type ReferenceId = String;

/// A unique marker minted by a successful add, scoped to `(actor, version)`.
///
/// Tokens order by version first and actor second. That order says nothing about
/// causality; an entry's value is tracked separately by its [`ValueStamp`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WriteToken {
    pub actor: Actor,
    pub version: Version,
}

impl WriteToken {
    pub fn new(actor: impl Into<Actor>, version: Version) -> Self {
        Self {
            actor: actor.into(),
            version,
        }
    }

    /// True if `clock` has seen the add that minted this token.
    pub fn observed_by(&self, clock: &VersionVector) -> bool {
        clock.get(&self.actor) >= self.version
    }
}

impl Ord for WriteToken {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.actor.cmp(&other.actor))
    }
}

impl PartialOrd for WriteToken {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for WriteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.actor, self.version)
    }
}

/// Identifies the write that produced an entry's value.
///
/// Writes order by `stamp`, the total of the writer's clock, and then by token. A
/// writer that observed an earlier write has a strictly larger stamp, so the order
/// extends causality and settles concurrent writes the same way on every replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueStamp {
    pub stamp: u64,
    pub token: WriteToken,
}

impl ValueStamp {
    /// The stamp of an add minting `token` from a writer at `clock`.
    pub fn new(token: WriteToken, clock: &VersionVector) -> Self {
        let stamp = clock
            .iter()
            .fold(0u64, |total, (_, version)| total.saturating_add(version));
        Self { stamp, token }
    }

    /// The stamp of a bare token, as if its writer had seen nothing else.
    pub fn from_token(token: WriteToken) -> Self {
        Self {
            stamp: token.version,
            token,
        }
    }
}

/// A stored value together with the tokens keeping it alive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry<T> {
    pub value: T,
    pub keys: BTreeSet<WriteToken>,
    /// The write `value` came from; the token may since have been removed
    pub written_by: ValueStamp,
}

/// Token-based OR-Set from element id to value.
///
/// # Examples
///
/// ```
/// use converge::crdt::{OrSet, WriteToken};
///
/// let k1 = WriteToken::new("alice", 1);
/// let k2 = WriteToken::new("bob", 1);
///
/// let mut set = OrSet::new();
/// assert!(set.add("id", "v", &[k1.clone(), k2.clone()]).unwrap());
/// assert!(set.remove("id", &[k1]));
/// assert!(set.contains("id"));
/// assert!(set.remove("id", &[k2]));
/// assert!(set.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrSet<T> {
    entries: BTreeMap<ReferenceId, CollectionEntry<T>>,
}

impl<T> Default for OrSet<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Clone + PartialEq> OrSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tokens` to the entry for `id`, creating it if needed.
    ///
    /// Returns whether any token was new. The stored value is replaced by `value`
    /// only when the greatest new token orders after the write that produced the
    /// current value. Re-adding the stored value with known tokens is an idempotent
    /// no-op; replacing the value without a new token is an error, as is an empty
    /// token list.
    pub fn add(
        &mut self,
        id: impl Into<ReferenceId>,
        value: T,
        tokens: &[WriteToken],
    ) -> Result<bool, CrdtError> {
        let id = id.into();
        let fresh: Vec<&WriteToken> = match self.entries.get(&id) {
            Some(entry) => tokens.iter().filter(|t| !entry.keys.contains(*t)).collect(),
            None => tokens.iter().collect(),
        };
        let Some(latest) = fresh.iter().max().copied().cloned() else {
            if tokens.is_empty() {
                return Err(CrdtError::invalid("add requires at least one write token"));
            }
            if self.entries.get(&id).is_some_and(|e| e.value == value) {
                return Ok(false);
            }
            return Err(CrdtError::invalid(format!(
                "cannot add without new keys: {id}"
            )));
        };
        let fresh: Vec<WriteToken> = fresh.into_iter().cloned().collect();
        Ok(self.insert(id, value, &fresh, ValueStamp::from_token(latest)))
    }

    /// Adds `token` for `id` as written by a writer whose clock produced `written_by`.
    pub(crate) fn assign(
        &mut self,
        id: impl Into<ReferenceId>,
        value: T,
        token: WriteToken,
        written_by: ValueStamp,
    ) -> bool {
        self.insert(id.into(), value, &[token], written_by)
    }

    fn insert(
        &mut self,
        id: ReferenceId,
        value: T,
        tokens: &[WriteToken],
        written_by: ValueStamp,
    ) -> bool {
        match self.entries.get_mut(&id) {
            None => {
                self.entries.insert(
                    id,
                    CollectionEntry {
                        value,
                        keys: tokens.iter().cloned().collect(),
                        written_by,
                    },
                );
                true
            }
            Some(entry) => {
                if written_by > entry.written_by {
                    entry.value = value;
                    entry.written_by = written_by;
                }
                let before = entry.keys.len();
                entry.keys.extend(tokens.iter().cloned());
                entry.keys.len() != before
            }
        }
    }

    /// Removes `tokens` from the entry for `id`; the entry disappears once empty.
    ///
    /// Returns whether any token was actually removed.
    pub fn remove(&mut self, id: &str, tokens: &[WriteToken]) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        let before = entry.keys.len();
        for token in tokens {
            entry.keys.remove(token);
        }
        let effective = entry.keys.len() != before;
        if entry.keys.is_empty() {
            self.entries.remove(id);
        }
        effective
    }

    /// Removes every token of `id` that `clock` has observed.
    pub fn remove_observed(&mut self, id: &str, clock: &VersionVector) -> bool {
        let observed: Vec<WriteToken> = match self.entries.get(id) {
            Some(entry) => entry
                .keys
                .iter()
                .filter(|t| t.observed_by(clock))
                .cloned()
                .collect(),
            None => return false,
        };
        trace!(id, removed = observed.len(), "Removing observed tokens");
        self.remove(id, &observed)
    }

    /// Removes every observed token from every entry.
    pub fn clear_observed(&mut self, clock: &VersionVector) -> bool {
        let ids: Vec<ReferenceId> = self.entries.keys().cloned().collect();
        let mut effective = false;
        for id in ids {
            effective |= self.remove_observed(&id, clock);
        }
        effective
    }

    /// Unions `tokens` into `id` and keeps whichever value was written last.
    ///
    /// An absent entry is only created when `tokens` is non-empty, so an element
    /// removed here is not revived by tokens this replica already observed.
    pub(crate) fn absorb(
        &mut self,
        id: &str,
        value: &T,
        written_by: &ValueStamp,
        tokens: &BTreeSet<WriteToken>,
    ) -> bool {
        match self.entries.get_mut(id) {
            None if tokens.is_empty() => false,
            None => {
                self.entries.insert(
                    id.to_string(),
                    CollectionEntry {
                        value: value.clone(),
                        keys: tokens.clone(),
                        written_by: written_by.clone(),
                    },
                );
                true
            }
            Some(entry) => {
                let mut changed = false;
                if *written_by > entry.written_by {
                    entry.value = value.clone();
                    entry.written_by = written_by.clone();
                    changed = true;
                }
                let before = entry.keys.len();
                entry.keys.extend(tokens.iter().cloned());
                changed || entry.keys.len() != before
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id).map(|e| &e.value)
    }

    pub fn entry(&self, id: &str) -> Option<&CollectionEntry<T>> {
        self.entries.get(id)
    }

    /// The live tokens of `id`, empty if absent.
    pub fn keys(&self, id: &str) -> BTreeSet<WriteToken> {
        self.entries
            .get(id)
            .map(|e| e.keys.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CollectionEntry<T>)> {
        self.entries.iter().map(|(id, e)| (id.as_str(), e))
    }

    /// The values in id order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|e| &e.value)
    }

    pub(crate) fn replace_entries(&mut self, entries: BTreeMap<ReferenceId, CollectionEntry<T>>) {
        self.entries = entries;
    }
}
