//! Conflict-free Replicated Data Types (CRDTs) for replicated state.
//!
//! Every model here converges under arbitrary reordering and duplication of the
//! messages exchanged between replicas. Concurrency control is strictly local: a
//! model instance has a single owner, and replicas only meet through merges and
//! operations carried as [`Literal`]s.
//!
//! # Core Types
//!
//! - [`VersionVector`] - per-actor counters used for every causality comparison
//! - [`CrdtCount`] - grow-only counter
//! - [`OrSet`] - token-based observed-remove set
//! - [`CrdtCollection`] - versioned OR-Set of [`Referenceable`] values
//! - [`CrdtSingleton`] - last-assignment-wins register on top of the collection model
//! - [`CrdtEntity`] - a record of named singleton and collection fields
//!
//! # Traits
//!
//! - [`Crdt`] - apply operations, merge, read data and consumer views
//! - [`Literalize`] - lossless conversion to and from [`Literal`]

pub mod collection;
pub mod count;
pub mod entity;
pub mod errors;
pub mod literal;
pub mod orset;
pub mod reference;
pub mod singleton;
pub mod traits;
pub mod version;

pub use collection::{CollectionData, CollectionOperation, CrdtCollection, FastForward, RemovedKeys};
pub use count::{CountData, CountOperation, CrdtCount};
pub use entity::{CrdtEntity, EntityData, EntityOperation, FieldName, RawEntity};
pub use errors::CrdtError;
pub use literal::{Literal, Literalize};
pub use orset::{CollectionEntry, OrSet, ReferenceId, ValueStamp, WriteToken};
pub use reference::Reference;
pub use singleton::{CrdtSingleton, SingletonData, SingletonOperation};
pub use traits::{Crdt, CrdtChange, MergeChanges, Referenceable};
pub use version::{Actor, Version, VersionRange, VersionVector};
