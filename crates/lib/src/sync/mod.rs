//! Synchronization support.
//!
//! The [`HoldQueue`] gates delivery of records that reference other records: a
//! record is released once every reference it depends on has been observed at
//! or beyond the version the record expects.

pub mod error;
pub mod hold_queue;

pub use error::SyncError;
pub use hold_queue::{HeldReference, HoldQueue, HoldQueueConfig, PendingRecord, RecordId};
