//!
//! Converge: the synchronization core of a replicated, offline-first data store.
//! This library provides the data models that let replicas of the same state
//! diverge and reconcile, plus the plumbing that moves that state in and out of storage.
//!
//! ## Core Concepts
//!
//! * **Version vectors (`crdt::VersionVector`)**: Per-actor counters used to order and compare replica state.
//! * **CRDTs (`crdt::Crdt`)**: Conflict-free replicated data types that accept operations and merge whole states:
//!     * **Count (`crdt::CrdtCount`)**: A grow-only counter.
//!     * **Collection (`crdt::CrdtCollection`)**: An observed-remove set of references.
//!     * **Singleton (`crdt::CrdtSingleton`)**: A single-value register built on the collection model.
//!     * **Entity (`crdt::CrdtEntity`)**: A record of named singleton and collection fields.
//! * **Literals (`crdt::Literal`)**: The tagged JSON envelope every model and operation travels in.
//! * **Drivers (`driver::Driver`)**: The storage contract, with an in-process `VolatileDriver`.
//! * **Hold queue (`sync::HoldQueue`)**: Defers work until the referenced records have been seen at the required versions.

pub mod constants;
pub mod crdt;
pub mod driver;
pub mod sync;

/// Result type used throughout the converge library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the converge library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured CRDT errors from the crdt module
    #[error(transparent)]
    Crdt(crdt::CrdtError),

    /// Structured storage errors from the driver module
    #[error(transparent)]
    Driver(driver::DriverError),

    /// Structured synchronization errors from the sync module
    #[error(transparent)]
    Sync(sync::SyncError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Crdt(_) => "crdt",
            Error::Driver(_) => "driver",
            Error::Sync(_) => "sync",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error is CRDT-related.
    pub fn is_crdt_error(&self) -> bool {
        matches!(self, Error::Crdt(_))
    }

    /// Check if this error reports a malformed operation.
    pub fn is_invalid_operation(&self) -> bool {
        match self {
            Error::Crdt(crdt_err) => crdt_err.is_invalid_operation(),
            _ => false,
        }
    }

    /// Check if this error is a CRDT merge failure.
    pub fn is_crdt_merge_error(&self) -> bool {
        match self {
            Error::Crdt(crdt_err) => crdt_err.is_merge_error(),
            _ => false,
        }
    }

    /// Check if this error is a CRDT serialization failure.
    pub fn is_crdt_serialization_error(&self) -> bool {
        match self {
            Error::Crdt(crdt_err) => crdt_err.is_serialization_error(),
            Error::Serialize(_) => true,
            _ => false,
        }
    }

    /// Check if this error is a CRDT type mismatch.
    pub fn is_crdt_type_error(&self) -> bool {
        match self {
            Error::Crdt(crdt_err) => crdt_err.is_type_error(),
            _ => false,
        }
    }

    /// Check if this error concerns an entity field.
    pub fn is_field_error(&self) -> bool {
        match self {
            Error::Crdt(crdt_err) => crdt_err.is_field_error(),
            _ => false,
        }
    }

    /// Check if this error came from a storage driver.
    pub fn is_driver_error(&self) -> bool {
        matches!(self, Error::Driver(_))
    }

    /// Check if this error is synchronization-related.
    pub fn is_sync_error(&self) -> bool {
        matches!(self, Error::Sync(_))
    }

    /// Check if this error indicates a timeout.
    pub fn is_timeout_error(&self) -> bool {
        match self {
            Error::Sync(sync_err) => sync_err.is_timeout(),
            _ => false,
        }
    }
}
