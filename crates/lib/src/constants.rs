//! Constants used throughout the converge library.
//!
//! Wire-format markers and storage-key syntax live here so that every module
//! agrees on them.

/// Value of the `_v` field written into every [`Literal`](crate::crdt::Literal).
pub const LITERAL_FORMAT_VERSION: u8 = 0;

/// Storage protocol served by the in-process volatile store.
pub const VOLATILE_PROTOCOL: &str = "volatile";

/// Alias of [`VOLATILE_PROTOCOL`].
pub const RAMDISK_PROTOCOL: &str = "ramdisk";

/// Separates the protocol from the namespace in a storage key.
pub const PROTOCOL_SEPARATOR: &str = "://";

/// Separates the namespace from the location in a storage key.
pub const LOCATION_SEPARATOR: &str = "^^";

/// Default bound for [`HoldQueue::enqueue_and_wait`](crate::sync::HoldQueue::enqueue_and_wait), in milliseconds.
pub const DEFAULT_RELEASE_TIMEOUT_MS: u64 = 30_000;
