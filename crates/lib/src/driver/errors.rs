//! Driver error types.
//!
//! Driver failures are propagated to callers unchanged; this crate performs no
//! retries of its own.

use thiserror::Error;

use super::hooked::DriverOp;

/// Errors that can occur during driver operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DriverError {
    /// The backend could not be reached or refused the request.
    #[error("Storage backend unavailable: {reason}")]
    Unavailable {
        /// Description of the failure
        reason: String,
    },

    /// A hook installed on a [`HookedDriver`](super::HookedDriver) failed the operation.
    #[error("Driver hook failed {operation:?}: {reason}")]
    HookFailed {
        /// The operation that was about to run
        operation: DriverOp,
        /// Description supplied by the hook
        reason: String,
    },

    /// A storage key could not be parsed.
    #[error("Invalid storage key {key}: {reason}")]
    InvalidStorageKey {
        /// The rejected key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// The key's protocol is not served by this driver.
    #[error("Unsupported storage protocol: {protocol}")]
    UnsupportedProtocol {
        /// The protocol named by the key
        protocol: String,
    },
}

impl DriverError {
    /// Check if this error reports an unreachable backend.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DriverError::Unavailable { .. })
    }

    /// Check if this error was injected by a driver hook.
    pub fn is_hook_failure(&self) -> bool {
        matches!(self, DriverError::HookFailed { .. })
    }

    /// Check if this error is about a malformed or unsupported key.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            DriverError::InvalidStorageKey { .. } | DriverError::UnsupportedProtocol { .. }
        )
    }
}

// Conversion from DriverError to the main Error type
impl From<DriverError> for crate::Error {
    fn from(err: DriverError) -> Self {
        crate::Error::Driver(err)
    }
}
