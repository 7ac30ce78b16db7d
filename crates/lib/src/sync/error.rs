//! Error types for the synchronization module.

use thiserror::Error;

use crate::crdt::ReferenceId;
use crate::sync::hold_queue::RecordId;

/// Errors that can occur while sequencing dependent records.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// A bounded wait ran out before every reference caught up.
    ///
    /// The record has been cancelled; its callback will not run.
    #[error("Hold record {record} timed out waiting for {outstanding:?}")]
    HoldTimeout {
        record: RecordId,
        /// References that were still behind when the wait ended
        outstanding: Vec<ReferenceId>,
    },

    /// The record was cancelled while a caller was waiting on it.
    #[error("Hold record {record} was cancelled")]
    HoldCancelled { record: RecordId },
}

impl SyncError {
    /// Check if this is a hold-queue timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::HoldTimeout { .. })
    }

    /// Check if the awaited record was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::HoldCancelled { .. })
    }

    /// References still outstanding when the wait failed, if known.
    pub fn outstanding(&self) -> &[ReferenceId] {
        match self {
            SyncError::HoldTimeout { outstanding, .. } => outstanding,
            SyncError::HoldCancelled { .. } => &[],
        }
    }
}

// Conversion from SyncError to the main Error type
impl From<SyncError> for crate::Error {
    fn from(err: SyncError) -> Self {
        crate::Error::Sync(err)
    }
}
