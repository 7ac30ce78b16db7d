//! Error types for CRDT operations.
//!
//! Only programming errors and irreconcilable states are reported here. A stale
//! operation is not an error: `apply_operation` returns `Ok(false)` for it.

use thiserror::Error;

/// Structured error types for CRDT operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CrdtError {
    /// The operation is malformed (empty token list, backwards version range, ...).
    #[error("Invalid CRDT operation: {reason}")]
    InvalidOperation { reason: String },

    /// Two replicas disagree about an actor's history.
    #[error("Divergent versions for actor {actor} while merging {kind}")]
    DivergentVersions { kind: &'static str, actor: String },

    /// A field-scoped operation named a field the entity does not declare.
    #[error("Unknown entity field: {field}")]
    UnknownField { field: String },

    /// A field-scoped operation targeted a field of the other kind.
    #[error("Field {field} is not a {expected} field")]
    FieldKindMismatch {
        field: String,
        expected: &'static str,
    },

    /// A field was declared more than once when building an entity.
    #[error("Duplicate entity field: {field}")]
    DuplicateField { field: String },

    /// Merge could not be completed.
    #[error("CRDT merge failed: {reason}")]
    MergeFailed { reason: String },

    /// A literal carried a different shape than the one requested.
    #[error("CRDT type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Serialization of CRDT data failed.
    #[error("CRDT serialization failed: {reason}")]
    SerializationFailed { reason: String },

    /// Deserialization of CRDT data failed.
    #[error("CRDT deserialization failed: {reason}")]
    DeserializationFailed { reason: String },
}

impl CrdtError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        CrdtError::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Check if this error is a rejected operation shape.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, CrdtError::InvalidOperation { .. })
    }

    /// Check if this error is related to merge operations
    pub fn is_merge_error(&self) -> bool {
        matches!(
            self,
            CrdtError::MergeFailed { .. } | CrdtError::DivergentVersions { .. }
        )
    }

    /// Check if this error is related to serialization
    pub fn is_serialization_error(&self) -> bool {
        matches!(
            self,
            CrdtError::SerializationFailed { .. } | CrdtError::DeserializationFailed { .. }
        )
    }

    /// Check if this error is related to type mismatches
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            CrdtError::TypeMismatch { .. } | CrdtError::FieldKindMismatch { .. }
        )
    }

    /// Check if this error is about entity field declarations or lookups.
    pub fn is_field_error(&self) -> bool {
        matches!(
            self,
            CrdtError::UnknownField { .. }
                | CrdtError::FieldKindMismatch { .. }
                | CrdtError::DuplicateField { .. }
        )
    }

    /// Get the field name if this is a field-related error
    pub fn field(&self) -> Option<&str> {
        match self {
            CrdtError::UnknownField { field }
            | CrdtError::FieldKindMismatch { field, .. }
            | CrdtError::DuplicateField { field } => Some(field),
            _ => None,
        }
    }
}

// Conversion from CrdtError to the main Error type
impl From<CrdtError> for crate::Error {
    fn from(err: CrdtError) -> Self {
        crate::Error::Crdt(err)
    }
}
