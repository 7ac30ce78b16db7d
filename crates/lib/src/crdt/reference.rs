//! Pointers from one stored entity to another.

use serde::{Deserialize, Serialize};

use crate::crdt::orset::ReferenceId;
use crate::crdt::traits::Referenceable;
use crate::crdt::version::VersionVector;
use crate::sync::HeldReference;

/// A reference to an entity stored elsewhere, valid relative to `version`.
///
/// A consumer holding a `Reference` should not dereference it before the target
/// has caught up to `version`; [`Reference::hold_requirement`] produces the entry
/// a [`HoldQueue`](crate::sync::HoldQueue) gates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: ReferenceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    #[serde(default)]
    pub version: VersionVector,
}

impl Reference {
    pub fn new(id: impl Into<ReferenceId>) -> Self {
        Self {
            id: id.into(),
            storage_key: None,
            version: VersionVector::new(),
        }
    }

    pub fn with_storage_key(mut self, storage_key: impl Into<String>) -> Self {
        self.storage_key = Some(storage_key.into());
        self
    }

    pub fn with_version(mut self, version: VersionVector) -> Self {
        self.version = version;
        self
    }

    /// The hold-queue entry stating that the target must reach `version`.
    pub fn hold_requirement(&self) -> HeldReference {
        HeldReference::new(self.id.clone(), self.version.clone())
    }
}

impl Referenceable for Reference {
    fn id(&self) -> &str {
        &self.id
    }
}
