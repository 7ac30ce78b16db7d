//! Plain, JSON-compatible literals for moving CRDT state between processes.
//!
//! Every data payload and operation is wrapped in a [`Literal`] envelope that
//! names its shape explicitly and carries a format version:
//!
//! ```json
//! { "_v": 0, "kind": "count", "payload": { "values": {}, "version": {} } }
//! ```
//!
//! Decoding never guesses the shape from the payload; a `kind` mismatch is an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::constants::LITERAL_FORMAT_VERSION;
use crate::crdt::errors::CrdtError;

/// The transport envelope for a CRDT payload or operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    /// Literal format version for compatibility checking
    #[serde(rename = "_v")]
    pub format: u8,
    /// Stable discriminator of the wrapped shape
    pub kind: String,
    pub payload: serde_json::Value,
}

impl Literal {
    /// Serializes the literal to its JSON string form.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a literal from its JSON string form.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Types with a lossless literal form.
pub trait Literalize: Serialize + DeserializeOwned {
    /// Stable shape name written into [`Literal::kind`].
    const KIND: &'static str;

    fn to_literal(&self) -> Result<Literal> {
        let payload =
            serde_json::to_value(self).map_err(|e| CrdtError::SerializationFailed {
                reason: format!("{}: {e}", Self::KIND),
            })?;
        Ok(Literal {
            format: LITERAL_FORMAT_VERSION,
            kind: Self::KIND.to_string(),
            payload,
        })
    }

    fn from_literal(literal: &Literal) -> Result<Self> {
        if literal.format != LITERAL_FORMAT_VERSION {
            return Err(CrdtError::DeserializationFailed {
                reason: format!(
                    "unsupported literal version {}; only version {LITERAL_FORMAT_VERSION} is supported",
                    literal.format
                ),
            }
            .into());
        }
        if literal.kind != Self::KIND {
            return Err(CrdtError::TypeMismatch {
                expected: Self::KIND.to_string(),
                actual: literal.kind.clone(),
            }
            .into());
        }
        serde_json::from_value(literal.payload.clone()).map_err(|e| {
            CrdtError::DeserializationFailed {
                reason: format!("{}: {e}", Self::KIND),
            }
            .into()
        })
    }
}
