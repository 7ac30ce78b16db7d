//! Storage keys of the form `protocol://namespace^^location`.

use std::fmt;
use std::str::FromStr;

use crate::constants::{LOCATION_SEPARATOR, PROTOCOL_SEPARATOR};
use crate::driver::errors::DriverError;

/// A parsed storage key.
///
/// The namespace groups keys that share one backing store; the optional location
/// names an entry inside it.
///
/// ```
/// use converge::driver::StorageKey;
///
/// let key: StorageKey = "volatile://arc-1^^handle-7".parse().unwrap();
/// assert_eq!(key.protocol(), "volatile");
/// assert_eq!(key.namespace(), "arc-1");
/// assert_eq!(key.location(), Some("handle-7"));
/// assert_eq!(key.to_string(), "volatile://arc-1^^handle-7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    protocol: String,
    namespace: String,
    location: Option<String>,
}

impl StorageKey {
    pub fn new(protocol: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            namespace: namespace.into(),
            location: None,
        }
    }

    /// A key for `location` inside this key's namespace.
    pub fn child(&self, location: impl Into<String>) -> Self {
        Self {
            protocol: self.protocol.clone(),
            namespace: self.namespace.clone(),
            location: Some(location.into()),
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

impl FromStr for StorageKey {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DriverError::InvalidStorageKey {
            key: s.to_string(),
            reason: reason.to_string(),
        };
        let (protocol, rest) = s
            .split_once(PROTOCOL_SEPARATOR)
            .ok_or_else(|| invalid("missing protocol separator"))?;
        if protocol.is_empty() {
            return Err(invalid("empty protocol"));
        }
        let (namespace, location) = match rest.split_once(LOCATION_SEPARATOR) {
            Some((namespace, location)) => {
                if location.is_empty() {
                    return Err(invalid("empty location"));
                }
                (namespace, Some(location.to_string()))
            }
            None => (rest, None),
        };
        if namespace.is_empty() {
            return Err(invalid("empty namespace"));
        }
        Ok(Self {
            protocol: protocol.to_string(),
            namespace: namespace.to_string(),
            location,
        })
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{PROTOCOL_SEPARATOR}{}", self.protocol, self.namespace)?;
        if let Some(location) = &self.location {
            write!(f, "{LOCATION_SEPARATOR}{location}")?;
        }
        Ok(())
    }
}
