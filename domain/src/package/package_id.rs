//! Validated package identifiers (`com.vendor.char.name`).

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fully-qualified package identity declared by a module.
///
/// Segments are separated by `.` and may contain ASCII letters, digits, `_` and `-`.
/// A single segment (e.g. a library named `shared_util`) is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw.split('.').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            });
        if valid {
            Ok(Self(raw))
        } else {
            Err(DomainError::InvalidPackageId(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading namespace segments, e.g. `com.vendor.char` for `com.vendor.char.foo`.
    pub fn namespace(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(ns, _)| ns)
    }

    /// Last segment, e.g. `foo` for `com.vendor.char.foo`.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl FromStr for PackageId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PackageId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_dotted_ids() {
        let id: PackageId = "com.vendor.char.foo".parse().unwrap();
        assert_eq!(id.namespace(), Some("com.vendor.char"));
        assert_eq!(id.short_name(), "foo");
    }

    #[test]
    fn test_accepts_single_segment() {
        let id = PackageId::new("shared_util").unwrap();
        assert_eq!(id.namespace(), None);
        assert_eq!(id.short_name(), "shared_util");
    }

    #[test]
    fn test_rejects_malformed_ids() {
        for raw in ["", ".", "com..foo", "com.foo.", "com/foo", "com foo"] {
            assert!(PackageId::new(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_serde_validates() {
        let id: PackageId = serde_json::from_str("\"com.test.a\"").unwrap();
        assert_eq!(id.as_str(), "com.test.a");
        assert!(serde_json::from_str::<PackageId>("\"bad..id\"").is_err());
    }
}
