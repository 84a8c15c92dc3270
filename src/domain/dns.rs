// Copyright (c) 2025 - Cowboy AI, Inc.
//! DNS Name Value Object for hosted zones and host records

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ModelError;

/// Fully qualified DNS name (RFC 1123 labels)
///
/// Used for hosted-zone names and the host records add-ons publish in them.
/// A single trailing dot is accepted and dropped.
///
/// # Examples
///
/// ```rust
/// use cim_formation::domain::DnsName;
///
/// let zone = DnsName::new("example.com.").unwrap();
/// assert_eq!(zone.as_str(), "example.com");
/// assert_eq!(zone.with_label("bastion").unwrap().as_str(), "bastion.example.com");
/// assert!(DnsName::new("-bad.example.com").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DnsName(String);

impl DnsName {
    /// Maximum total length (RFC 1123)
    pub const MAX_LENGTH: usize = 253;

    /// Maximum length for a single label (RFC 1123)
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Create a DNS name with validation
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let mut name = name.into().to_ascii_lowercase();
        if name.ends_with('.') {
            name.pop();
        }

        if name.is_empty() || name.len() > Self::MAX_LENGTH {
            return Err(ModelError::InvalidDnsName(name));
        }

        if !name.split('.').all(Self::valid_label) {
            return Err(ModelError::InvalidDnsName(name));
        }

        Ok(Self(name))
    }

    fn valid_label(label: &str) -> bool {
        !label.is_empty()
            && label.len() <= Self::MAX_LABEL_LENGTH
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    }

    /// Prepend a label (or dotted sub-domain) to this name
    pub fn with_label(&self, sub_domain: &str) -> Result<Self, ModelError> {
        Self::new(format!("{}.{}", sub_domain, self.0))
    }

    /// Get as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DnsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DnsName {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DnsName> for String {
    fn from(value: DnsName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(DnsName::new("localhost").is_ok());
        assert!(DnsName::new("internal.example.com").is_ok());
        assert_eq!(DnsName::new("Example.COM").unwrap().as_str(), "example.com");
    }

    #[test]
    fn test_invalid_names() {
        assert!(DnsName::new("").is_err());
        assert!(DnsName::new(".").is_err());
        assert!(DnsName::new("a..b").is_err());
        assert!(DnsName::new("bad-.example.com").is_err());
        assert!(DnsName::new("under_score.example.com").is_err());
        assert!(DnsName::new("a".repeat(64) + ".com").is_err());
    }

    #[test]
    fn test_with_label() {
        let zone = DnsName::new("example.com").unwrap();
        assert_eq!(zone.with_label("chef").unwrap().to_string(), "chef.example.com");
        assert!(zone.with_label("-x").is_err());
    }
}
