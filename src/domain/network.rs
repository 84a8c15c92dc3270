// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use super::ModelError;

/// IPv4 CIDR block value object
///
/// Invariants:
/// - Valid dotted-quad address
/// - Prefix length 0..=32
/// - No host bits set below the prefix
///
/// # Examples
///
/// ```rust
/// use cim_formation::domain::Cidr;
///
/// let vpc = Cidr::new("10.0.0.0/16").unwrap();
/// let subnet = Cidr::new("10.0.1.0/24").unwrap();
/// assert!(vpc.contains(&subnet));
/// assert!(Cidr::new("10.0.1.7/24").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    address: Ipv4Addr,
    prefix_length: u8,
}

impl Cidr {
    /// Parse a CIDR block such as `10.0.0.0/16`
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, ModelError> {
        let cidr = cidr.as_ref();
        let invalid = || ModelError::InvalidCidr(cidr.to_string());

        let (addr_str, prefix_str) = cidr.split_once('/').ok_or_else(invalid)?;
        let address = Ipv4Addr::from_str(addr_str).map_err(|_| invalid())?;
        let prefix_length = prefix_str.parse::<u8>().map_err(|_| invalid())?;

        if prefix_length > 32 {
            return Err(invalid());
        }

        let block = Self {
            address,
            prefix_length,
        };

        // Invariant: address is the network address of the block
        if u32::from(address) & !block.mask() != 0 {
            return Err(invalid());
        }

        Ok(block)
    }

    /// Network address
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Prefix length
    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    fn mask(&self) -> u32 {
        if self.prefix_length == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix_length))
        }
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains(&self, other: &Cidr) -> bool {
        other.prefix_length >= self.prefix_length
            && (u32::from(other.address) & self.mask()) == u32::from(self.address)
    }

    /// Whether the two blocks share any address
    pub fn overlaps(&self, other: &Cidr) -> bool {
        self.contains(other) || other.contains(self)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}

impl FromStr for Cidr {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Cidr {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Cidr> for String {
    fn from(value: Cidr) -> Self {
        value.to_string()
    }
}
