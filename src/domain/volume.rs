// Copyright (c) 2025 - Cowboy AI, Inc.
//! Block volume types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ModelError;

/// Block storage volume type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    /// Magnetic
    Standard,
    /// General purpose SSD
    Gp2,
    /// General purpose SSD, baseline throughput
    Gp3,
    /// Provisioned IOPS SSD
    Io1,
    /// Provisioned IOPS SSD, higher durability
    Io2,
    /// Throughput optimized HDD
    St1,
    /// Cold HDD
    Sc1,
}

impl VolumeType {
    /// Provider identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeType::Standard => "standard",
            VolumeType::Gp2 => "gp2",
            VolumeType::Gp3 => "gp3",
            VolumeType::Io1 => "io1",
            VolumeType::Io2 => "io2",
            VolumeType::St1 => "st1",
            VolumeType::Sc1 => "sc1",
        }
    }

    /// Whether the type needs an explicit IOPS value
    pub fn is_provisioned_iops(&self) -> bool {
        matches!(self, VolumeType::Io1 | VolumeType::Io2)
    }
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(VolumeType::Standard),
            "gp2" => Ok(VolumeType::Gp2),
            "gp3" => Ok(VolumeType::Gp3),
            "io1" => Ok(VolumeType::Io1),
            "io2" => Ok(VolumeType::Io2),
            "st1" => Ok(VolumeType::St1),
            "sc1" => Ok(VolumeType::Sc1),
            other => Err(ModelError::InvalidVolumeType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("gp2", VolumeType::Gp2, false ; "general purpose")]
    #[test_case("io1", VolumeType::Io1, true ; "provisioned iops")]
    #[test_case("io2", VolumeType::Io2, true ; "provisioned iops v2")]
    #[test_case("standard", VolumeType::Standard, false ; "magnetic")]
    fn test_parse(input: &str, expected: VolumeType, provisioned: bool) {
        let parsed: VolumeType = input.parse().unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.is_provisioned_iops(), provisioned);
        assert_eq!(parsed.to_string(), input);
    }

    #[test]
    fn test_unknown_type() {
        assert!(matches!(
            "ssd".parse::<VolumeType>(),
            Err(ModelError::InvalidVolumeType(_))
        ));
    }
}
