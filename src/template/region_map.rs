// Copyright (c) 2025 - Cowboy AI, Inc.
//! Region-dependent machine images

use serde_json::{json, Map, Value};

/// Name of the mapping in every synthesized template
pub const REGION_MAP: &str = "RegionMap";

/// Mapping key for the default host image
pub const BASE_AMI: &str = "baseAmi";

/// Mapping key for the NAT instance image
pub const NAT_AMI: &str = "natAmi";

/// (region, base image, NAT image)
const REGIONS: &[(&str, &str, &str)] = &[
    ("ap-northeast-1", "ami-936d9d93", "ami-27d6e626"),
    ("ap-southeast-1", "ami-96f1c1c4", "ami-b49dace6"),
    ("ap-southeast-2", "ami-69631053", "ami-e7ee9edd"),
    ("eu-central-1", "ami-accff2b1", "ami-46073a5b"),
    ("eu-west-1", "ami-47a23a30", "ami-6975eb1e"),
    ("sa-east-1", "ami-4d883350", "ami-fbfa41e6"),
    ("us-east-1", "ami-d05e75b8", "ami-303b1458"),
    ("us-west-1", "ami-df6a8b9b", "ami-7da94839"),
    ("us-west-2", "ami-5189a661", "ami-69ae8259"),
];

/// Whether the region has images in the map
pub fn is_supported(region: &str) -> bool {
    REGIONS.iter().any(|(name, _, _)| *name == region)
}

/// Base image for a region
pub fn base_ami(region: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|(name, _, _)| *name == region)
        .map(|(_, base, _)| *base)
}

/// The `RegionMap` mapping body
pub fn mapping() -> Value {
    let entries: Map<String, Value> = REGIONS
        .iter()
        .map(|(region, base, nat)| {
            (
                region.to_string(),
                json!({ BASE_AMI: base, NAT_AMI: nat }),
            )
        })
        .collect();
    Value::Object(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_regions() {
        assert!(is_supported("us-east-1"));
        assert!(!is_supported("mars-north-1"));
        assert_eq!(base_ami("eu-west-1"), Some("ami-47a23a30"));
    }

    #[test]
    fn test_mapping_shape() {
        let map = mapping();
        assert_eq!(map["us-west-2"][NAT_AMI], "ami-69ae8259");
        assert_eq!(map.as_object().unwrap().len(), REGIONS.len());
    }
}
