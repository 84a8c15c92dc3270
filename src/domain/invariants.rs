// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Resource Model Invariants
//!
//! Every check here is a pure function over the model. Synthesis runs
//! [`validate_model`] before emitting anything, so a structurally invalid
//! model never reaches the object store or the stack service.
//!
//! # Invariant Categories
//!
//! 1. **Naming**: collection keys are usable in logical ids
//! 2. **Containment**: subnets lie inside their VPC and do not overlap
//! 3. **Variant attributes**: provisioned-IOPS volumes carry an IOPS value
//! 4. **References**: bootstrap add-ons name existing subnets

use std::collections::BTreeMap;

use super::resource_model::{Bootstrap, Instance, ResourceModel, Subnet, Volume, Vpc};
use super::DnsName;

/// Maximum volume size in GiB
pub const MAX_VOLUME_SIZE: u32 = 16_384;

/// Structurally invalid resource model
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),

    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(String),

    #[error("Invalid volume type: {0}")]
    InvalidVolumeType(String),

    #[error("Invalid {kind} name: '{name}'")]
    InvalidName { kind: &'static str, name: String },

    #[error("{path}: missing required attribute '{attribute}'")]
    MissingAttribute { path: String, attribute: &'static str },

    #[error("{path}: provisioned-IOPS volume requires an iops value")]
    MissingIops { path: String },

    #[error("{path}: volume size {size} outside 1..=16384 GiB")]
    InvalidVolumeSize { path: String, size: u32 },

    #[error("{path}: subnet {subnet} is outside VPC block {vpc}")]
    SubnetOutsideVpc {
        path: String,
        subnet: String,
        vpc: String,
    },

    #[error("Subnets {first} and {second} overlap")]
    OverlappingSubnets { first: String, second: String },

    #[error("{path}: unknown reference '{reference}'")]
    UnknownReference { path: String, reference: String },

    #[error("{addon}: subnet '{subnet}' must be public")]
    SubnetNotPublic { addon: &'static str, subnet: String },

    #[error("Region '{0}' has no entry in the region map")]
    UnsupportedRegion(String),

    #[error("{path}: region {actual} does not match stack region {expected}")]
    RegionMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Logical id {id} derived from both {first} and {second}")]
    DuplicateLogicalId {
        id: String,
        first: String,
        second: String,
    },
}

/// Validate a collection key
///
/// # Rules
/// - Non-empty
/// - ASCII alphanumerics, `-` and `_` only
pub fn validate_name(kind: &'static str, name: &str) -> Result<(), ModelError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !valid {
        return Err(ModelError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Validate a relative artifact path such as `nested/db.json`
///
/// # Rules
/// - Every `/`-separated segment is a valid name, optionally with `.`
/// - No empty, `.` or `..` segments, so the key stays under its root
pub fn validate_relative_path(kind: &'static str, path: &str) -> Result<(), ModelError> {
    let invalid = || ModelError::InvalidName {
        kind,
        name: path.to_string(),
    };

    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Err(invalid());
    }
    for segment in trimmed.split('/') {
        let valid = !segment.is_empty()
            && segment != "."
            && segment != ".."
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(invalid());
        }
    }
    Ok(())
}

fn require(path: &str, attribute: &'static str, value: &str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(ModelError::MissingAttribute {
            path: path.to_string(),
            attribute,
        });
    }
    Ok(())
}

/// Validate a whole model, top-down
pub fn validate_model(model: &ResourceModel) -> Result<(), ModelError> {
    for (name, vpc) in &model.vpcs {
        validate_name("vpc", name)?;
        validate_vpc(name, vpc, model.bootstrap.as_ref())?;
    }

    if let Some(bootstrap) = &model.bootstrap {
        validate_bootstrap(bootstrap, &model.vpcs)?;
    }

    Ok(())
}

fn validate_vpc(path: &str, vpc: &Vpc, bootstrap: Option<&Bootstrap>) -> Result<(), ModelError> {
    require(path, "region", &vpc.region)?;

    let subnets: Vec<_> = vpc.subnets.iter().collect();
    for (i, (name, subnet)) in subnets.iter().enumerate() {
        validate_name("subnet", name)?;
        let subnet_path = format!("{}/{}", path, name);

        // Invariant: subnet lies inside its VPC
        if !vpc.cidr.contains(&subnet.cidr) {
            return Err(ModelError::SubnetOutsideVpc {
                path: subnet_path,
                subnet: subnet.cidr.to_string(),
                vpc: vpc.cidr.to_string(),
            });
        }

        // Invariant: sibling subnets are disjoint
        for (other_name, other) in &subnets[i + 1..] {
            if subnet.cidr.overlaps(&other.cidr) {
                return Err(ModelError::OverlappingSubnets {
                    first: subnet_path,
                    second: format!("{}/{}", path, other_name),
                });
            }
        }

        validate_subnet(&subnet_path, subnet, bootstrap)?;
    }

    Ok(())
}

fn validate_subnet(
    path: &str,
    subnet: &Subnet,
    bootstrap: Option<&Bootstrap>,
) -> Result<(), ModelError> {
    require(path, "availability_zone", &subnet.availability_zone)?;

    for (name, instance) in &subnet.instances {
        validate_name("instance", name)?;
        validate_instance(&format!("{}/{}", path, name), instance, bootstrap)?;
    }
    Ok(())
}

fn validate_instance(
    path: &str,
    instance: &Instance,
    bootstrap: Option<&Bootstrap>,
) -> Result<(), ModelError> {
    require(path, "instance_type", &instance.instance_type)?;

    if let Some(sub_domain) = &instance.sub_domain {
        let zone = bootstrap
            .and_then(|b| b.hosted_zone_name.as_ref())
            .ok_or_else(|| ModelError::MissingAttribute {
                path: path.to_string(),
                attribute: "hosted_zone_name",
            })?;
        zone.with_label(sub_domain)?;
    }

    for (name, volume) in &instance.volumes {
        validate_name("volume", name)?;
        validate_volume(&format!("{}/{}", path, name), volume)?;
    }
    Ok(())
}

/// Validate a single volume
///
/// # Rules
/// - Device name present
/// - Size within provider bounds
/// - Provisioned-IOPS types carry a positive IOPS value
pub fn validate_volume(path: &str, volume: &Volume) -> Result<(), ModelError> {
    require(path, "device", &volume.device)?;

    if volume.size == 0 || volume.size > MAX_VOLUME_SIZE {
        return Err(ModelError::InvalidVolumeSize {
            path: path.to_string(),
            size: volume.size,
        });
    }

    if volume.volume_type.is_provisioned_iops() && !matches!(volume.iops, Some(n) if n > 0) {
        return Err(ModelError::MissingIops {
            path: path.to_string(),
        });
    }

    Ok(())
}

fn validate_bootstrap(
    bootstrap: &Bootstrap,
    vpcs: &BTreeMap<String, Vpc>,
) -> Result<(), ModelError> {
    let vpc = vpcs
        .get(&bootstrap.vpc)
        .ok_or_else(|| ModelError::UnknownReference {
            path: "bootstrap".to_string(),
            reference: bootstrap.vpc.clone(),
        })?;

    if !bootstrap.has_addons() {
        return Ok(());
    }

    // Add-ons are synthesized against the hosted zone identity
    let zone = bootstrap
        .hosted_zone_name
        .as_ref()
        .ok_or_else(|| ModelError::MissingAttribute {
            path: "bootstrap".to_string(),
            attribute: "hosted_zone_name",
        })?;
    require(
        "bootstrap",
        "hosted_zone_id",
        bootstrap.hosted_zone_id.as_deref().unwrap_or(""),
    )?;

    if let Some(nat) = &bootstrap.nat {
        require_subnet(vpc, "nat", &nat.subnet, true)?;
        require("bootstrap/nat", "instance_type", &nat.instance_type)?;
    }

    if let Some(bastion) = &bootstrap.bastion {
        require_subnet(vpc, "bastion", &bastion.subnet, true)?;
        require("bootstrap/bastion", "instance_type", &bastion.instance_type)?;
        require_label(zone, &bastion.sub_domain)?;
    }

    if let Some(chef) = &bootstrap.chef_server {
        require_subnet(vpc, "chef_server", &chef.subnet, false)?;
        require("bootstrap/chef_server", "instance_type", &chef.instance_type)?;
        require("bootstrap/chef_server", "organization", &chef.organization)?;
        require("bootstrap/chef_server", "username", &chef.username)?;
        require_label(zone, &chef.sub_domain)?;
    }

    Ok(())
}

fn require_subnet(
    vpc: &Vpc,
    addon: &'static str,
    subnet: &str,
    must_be_public: bool,
) -> Result<(), ModelError> {
    let found = vpc
        .subnets
        .get(subnet)
        .ok_or_else(|| ModelError::UnknownReference {
            path: format!("bootstrap/{}", addon),
            reference: subnet.to_string(),
        })?;

    if must_be_public && !found.public {
        return Err(ModelError::SubnetNotPublic {
            addon,
            subnet: subnet.to_string(),
        });
    }
    Ok(())
}

fn require_label(zone: &DnsName, sub_domain: &str) -> Result<(), ModelError> {
    zone.with_label(sub_domain).map(|_| ())
}
