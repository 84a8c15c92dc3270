// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Model
//!
//! Owned tree describing one target's desired infrastructure:
//!
//! ```text
//! ResourceModel
//! ├── vpcs: name → Vpc
//! │   └── subnets: name → Subnet
//! │       └── instances: name → Instance
//! │           └── volumes: name → Volume
//! └── bootstrap: Option<Bootstrap>   (hosted zone + NAT / bastion / chef server)
//! ```
//!
//! Ownership is strictly by containment. Collections are name-keyed
//! `BTreeMap`s so iteration order, and therefore synthesis output, is stable.
//! Records are populated by the configuration front-end through the
//! `with_*` builders and validated by [`ResourceModel::validate`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::invariants::{self, ModelError};
use super::{Cidr, DnsName, VolumeType};

/// Root of the resource tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceModel {
    /// VPCs by name
    #[serde(default)]
    pub vpcs: BTreeMap<String, Vpc>,

    /// Bootstrap services, sibling of the VPCs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<Bootstrap>,
}

impl ResourceModel {
    /// Empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a VPC
    pub fn with_vpc(mut self, name: impl Into<String>, vpc: Vpc) -> Self {
        self.vpcs.insert(name.into(), vpc);
        self
    }

    /// Set the bootstrap node
    pub fn with_bootstrap(mut self, bootstrap: Bootstrap) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    /// Check every structural invariant of the tree
    pub fn validate(&self) -> Result<(), ModelError> {
        invariants::validate_model(self)
    }
}

/// Virtual network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vpc {
    pub cidr: Cidr,
    pub region: String,
    #[serde(default)]
    pub subnets: BTreeMap<String, Subnet>,
}

impl Vpc {
    pub fn new(cidr: Cidr, region: impl Into<String>) -> Self {
        Self {
            cidr,
            region: region.into(),
            subnets: BTreeMap::new(),
        }
    }

    pub fn with_subnet(mut self, name: impl Into<String>, subnet: Subnet) -> Self {
        self.subnets.insert(name.into(), subnet);
        self
    }

    /// Whether any subnet routes through the internet gateway
    pub fn has_public_subnet(&self) -> bool {
        self.subnets.values().any(|s| s.public)
    }
}

/// Subnet inside a VPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub cidr: Cidr,

    /// Single-letter zone suffix (joined with the region) or full zone name
    pub availability_zone: String,

    #[serde(default)]
    pub public: bool,

    #[serde(default)]
    pub instances: BTreeMap<String, Instance>,
}

impl Subnet {
    pub fn new(cidr: Cidr, availability_zone: impl Into<String>) -> Self {
        Self {
            cidr,
            availability_zone: availability_zone.into(),
            public: false,
            instances: BTreeMap::new(),
        }
    }

    /// Mark the subnet as routed through the internet gateway
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn with_instance(mut self, name: impl Into<String>, instance: Instance) -> Self {
        self.instances.insert(name.into(), instance);
        self
    }
}

/// Compute instance inside a subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_type: String,

    /// Explicit machine image; the region map base image otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Label under the bootstrap hosted zone for a private host record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_domain: Option<String>,

    #[serde(default)]
    pub volumes: BTreeMap<String, Volume>,
}

impl Instance {
    pub fn new(instance_type: impl Into<String>) -> Self {
        Self {
            instance_type: instance_type.into(),
            image: None,
            role: None,
            sub_domain: None,
            volumes: BTreeMap::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_sub_domain(mut self, sub_domain: impl Into<String>) -> Self {
        self.sub_domain = Some(sub_domain.into());
        self
    }

    pub fn with_volume(mut self, name: impl Into<String>, volume: Volume) -> Self {
        self.volumes.insert(name.into(), volume);
        self
    }
}

/// Block volume attached to an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub device: String,

    /// Size in GiB
    pub size: u32,

    #[serde(rename = "type")]
    pub volume_type: VolumeType,

    /// Only meaningful for provisioned-IOPS types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iops: Option<u32>,
}

impl Volume {
    pub fn new(device: impl Into<String>, size: u32, volume_type: VolumeType) -> Self {
        Self {
            device: device.into(),
            size,
            volume_type,
            iops: None,
        }
    }

    pub fn with_iops(mut self, iops: u32) -> Self {
        self.iops = Some(iops);
        self
    }

    /// IOPS as it should appear in a template, if at all
    pub fn effective_iops(&self) -> Option<u32> {
        if self.volume_type.is_provisioned_iops() {
            self.iops
        } else {
            None
        }
    }
}

/// Bootstrap services for a target's network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bootstrap {
    /// Name of the VPC these services live in
    pub vpc: String,

    /// Existing public hosted zone id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone_id: Option<String>,

    /// Zone name, shared by the public zone and the synthesized private zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone_name: Option<DnsName>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat: Option<NatSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bastion: Option<BastionSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chef_server: Option<ChefServerSpec>,
}

impl Bootstrap {
    pub fn new(vpc: impl Into<String>) -> Self {
        Self {
            vpc: vpc.into(),
            hosted_zone_id: None,
            hosted_zone_name: None,
            nat: None,
            bastion: None,
            chef_server: None,
        }
    }

    pub fn with_hosted_zone(mut self, id: impl Into<String>, name: DnsName) -> Self {
        self.hosted_zone_id = Some(id.into());
        self.hosted_zone_name = Some(name);
        self
    }

    pub fn with_nat(mut self, nat: NatSpec) -> Self {
        self.nat = Some(nat);
        self
    }

    pub fn with_bastion(mut self, bastion: BastionSpec) -> Self {
        self.bastion = Some(bastion);
        self
    }

    pub fn with_chef_server(mut self, chef_server: ChefServerSpec) -> Self {
        self.chef_server = Some(chef_server);
        self
    }

    /// Whether any add-on is switched on
    pub fn has_addons(&self) -> bool {
        self.nat.is_some() || self.bastion.is_some() || self.chef_server.is_some()
    }
}

fn default_nat_instance_type() -> String {
    "t2.micro".to_string()
}

fn default_bastion_instance_type() -> String {
    "t2.micro".to_string()
}

fn default_chef_instance_type() -> String {
    "t2.medium".to_string()
}

/// Network address translation instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatSpec {
    /// Public subnet hosting the NAT instance
    pub subnet: String,

    #[serde(default = "default_nat_instance_type")]
    pub instance_type: String,
}

impl NatSpec {
    pub fn new(subnet: impl Into<String>) -> Self {
        Self {
            subnet: subnet.into(),
            instance_type: default_nat_instance_type(),
        }
    }
}

/// SSH jump host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BastionSpec {
    /// Public subnet hosting the bastion
    pub subnet: String,

    pub sub_domain: String,

    #[serde(default = "default_bastion_instance_type")]
    pub instance_type: String,
}

impl BastionSpec {
    pub fn new(subnet: impl Into<String>, sub_domain: impl Into<String>) -> Self {
        Self {
            subnet: subnet.into(),
            sub_domain: sub_domain.into(),
            instance_type: default_bastion_instance_type(),
        }
    }
}

/// Configuration-management server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChefServerSpec {
    pub subnet: String,

    pub sub_domain: String,

    pub organization: String,

    pub username: String,

    #[serde(default = "default_chef_instance_type")]
    pub instance_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ChefServerSpec {
    pub fn new(
        subnet: impl Into<String>,
        sub_domain: impl Into<String>,
        organization: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            subnet: subnet.into(),
            sub_domain: sub_domain.into(),
            organization: organization.into(),
            username: username.into(),
            instance_type: default_chef_instance_type(),
            version: None,
        }
    }
}
