// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-formation
//!
//! Deterministic models, projects and fakes shared by the integration
//! suites. Nothing here touches a real remote service.

#![allow(dead_code)]

use std::sync::Arc;

use cim_formation::domain::{
    BastionSpec, Bootstrap, ChefServerSpec, Cidr, Dependency, DnsName, Instance, KmsKey, NatSpec,
    ParameterValue, Project, ResourceModel, Subnet, Target, Volume, VolumeType, Vpc,
};
use cim_formation::provision::RecordingRunner;
use cim_formation::stack::MemoryStackService;
use cim_formation::storage::MemoryStore;
use cim_formation::{Formation, FormationConfig};

pub const REGION: &str = "us-east-1";
pub const BUCKET: &str = "deploy-bucket";
pub const PREFIX: &str = "acme";
pub const KMS_KEY: &str = "arn:aws:kms:us-east-1:123456789012:key/test";

pub fn cidr(block: &str) -> Cidr {
    Cidr::new(block).expect("Invalid CIDR in test fixture")
}

pub fn staging() -> Target {
    Target::new("staging").expect("Invalid target in test fixture")
}

/// VPC → subnet → instance → one volume
pub fn single_instance_model(volume: Volume) -> ResourceModel {
    ResourceModel::new().with_vpc(
        "main",
        Vpc::new(cidr("10.0.0.0/16"), REGION).with_subnet(
            "app",
            Subnet::new(cidr("10.0.1.0/24"), "a").with_instance(
                "web",
                Instance::new("t3.small").with_volume("data", volume),
            ),
        ),
    )
}

/// The 20 GiB gp2 data volume
pub fn gp2_volume() -> Volume {
    Volume::new("/dev/sdf", 20, VolumeType::Gp2)
}

/// Public and private subnets with every add-on enabled
pub fn bootstrap_model() -> ResourceModel {
    ResourceModel::new()
        .with_vpc(
            "main",
            Vpc::new(cidr("10.0.0.0/16"), REGION)
                .with_subnet("public", Subnet::new(cidr("10.0.0.0/24"), "a").public())
                .with_subnet(
                    "private",
                    Subnet::new(cidr("10.0.1.0/24"), "b").with_instance(
                        "app",
                        Instance::new("t3.medium")
                            .with_role("app")
                            .with_sub_domain("app")
                            .with_volume(
                                "logs",
                                Volume::new("/dev/sdg", 100, VolumeType::Io1).with_iops(1000),
                            ),
                    ),
                ),
        )
        .with_bootstrap(
            Bootstrap::new("main")
                .with_hosted_zone(
                    "Z123EXAMPLE",
                    DnsName::new("example.com").expect("Invalid zone in test fixture"),
                )
                .with_nat(NatSpec::new("public"))
                .with_bastion(BastionSpec::new("public", "bastion"))
                .with_chef_server(ChefServerSpec::new("private", "chef", "acme", "deployer")),
        )
}

pub fn project(name: &str, model: ResourceModel) -> Project {
    Project::new(name, BUCKET, PREFIX, KmsKey::Shared(KMS_KEY.to_string()))
        .with_region(REGION)
        .with_resources(model)
        .with_config(serde_json::json!({ "owner": "platform" }))
}

/// Project that needs `keyPair` and declares a dependency on `network`
pub fn dependent_project() -> Project {
    project("web", bootstrap_model())
        .with_dependency(Dependency::new("network"))
        .with_parameter("keyPair", ParameterValue::literal("ops"))
}

pub fn quick_config() -> FormationConfig {
    FormationConfig {
        poll_interval_secs: 0,
        poll_max_attempts: 3,
        ..FormationConfig::default()
    }
}

/// Fakes plus a formation wired to them
pub struct Harness {
    pub store: MemoryStore,
    pub stacks: MemoryStackService,
    pub runner: RecordingRunner,
    pub formation: Formation,
}

pub fn harness() -> Harness {
    let store = MemoryStore::new();
    let stacks = MemoryStackService::new();
    let runner = RecordingRunner::new();
    let formation = Formation::new(
        Arc::new(store.clone()),
        Arc::new(stacks.clone()),
        quick_config(),
    )
    .with_runner(Arc::new(runner.clone()));

    Harness {
        store,
        stacks,
        runner,
        formation,
    }
}
