// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Template Synthesis
//!
//! Generated models always validate, so every property here runs against
//! a successful synthesis.

use std::collections::BTreeMap;

use cim_formation::domain::{Cidr, Instance, ResourceModel, Subnet, Volume, VolumeType, Vpc};
use cim_formation::template::{logical_id, synthesize};
use proptest::prelude::*;

// ============================================================================
// Model Strategies
// ============================================================================

type Volumes = BTreeMap<String, Volume>;
type Instances = BTreeMap<String, Volumes>;
type Subnets = BTreeMap<String, (bool, Instances)>;

fn segment() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn volume() -> impl Strategy<Value = Volume> {
    prop_oneof![
        (1u32..1000).prop_map(|size| Volume::new("/dev/sdf", size, VolumeType::Gp2)),
        (1u32..1000).prop_map(|size| Volume::new("/dev/sdg", size, VolumeType::Gp3)),
        (1u32..1000, 100u32..5000)
            .prop_map(|(size, iops)| Volume::new("/dev/sdh", size, VolumeType::Io1).with_iops(iops)),
    ]
}

fn subnets() -> impl Strategy<Value = Subnets> {
    let volumes = prop::collection::btree_map(segment(), volume(), 0..3);
    let instances = prop::collection::btree_map(segment(), volumes, 0..3);
    prop::collection::btree_map(segment(), (any::<bool>(), instances), 1..4)
}

/// One VPC; subnets get consecutive /24 blocks in name order
fn build(subnets: &Subnets) -> ResourceModel {
    let mut vpc = Vpc::new(Cidr::new("10.0.0.0/16").unwrap(), "us-east-1");
    for (index, (name, (public, instances))) in subnets.iter().enumerate() {
        let block = Cidr::new(format!("10.0.{}.0/24", index)).unwrap();
        let mut subnet = Subnet::new(block, "a");
        if *public {
            subnet = subnet.public();
        }
        for (instance_name, volumes) in instances {
            let mut instance = Instance::new("t3.small");
            for (volume_name, volume) in volumes {
                instance = instance.with_volume(volume_name.clone(), volume.clone());
            }
            subnet = subnet.with_instance(instance_name.clone(), instance);
        }
        vpc = vpc.with_subnet(name.clone(), subnet);
    }
    ResourceModel::new().with_vpc("main", vpc)
}

fn volume_count(subnets: &Subnets) -> usize {
    subnets
        .values()
        .flat_map(|(_, instances)| instances.values())
        .map(|volumes| volumes.len())
        .sum()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Property: synthesis is deterministic
    ///
    /// The same model renders to byte-identical JSON every time.
    #[test]
    fn prop_synthesis_is_deterministic(subnets in subnets()) {
        let model = build(&subnets);
        let first = synthesize(&model).unwrap().to_json_pretty().unwrap();
        let second = synthesize(&model.clone()).unwrap().to_json_pretty().unwrap();

        prop_assert_eq!(first, second);
    }

    /// Property: one resource per model element
    ///
    /// Every subnet, instance and volume yields exactly one resource of its
    /// type, and every volume exactly one attachment.
    #[test]
    fn prop_resource_counts_match_model(subnets in subnets()) {
        let template = synthesize(&build(&subnets)).unwrap();
        let instances: usize = subnets.values().map(|(_, i)| i.len()).sum();

        prop_assert_eq!(template.resources_of_type("AWS::EC2::Subnet").count(), subnets.len());
        prop_assert_eq!(template.resources_of_type("AWS::EC2::Instance").count(), instances);
        prop_assert_eq!(template.resources_of_type("AWS::EC2::Volume").count(), volume_count(&subnets));
        prop_assert_eq!(
            template.resources_of_type("AWS::EC2::VolumeAttachment").count(),
            volume_count(&subnets)
        );
    }

    /// Property: ownership references point at the owner's logical id
    #[test]
    fn prop_ownership_references_resolve(subnets in subnets()) {
        let template = synthesize(&build(&subnets)).unwrap();

        for (subnet, (_, instances)) in &subnets {
            for (instance, volumes) in instances {
                let id = logical_id::instance("main", subnet, instance);
                let body = template.resource(&id).unwrap();
                let subnet_id = logical_id::subnet("main", subnet);
                prop_assert_eq!(
                    body["Properties"]["SubnetId"]["Ref"].as_str(),
                    Some(subnet_id.as_str())
                );

                for volume in volumes.keys() {
                    let attachment = template
                        .resource(&logical_id::volume_attachment("main", subnet, instance, volume))
                        .unwrap();
                    prop_assert_eq!(
                        attachment["Properties"]["InstanceId"]["Ref"].as_str(),
                        Some(id.as_str())
                    );
                }
            }
        }
    }

    /// Property: an internet gateway exists exactly when a subnet is public
    #[test]
    fn prop_gateway_only_with_public_subnet(subnets in subnets()) {
        let template = synthesize(&build(&subnets)).unwrap();
        let any_public = subnets.values().any(|(public, _)| *public);

        prop_assert_eq!(
            template.resources_of_type("AWS::EC2::InternetGateway").count(),
            usize::from(any_public)
        );
    }
}
