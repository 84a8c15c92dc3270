// Copyright (c) 2025 - Cowboy AI, Inc.
//! Base traversal of the resource model
//!
//! VPC → subnet → instance → volume, emitting one or more resources per node
//! and wiring children to parents by logical-id reference. Add-ons run after
//! the traversal against the accumulated builder.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

use super::addons::{default_addons, AddonContext, SubnetRef, TemplateMutation};
use super::intrinsic::{
    find_in_region_map, get_att, join, name_tag, reference, tag, AWS_REGION,
};
use super::region_map::{self, BASE_AMI, REGION_MAP};
use super::{logical_id, string_parameter, Template, TemplateBuilder};
use crate::domain::{DnsName, Instance, ModelError, ResourceModel, Subnet, Volume, Vpc};

/// Parameters declared by every synthesized template
pub const STANDARD_PARAMETERS: &[(&str, &str)] = &[
    ("cloudformationRoot", "URL root of the published templates"),
    ("config", "Object key of the published configuration document"),
    ("kmsKey", "Encryption key for published artifacts"),
    ("name", "Project name"),
    ("opsworksStacksRootRelative", "Object key root of the cookbook bundles"),
    ("prefix", "Deployment prefix"),
    ("region", "Provider region"),
    ("s3Bucket", "Bucket holding the published artifacts"),
    ("target", "Deployment target"),
];

/// Description written into synthesized templates
pub const DEFAULT_DESCRIPTION: &str = "Formation stack";

/// Template synthesizer with an ordered list of add-ons
pub struct Synthesizer {
    description: String,
    addons: Vec<Box<dyn TemplateMutation>>,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_DESCRIPTION)
    }
}

impl Synthesizer {
    /// Synthesizer with the NAT, bastion and chef server add-ons, in that order
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            addons: default_addons(),
        }
    }

    /// Replace the add-on list
    pub fn with_addons(mut self, addons: Vec<Box<dyn TemplateMutation>>) -> Self {
        self.addons = addons;
        self
    }

    /// Synthesize a template from a model
    ///
    /// The model is validated first; nothing is emitted for an invalid model.
    pub fn synthesize(&self, model: &ResourceModel) -> Result<Template, ModelError> {
        model.validate()?;

        let mut builder = TemplateBuilder::new(&self.description);
        for (name, description) in STANDARD_PARAMETERS {
            builder.add_parameter(name, string_parameter(description));
        }
        builder.add_mapping(REGION_MAP, region_map::mapping());

        let zone = model
            .bootstrap
            .as_ref()
            .and_then(|b| b.hosted_zone_name.as_ref());

        let mut bootstrap_subnets = BTreeMap::new();
        for (name, vpc) in &model.vpcs {
            let subnets = emit_vpc(&mut builder, name, vpc, zone)?;
            if model.bootstrap.as_ref().is_some_and(|b| &b.vpc == name) {
                bootstrap_subnets = subnets;
            }
        }

        if let Some(bootstrap) = model.bootstrap.as_ref().filter(|b| b.has_addons()) {
            let context = AddonContext::new(bootstrap, bootstrap_subnets)?;
            for addon in &self.addons {
                debug!(addon = addon.name(), "Applying template add-on");
                addon.apply(&mut builder, &context)?;
            }
        }

        let template = builder.build();
        debug!(
            resources = template.resources.len(),
            outputs = template.outputs.len(),
            "Synthesized template"
        );
        Ok(template)
    }
}

/// Synthesize with the default add-on pipeline
pub fn synthesize(model: &ResourceModel) -> Result<Template, ModelError> {
    Synthesizer::default().synthesize(model)
}

/// Zone value for a subnet; single letters are joined with the stack region
fn availability_zone(zone: &str) -> Value {
    if zone.len() == 1 && zone.chars().all(|c| c.is_ascii_lowercase()) {
        join("", vec![reference(AWS_REGION), Value::String(zone.to_string())])
    } else {
        Value::String(zone.to_string())
    }
}

fn emit_vpc(
    builder: &mut TemplateBuilder,
    name: &str,
    vpc: &Vpc,
    zone: Option<&DnsName>,
) -> Result<BTreeMap<String, SubnetRef>, ModelError> {
    if !region_map::is_supported(&vpc.region) {
        return Err(ModelError::UnsupportedRegion(vpc.region.clone()));
    }

    let vpc_id = logical_id::vpc(name);
    builder.add_resource(
        &vpc_id,
        name,
        json!({
            "Type": "AWS::EC2::VPC",
            "Properties": {
                "CidrBlock": vpc.cidr.to_string(),
                "EnableDnsSupport": true,
                "EnableDnsHostnames": true,
                "Tags": [name_tag(&format!("vpc-{}", name))]
            }
        }),
    )?;
    builder.add_output(&vpc_id, reference(&vpc_id), &format!("VPC {}", name));

    if let Some(zone) = zone {
        builder.add_resource(
            &logical_id::private_hosted_zone(name),
            name,
            json!({
                "Type": "AWS::Route53::HostedZone",
                "Properties": {
                    "Name": zone.as_str(),
                    "HostedZoneConfig": { "Comment": format!("Private zone for VPC {}", name) },
                    "VPCs": [{ "VPCId": reference(&vpc_id), "VPCRegion": reference(AWS_REGION) }]
                }
            }),
        )?;
    }

    if vpc.has_public_subnet() {
        emit_internet_gateway(builder, name, &vpc_id)?;
    }

    let mut subnets = BTreeMap::new();
    for (subnet_name, subnet) in &vpc.subnets {
        let subnet_id = emit_subnet(builder, name, subnet_name, subnet, zone)?;
        subnets.insert(
            subnet_name.clone(),
            SubnetRef {
                logical_id: subnet_id,
                public: subnet.public,
            },
        );
    }
    Ok(subnets)
}

fn emit_internet_gateway(
    builder: &mut TemplateBuilder,
    vpc_name: &str,
    vpc_id: &str,
) -> Result<(), ModelError> {
    let gateway_id = logical_id::internet_gateway(vpc_name);
    let attachment_id = logical_id::internet_gateway_attachment(vpc_name);
    let route_table_id = logical_id::public_route_table(vpc_name);

    builder.add_resource(
        &gateway_id,
        vpc_name,
        json!({
            "Type": "AWS::EC2::InternetGateway",
            "Properties": { "Tags": [name_tag(&format!("igw-{}", vpc_name))] }
        }),
    )?;
    builder.add_resource(
        &attachment_id,
        vpc_name,
        json!({
            "Type": "AWS::EC2::VPCGatewayAttachment",
            "Properties": {
                "VpcId": reference(vpc_id),
                "InternetGatewayId": reference(&gateway_id)
            }
        }),
    )?;
    builder.add_resource(
        &route_table_id,
        vpc_name,
        json!({
            "Type": "AWS::EC2::RouteTable",
            "Properties": {
                "VpcId": reference(vpc_id),
                "Tags": [name_tag(&format!("public-{}", vpc_name))]
            }
        }),
    )?;
    builder.add_resource(
        &logical_id::public_route(vpc_name),
        vpc_name,
        json!({
            "Type": "AWS::EC2::Route",
            "DependsOn": attachment_id,
            "Properties": {
                "RouteTableId": reference(&route_table_id),
                "DestinationCidrBlock": "0.0.0.0/0",
                "GatewayId": reference(&gateway_id)
            }
        }),
    )
}

fn emit_subnet(
    builder: &mut TemplateBuilder,
    vpc_name: &str,
    name: &str,
    subnet: &Subnet,
    zone: Option<&DnsName>,
) -> Result<String, ModelError> {
    let path = format!("{}/{}", vpc_name, name);
    let subnet_id = logical_id::subnet(vpc_name, name);

    builder.add_resource(
        &subnet_id,
        &path,
        json!({
            "Type": "AWS::EC2::Subnet",
            "Properties": {
                "VpcId": reference(&logical_id::vpc(vpc_name)),
                "CidrBlock": subnet.cidr.to_string(),
                "AvailabilityZone": availability_zone(&subnet.availability_zone),
                "MapPublicIpOnLaunch": subnet.public,
                "Tags": [name_tag(&format!("{}-{}", vpc_name, name))]
            }
        }),
    )?;
    builder.add_output(&subnet_id, reference(&subnet_id), &format!("Subnet {}", path));

    if subnet.public {
        builder.add_resource(
            &logical_id::subnet_route_table_association(&subnet_id),
            &path,
            json!({
                "Type": "AWS::EC2::SubnetRouteTableAssociation",
                "Properties": {
                    "SubnetId": reference(&subnet_id),
                    "RouteTableId": reference(&logical_id::public_route_table(vpc_name))
                }
            }),
        )?;
    }

    for (instance_name, instance) in &subnet.instances {
        emit_instance(builder, vpc_name, name, instance_name, instance, zone)?;
    }
    Ok(subnet_id)
}

fn emit_instance(
    builder: &mut TemplateBuilder,
    vpc_name: &str,
    subnet_name: &str,
    name: &str,
    instance: &Instance,
    zone: Option<&DnsName>,
) -> Result<(), ModelError> {
    let path = format!("{}/{}/{}", vpc_name, subnet_name, name);
    let instance_id = logical_id::instance(vpc_name, subnet_name, name);

    let image = match &instance.image {
        Some(image) => Value::String(image.clone()),
        None => find_in_region_map(REGION_MAP, BASE_AMI),
    };

    let mut tags = vec![name_tag(&format!("{}-{}-{}", vpc_name, subnet_name, name))];
    if let Some(role) = &instance.role {
        tags.push(tag("Role", Value::String(role.clone())));
    }

    builder.add_resource(
        &instance_id,
        &path,
        json!({
            "Type": "AWS::EC2::Instance",
            "Properties": {
                "InstanceType": instance.instance_type,
                "ImageId": image,
                "SubnetId": reference(&logical_id::subnet(vpc_name, subnet_name)),
                "Tags": tags
            }
        }),
    )?;

    if let (Some(sub_domain), Some(zone)) = (&instance.sub_domain, zone) {
        let host = zone.with_label(sub_domain)?;
        builder.add_resource(
            &logical_id::instance_record(vpc_name, subnet_name, name),
            &path,
            json!({
                "Type": "AWS::Route53::RecordSet",
                "Properties": {
                    "HostedZoneId": reference(&logical_id::private_hosted_zone(vpc_name)),
                    "Name": host.as_str(),
                    "Type": "A",
                    "TTL": "300",
                    "ResourceRecords": [get_att(&instance_id, "PrivateIp")]
                }
            }),
        )?;
    }

    for (volume_name, volume) in &instance.volumes {
        emit_volume(builder, [vpc_name, subnet_name, name, volume_name], &instance_id, volume)?;
    }
    Ok(())
}

fn emit_volume(
    builder: &mut TemplateBuilder,
    path: [&str; 4],
    instance_id: &str,
    volume: &Volume,
) -> Result<(), ModelError> {
    let [vpc_name, subnet_name, instance_name, name] = path;
    let origin = path.join("/");
    let volume_id = logical_id::volume(vpc_name, subnet_name, instance_name, name);

    let mut properties = json!({
        "AvailabilityZone": get_att(instance_id, "AvailabilityZone"),
        "Size": volume.size,
        "VolumeType": volume.volume_type.as_str(),
        "Encrypted": true,
        "Tags": [name_tag(&path.join("-"))]
    });
    if let Some(iops) = volume.effective_iops() {
        properties["Iops"] = json!(iops);
    }

    builder.add_resource(
        &volume_id,
        &origin,
        json!({ "Type": "AWS::EC2::Volume", "Properties": properties }),
    )?;
    builder.add_resource(
        &logical_id::volume_attachment(vpc_name, subnet_name, instance_name, name),
        &origin,
        json!({
            "Type": "AWS::EC2::VolumeAttachment",
            "Properties": {
                "Device": volume.device,
                "InstanceId": reference(instance_id),
                "VolumeId": reference(&volume_id)
            }
        }),
    )
}
