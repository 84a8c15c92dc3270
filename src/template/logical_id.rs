// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stable logical ids derived from model paths
//!
//! A logical id is the resource kind followed by every path segment in
//! PascalCase, e.g. subnet `private-a` in VPC `main` becomes
//! `SubnetMainPrivateA`. The mapping depends only on the path, so an
//! unchanged model always produces the same ids.

/// PascalCase a single path segment, dropping separators
pub fn pascal_case(segment: &str) -> String {
    segment
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// `{kind}{Segment}{Segment}...`
pub fn derive(kind: &str, path: &[&str]) -> String {
    path.iter()
        .fold(kind.to_string(), |id, segment| id + &pascal_case(segment))
}

pub fn vpc(vpc: &str) -> String {
    derive("Vpc", &[vpc])
}

pub fn private_hosted_zone(vpc: &str) -> String {
    derive("PrivateHostedZone", &[vpc])
}

pub fn internet_gateway(vpc: &str) -> String {
    derive("InternetGateway", &[vpc])
}

pub fn internet_gateway_attachment(vpc: &str) -> String {
    derive("InternetGatewayAttachment", &[vpc])
}

pub fn public_route_table(vpc: &str) -> String {
    derive("PublicRouteTable", &[vpc])
}

pub fn public_route(vpc: &str) -> String {
    derive("PublicRoute", &[vpc])
}

pub fn subnet(vpc: &str, subnet: &str) -> String {
    derive("Subnet", &[vpc, subnet])
}

/// Route table association of a subnet, public or private
pub fn subnet_route_table_association(subnet_id: &str) -> String {
    format!("{}RouteTableAssociation", subnet_id)
}

pub fn instance(vpc: &str, subnet: &str, instance: &str) -> String {
    derive("Instance", &[vpc, subnet, instance])
}

pub fn instance_record(vpc: &str, subnet: &str, instance: &str) -> String {
    derive("InstanceRecord", &[vpc, subnet, instance])
}

pub fn volume(vpc: &str, subnet: &str, instance: &str, volume: &str) -> String {
    derive("Volume", &[vpc, subnet, instance, volume])
}

pub fn volume_attachment(vpc: &str, subnet: &str, instance: &str, volume: &str) -> String {
    derive("VolumeAttachment", &[vpc, subnet, instance, volume])
}
