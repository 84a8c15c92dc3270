// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bootstrap add-ons
//!
//! Each add-on is a [`TemplateMutation`] applied after the base traversal.
//! Add-ons see the accumulated builder plus an [`AddonContext`] holding the
//! hosted-zone identity and the logical ids of the bootstrap VPC's subnets.
//! They never walk the resource model themselves.

use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::intrinsic::{base64, find_in_region_map, get_att, join, name_tag, reference};
use super::region_map::{BASE_AMI, NAT_AMI, REGION_MAP};
use super::{logical_id, TemplateBuilder};
use crate::domain::{Bootstrap, DnsName, ModelError};
use crate::naming::{CHEF_SERVER_CERT, CHEF_SERVER_KEY};

/// Parameter naming the SSH key pair for bastion and chef server hosts
pub const KEY_PAIR_PARAMETER: &str = "keyPair";

/// A synthesized subnet as seen by add-ons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetRef {
    pub logical_id: String,
    pub public: bool,
}

/// Everything an add-on may read besides the builder itself
#[derive(Debug, Clone)]
pub struct AddonContext<'a> {
    pub bootstrap: &'a Bootstrap,
    pub hosted_zone_id: &'a str,
    pub hosted_zone_name: &'a DnsName,
    /// Logical id of the bootstrap VPC
    pub vpc_id: String,
    /// Logical id of the private hosted zone in the bootstrap VPC
    pub private_zone_id: String,
    /// Subnets of the bootstrap VPC by model name
    pub subnets: BTreeMap<String, SubnetRef>,
}

impl<'a> AddonContext<'a> {
    pub fn new(
        bootstrap: &'a Bootstrap,
        subnets: BTreeMap<String, SubnetRef>,
    ) -> Result<Self, ModelError> {
        let missing = |attribute: &'static str| ModelError::MissingAttribute {
            path: "bootstrap".to_string(),
            attribute,
        };
        let hosted_zone_id = bootstrap
            .hosted_zone_id
            .as_deref()
            .ok_or_else(|| missing("hosted_zone_id"))?;
        let hosted_zone_name = bootstrap
            .hosted_zone_name
            .as_ref()
            .ok_or_else(|| missing("hosted_zone_name"))?;

        Ok(Self {
            bootstrap,
            hosted_zone_id,
            hosted_zone_name,
            vpc_id: logical_id::vpc(&bootstrap.vpc),
            private_zone_id: logical_id::private_hosted_zone(&bootstrap.vpc),
            subnets,
        })
    }

    /// Subnet logical id by model name
    pub fn subnet(&self, addon: &str, name: &str) -> Result<&SubnetRef, ModelError> {
        self.subnets
            .get(name)
            .ok_or_else(|| ModelError::UnknownReference {
                path: format!("bootstrap/{}", addon),
                reference: name.to_string(),
            })
    }

    pub fn private_subnets(&self) -> impl Iterator<Item = &SubnetRef> {
        self.subnets.values().filter(|s| !s.public)
    }

    /// Fully qualified host name under the hosted zone
    pub fn host(&self, sub_domain: &str) -> Result<DnsName, ModelError> {
        self.hosted_zone_name.with_label(sub_domain)
    }
}

/// A transformation applied to the template after the base traversal
pub trait TemplateMutation: Send + Sync {
    fn name(&self) -> &'static str;

    /// Add resources to the builder. Disabled add-ons leave it untouched.
    fn apply(&self, builder: &mut TemplateBuilder, context: &AddonContext<'_>)
        -> Result<(), ModelError>;
}

/// NAT, bastion, chef server
pub fn default_addons() -> Vec<Box<dyn TemplateMutation>> {
    vec![
        Box::new(NatAddon),
        Box::new(BastionAddon),
        Box::new(ChefServerAddon),
    ]
}

fn ingress(protocol: &str, port: Option<u16>, cidr: Value) -> Value {
    match port {
        Some(port) => json!({
            "IpProtocol": protocol,
            "FromPort": port,
            "ToPort": port,
            "CidrIp": cidr
        }),
        None => json!({ "IpProtocol": protocol, "CidrIp": cidr }),
    }
}

fn security_group(vpc_id: &str, description: &str, rules: Vec<Value>, tag: &str) -> Value {
    json!({
        "Type": "AWS::EC2::SecurityGroup",
        "Properties": {
            "GroupDescription": description,
            "VpcId": reference(vpc_id),
            "SecurityGroupIngress": rules,
            "Tags": [name_tag(tag)]
        }
    })
}

fn record_set(zone: Value, host: &DnsName, address: Value) -> Value {
    json!({
        "Type": "AWS::Route53::RecordSet",
        "Properties": {
            "HostedZoneId": zone,
            "Name": host.as_str(),
            "Type": "A",
            "TTL": "300",
            "ResourceRecords": [address]
        }
    })
}

fn key_pair_parameter(builder: &mut TemplateBuilder) {
    builder.add_parameter(
        KEY_PAIR_PARAMETER,
        json!({
            "Type": "AWS::EC2::KeyPair::KeyName",
            "Description": "SSH key pair for bootstrap hosts"
        }),
    );
}

/// NAT instance routing private subnets to the internet
pub struct NatAddon;

impl NatAddon {
    pub const SECURITY_GROUP: &'static str = "NatSecurityGroup";
    pub const INSTANCE: &'static str = "NatInstance";
    pub const ROUTE_TABLE: &'static str = "PrivateRouteTable";
    pub const ROUTE: &'static str = "PrivateRoute";
}

impl TemplateMutation for NatAddon {
    fn name(&self) -> &'static str {
        "nat"
    }

    fn apply(
        &self,
        builder: &mut TemplateBuilder,
        context: &AddonContext<'_>,
    ) -> Result<(), ModelError> {
        let Some(nat) = &context.bootstrap.nat else {
            return Ok(());
        };
        let origin = "bootstrap/nat";
        let subnet = context.subnet(self.name(), &nat.subnet)?;
        builder.require_resource(&subnet.logical_id, origin)?;
        builder.require_resource(&context.vpc_id, origin)?;

        builder.add_resource(
            Self::SECURITY_GROUP,
            origin,
            security_group(
                &context.vpc_id,
                "NAT traffic from inside the VPC",
                vec![ingress("-1", None, get_att(&context.vpc_id, "CidrBlock"))],
                "nat",
            ),
        )?;

        builder.add_resource(
            Self::INSTANCE,
            origin,
            json!({
                "Type": "AWS::EC2::Instance",
                "Properties": {
                    "InstanceType": nat.instance_type,
                    "ImageId": find_in_region_map(REGION_MAP, NAT_AMI),
                    "SourceDestCheck": false,
                    "SubnetId": reference(&subnet.logical_id),
                    "SecurityGroupIds": [reference(Self::SECURITY_GROUP)],
                    "Tags": [name_tag("nat")]
                }
            }),
        )?;

        builder.add_resource(
            Self::ROUTE_TABLE,
            origin,
            json!({
                "Type": "AWS::EC2::RouteTable",
                "Properties": {
                    "VpcId": reference(&context.vpc_id),
                    "Tags": [name_tag("private")]
                }
            }),
        )?;
        builder.add_resource(
            Self::ROUTE,
            origin,
            json!({
                "Type": "AWS::EC2::Route",
                "Properties": {
                    "RouteTableId": reference(Self::ROUTE_TABLE),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "InstanceId": reference(Self::INSTANCE)
                }
            }),
        )?;

        for private in context.private_subnets() {
            builder.add_resource(
                &logical_id::subnet_route_table_association(&private.logical_id),
                origin,
                json!({
                    "Type": "AWS::EC2::SubnetRouteTableAssociation",
                    "Properties": {
                        "SubnetId": reference(&private.logical_id),
                        "RouteTableId": reference(Self::ROUTE_TABLE)
                    }
                }),
            )?;
        }

        builder.add_output(
            "NatInstanceId",
            reference(Self::INSTANCE),
            "NAT instance",
        );
        Ok(())
    }
}

/// SSH jump host with public and private host records
pub struct BastionAddon;

impl BastionAddon {
    pub const SECURITY_GROUP: &'static str = "BastionSecurityGroup";
    pub const INSTANCE: &'static str = "BastionInstance";
    pub const PUBLIC_RECORD: &'static str = "BastionPublicRecord";
    pub const PRIVATE_RECORD: &'static str = "BastionPrivateRecord";
}

impl TemplateMutation for BastionAddon {
    fn name(&self) -> &'static str {
        "bastion"
    }

    fn apply(
        &self,
        builder: &mut TemplateBuilder,
        context: &AddonContext<'_>,
    ) -> Result<(), ModelError> {
        let Some(bastion) = &context.bootstrap.bastion else {
            return Ok(());
        };
        let origin = "bootstrap/bastion";
        let subnet = context.subnet(self.name(), &bastion.subnet)?;
        builder.require_resource(&subnet.logical_id, origin)?;
        builder.require_resource(&context.private_zone_id, origin)?;
        let host = context.host(&bastion.sub_domain)?;

        key_pair_parameter(builder);

        builder.add_resource(
            Self::SECURITY_GROUP,
            origin,
            security_group(
                &context.vpc_id,
                "SSH access to the bastion",
                vec![ingress("tcp", Some(22), json!("0.0.0.0/0"))],
                "bastion",
            ),
        )?;

        builder.add_resource(
            Self::INSTANCE,
            origin,
            json!({
                "Type": "AWS::EC2::Instance",
                "Properties": {
                    "InstanceType": bastion.instance_type,
                    "ImageId": find_in_region_map(REGION_MAP, BASE_AMI),
                    "KeyName": reference(KEY_PAIR_PARAMETER),
                    "SubnetId": reference(&subnet.logical_id),
                    "SecurityGroupIds": [reference(Self::SECURITY_GROUP)],
                    "Tags": [name_tag("bastion")]
                }
            }),
        )?;

        builder.add_resource(
            Self::PUBLIC_RECORD,
            origin,
            record_set(
                json!(context.hosted_zone_id),
                &host,
                get_att(Self::INSTANCE, "PublicIp"),
            ),
        )?;
        builder.add_resource(
            Self::PRIVATE_RECORD,
            origin,
            record_set(
                reference(&context.private_zone_id),
                &host,
                get_att(Self::INSTANCE, "PrivateIp"),
            ),
        )?;

        builder.add_output("BastionHostname", json!(host.as_str()), "Bastion host name");
        Ok(())
    }
}

/// Configuration-management server reading its settings from the bucket
pub struct ChefServerAddon;

impl ChefServerAddon {
    pub const SECURITY_GROUP: &'static str = "ChefServerSecurityGroup";
    pub const ROLE: &'static str = "ChefServerRole";
    pub const INSTANCE_PROFILE: &'static str = "ChefServerInstanceProfile";
    pub const INSTANCE: &'static str = "ChefServerInstance";
    pub const PRIVATE_RECORD: &'static str = "ChefServerPrivateRecord";

    /// `s3://{bucket}/{target}/{name}/{dir}/{file}`
    fn project_object(dir: &str, file: &str) -> Vec<Value> {
        vec![
            json!(" s3://"),
            reference("s3Bucket"),
            json!("/"),
            reference("target"),
            json!("/"),
            reference("name"),
            json!(format!("/{}/{}", dir, file)),
        ]
    }

    fn s3_get(dir: &str, file: &str, local: &str) -> Vec<Value> {
        let mut parts = vec![json!("aws s3 cp --region "), reference("region")];
        parts.extend(Self::project_object(dir, file));
        parts.push(json!(format!(" {}", local)));
        parts
    }

    /// Encrypted upload of a generated key to the project's `chef/` root
    fn s3_put_key(principal: &str) -> Vec<Value> {
        let mut parts = vec![
            json!("aws s3 cp --region "),
            reference("region"),
            json!(" --sse aws:kms --sse-kms-key-id "),
            reference("kmsKey"),
            json!(format!(" /etc/formation/{}.pem", principal)),
        ];
        parts.extend(Self::project_object("chef", &format!("{}.pem", principal)));
        parts.push(json!("\n"));
        parts
    }

    fn user_data(version: Option<&str>, organization: &str, username: &str) -> Value {
        let version_flag = version
            .map(|v| format!(" -v {}", v))
            .unwrap_or_default();

        let mut parts = vec![
            json!("#!/bin/bash -ex\n"),
            json!("mkdir -p /etc/formation /etc/opscode\n"),
            json!("aws s3 cp --region "),
            reference("region"),
            json!(" s3://"),
            reference("s3Bucket"),
            json!("/"),
            reference("config"),
            json!(" /etc/formation/config.json\n"),
            json!("if "),
        ];
        parts.extend(Self::s3_get("ssl", CHEF_SERVER_CERT, "/etc/formation/chef-server.crt"));
        parts.push(json!("; then\n"));
        parts.extend(Self::s3_get("ssl", CHEF_SERVER_KEY, "/etc/formation/chef-server.key"));
        parts.push(json!("\n"));
        parts.push(json!(
            "echo \"nginx['ssl_certificate'] = '/etc/formation/chef-server.crt'\" >> /etc/opscode/chef-server.rb\n"
        ));
        parts.push(json!(
            "echo \"nginx['ssl_certificate_key'] = '/etc/formation/chef-server.key'\" >> /etc/opscode/chef-server.rb\n"
        ));
        parts.push(json!("fi\n"));
        parts.push(json!(format!(
            "curl -L https://omnitruck.chef.io/install.sh | bash -s -- -P chef-server{}\n",
            version_flag
        )));
        parts.push(json!("chef-server-ctl reconfigure\n"));
        parts.push(json!(format!(
            "chef-server-ctl user-create {user} {user} {user} {user}@{org} \"$(openssl rand -base64 24)\" \
             --filename /etc/formation/{user}.pem\n",
            org = organization,
            user = username
        )));
        parts.push(json!(format!(
            "chef-server-ctl org-create {org} {org} --association_user {user} \
             --filename /etc/formation/{org}.pem\n",
            org = organization,
            user = username
        )));
        parts.extend(Self::s3_put_key(username));
        parts.extend(Self::s3_put_key(organization));

        base64(join("", parts))
    }

    /// `arn:aws:s3:::{bucket}/{target}/{name}/{dir}/*`
    fn project_objects_arn(dir: &str) -> Value {
        join(
            "",
            vec![
                json!("arn:aws:s3:::"),
                reference("s3Bucket"),
                json!("/"),
                reference("target"),
                json!("/"),
                reference("name"),
                json!(format!("/{}/*", dir)),
            ],
        )
    }
}

impl TemplateMutation for ChefServerAddon {
    fn name(&self) -> &'static str {
        "chef_server"
    }

    fn apply(
        &self,
        builder: &mut TemplateBuilder,
        context: &AddonContext<'_>,
    ) -> Result<(), ModelError> {
        let Some(chef) = &context.bootstrap.chef_server else {
            return Ok(());
        };
        let origin = "bootstrap/chef_server";
        let subnet = context.subnet(self.name(), &chef.subnet)?;
        builder.require_resource(&subnet.logical_id, origin)?;
        builder.require_resource(&context.private_zone_id, origin)?;
        let host = context.host(&chef.sub_domain)?;

        key_pair_parameter(builder);

        let vpc_cidr = get_att(&context.vpc_id, "CidrBlock");
        builder.add_resource(
            Self::SECURITY_GROUP,
            origin,
            security_group(
                &context.vpc_id,
                "Chef server API and SSH from inside the VPC",
                vec![
                    ingress("tcp", Some(443), vpc_cidr.clone()),
                    ingress("tcp", Some(22), vpc_cidr),
                ],
                "chef-server",
            ),
        )?;

        builder.add_resource(
            Self::ROLE,
            origin,
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "Path": "/",
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": ["ec2.amazonaws.com"] },
                            "Action": ["sts:AssumeRole"]
                        }]
                    },
                    "Policies": [{
                        "PolicyName": "ChefServerConfigAccess",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [
                                {
                                    "Effect": "Allow",
                                    "Action": ["s3:GetObject"],
                                    "Resource": join("", vec![
                                        json!("arn:aws:s3:::"),
                                        reference("s3Bucket"),
                                        json!("/"),
                                        reference("config"),
                                    ])
                                },
                                {
                                    "Effect": "Allow",
                                    "Action": ["s3:GetObject"],
                                    "Resource": Self::project_objects_arn("ssl")
                                },
                                {
                                    "Effect": "Allow",
                                    "Action": ["s3:PutObject"],
                                    "Resource": Self::project_objects_arn("chef")
                                },
                                {
                                    "Effect": "Allow",
                                    "Action": ["kms:Decrypt", "kms:GenerateDataKey"],
                                    "Resource": "*"
                                }
                            ]
                        }
                    }]
                }
            }),
        )?;

        builder.add_resource(
            Self::INSTANCE_PROFILE,
            origin,
            json!({
                "Type": "AWS::IAM::InstanceProfile",
                "Properties": { "Path": "/", "Roles": [reference(Self::ROLE)] }
            }),
        )?;

        builder.add_resource(
            Self::INSTANCE,
            origin,
            json!({
                "Type": "AWS::EC2::Instance",
                "Properties": {
                    "InstanceType": chef.instance_type,
                    "ImageId": find_in_region_map(REGION_MAP, BASE_AMI),
                    "KeyName": reference(KEY_PAIR_PARAMETER),
                    "SubnetId": reference(&subnet.logical_id),
                    "SecurityGroupIds": [reference(Self::SECURITY_GROUP)],
                    "IamInstanceProfile": reference(Self::INSTANCE_PROFILE),
                    "UserData": Self::user_data(
                        chef.version.as_deref(),
                        &chef.organization,
                        &chef.username,
                    ),
                    "Tags": [name_tag("chef-server")]
                }
            }),
        )?;

        builder.add_resource(
            Self::PRIVATE_RECORD,
            origin,
            record_set(
                reference(&context.private_zone_id),
                &host,
                get_att(Self::INSTANCE, "PrivateIp"),
            ),
        )?;

        builder.add_output(
            "ChefServerUrl",
            json!(format!(
                "https://{}/organizations/{}",
                host, chef.organization
            )),
            "Chef server organization URL",
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BastionSpec, ChefServerSpec, Cidr, NatSpec, ResourceModel, Subnet, Vpc,
    };
    use crate::template::synthesize;

    fn model(bootstrap: Bootstrap) -> ResourceModel {
        let cidr = |s: &str| Cidr::new(s).unwrap();
        ResourceModel::new()
            .with_vpc(
                "main",
                Vpc::new(cidr("10.0.0.0/16"), "us-east-1")
                    .with_subnet("public", Subnet::new(cidr("10.0.0.0/24"), "a").public())
                    .with_subnet("private", Subnet::new(cidr("10.0.1.0/24"), "b")),
            )
            .with_bootstrap(bootstrap)
    }

    fn bootstrap() -> Bootstrap {
        Bootstrap::new("main").with_hosted_zone("Z123", DnsName::new("example.com").unwrap())
    }

    #[test]
    fn test_nat_routes_private_subnets() {
        let template = synthesize(&model(bootstrap().with_nat(NatSpec::new("public")))).unwrap();

        let nat = template.resource(NatAddon::INSTANCE).unwrap();
        assert_eq!(nat["Properties"]["SourceDestCheck"], false);
        assert_eq!(
            nat["Properties"]["SubnetId"],
            json!({"Ref": "SubnetMainPublic"})
        );

        let association = template
            .resource("SubnetMainPrivateRouteTableAssociation")
            .unwrap();
        assert_eq!(
            association["Properties"]["RouteTableId"],
            json!({"Ref": "PrivateRouteTable"})
        );
        assert!(template.outputs.contains_key("NatInstanceId"));
        assert!(!template.parameters.contains_key(KEY_PAIR_PARAMETER));
    }

    #[test]
    fn test_bastion_records() {
        let template = synthesize(&model(
            bootstrap().with_bastion(BastionSpec::new("public", "bastion")),
        ))
        .unwrap();

        let public = template.resource(BastionAddon::PUBLIC_RECORD).unwrap();
        assert_eq!(public["Properties"]["HostedZoneId"], "Z123");
        assert_eq!(public["Properties"]["Name"], "bastion.example.com");

        let private = template.resource(BastionAddon::PRIVATE_RECORD).unwrap();
        assert_eq!(
            private["Properties"]["HostedZoneId"],
            json!({"Ref": "PrivateHostedZoneMain"})
        );
        assert_eq!(
            template.parameters[KEY_PAIR_PARAMETER]["Type"],
            "AWS::EC2::KeyPair::KeyName"
        );
    }

    #[test]
    fn test_chef_server_reads_config_from_bucket() {
        let template = synthesize(&model(bootstrap().with_chef_server(ChefServerSpec::new(
            "private", "chef", "acme", "admin",
        ))))
        .unwrap();

        let role = template.resource(ChefServerAddon::ROLE).unwrap();
        let statement = &role["Properties"]["Policies"][0]["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Action"][0], "s3:GetObject");

        let instance = template.resource(ChefServerAddon::INSTANCE).unwrap();
        let user_data = instance["Properties"]["UserData"].to_string();
        assert!(user_data.contains("s3Bucket"));
        assert!(user_data.contains(
            "org-create acme acme --association_user admin --filename /etc/formation/acme.pem"
        ));
        assert!(user_data.contains("/ssl/chef-server.crt"));
        assert!(user_data.contains("nginx['ssl_certificate_key']"));
    }

    #[test]
    fn test_chef_server_publishes_its_keys() {
        let template = synthesize(&model(bootstrap().with_chef_server(ChefServerSpec::new(
            "private", "chef", "acme", "admin",
        ))))
        .unwrap();

        let instance = template.resource(ChefServerAddon::INSTANCE).unwrap();
        let user_data = instance["Properties"]["UserData"].to_string();
        assert!(user_data.contains("--filename /etc/formation/admin.pem"));
        assert!(user_data.contains("/chef/admin.pem"));
        assert!(user_data.contains("/chef/acme.pem"));
        assert!(user_data.contains("--sse aws:kms --sse-kms-key-id "));
        assert!(user_data.contains("kmsKey"));

        let role = template.resource(ChefServerAddon::ROLE).unwrap();
        let statements = role["Properties"]["Policies"][0]["PolicyDocument"]["Statement"]
            .as_array()
            .unwrap();
        let put = statements
            .iter()
            .find(|s| s["Action"][0] == "s3:PutObject")
            .unwrap();
        assert_eq!(put["Resource"]["Fn::Join"][1][6], "/chef/*");

        assert_eq!(
            template.outputs["ChefServerUrl"]["Value"],
            "https://chef.example.com/organizations/acme"
        );
    }

    #[test]
    fn test_addons_apply_in_fixed_order() {
        let names: Vec<_> = default_addons().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["nat", "bastion", "chef_server"]);
    }

    #[test]
    fn test_disabled_addons_emit_nothing() {
        let base = synthesize(&model(bootstrap())).unwrap();
        assert!(base.resource(NatAddon::INSTANCE).is_none());
        assert!(base.resource(BastionAddon::INSTANCE).is_none());
        assert!(base.resource(ChefServerAddon::INSTANCE).is_none());
    }
}
