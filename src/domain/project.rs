// Copyright (c) 2025 - Cowboy AI, Inc.
//! Project metadata, targets and dependency references
//!
//! A [`Project`] is built once per invocation by the configuration front-end
//! and is read-only afterwards. Everything here is plain data; the remote
//! behaviour lives in `publisher`, `dependency` and `stack`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::invariants::{validate_name, validate_relative_path, ModelError};
use super::{DnsName, ResourceModel};

/// Named deployment environment such as `staging` or `production`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target(String);

impl Target {
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        validate_name("target", &name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Target {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Target> for String {
    fn from(value: Target) -> Self {
        value.0
    }
}

/// Encryption key identifier, shared or chosen per target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KmsKey {
    Shared(String),
    PerTarget(BTreeMap<String, String>),
}

impl KmsKey {
    /// Key to use when publishing for `target`
    pub fn for_target(&self, target: &Target) -> Option<&str> {
        match self {
            KmsKey::Shared(key) => Some(key.as_str()),
            KmsKey::PerTarget(keys) => keys.get(target.as_str()).map(String::as_str),
        }
    }
}

/// Reference to another project's stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,

    /// Defaults to the resolving project's own target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
        }
    }

    pub fn in_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Target the dependency is read from
    pub fn resolved_target<'a>(&'a self, own: &'a Target) -> &'a Target {
        self.target.as_ref().unwrap_or(own)
    }
}

/// Caller-supplied value for a template parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Fixed value
    Literal(String),

    /// Value read from a dependency's published configuration
    Dependency { dependency: String, key: String },
}

impl ParameterValue {
    pub fn literal(value: impl Into<String>) -> Self {
        ParameterValue::Literal(value.into())
    }

    pub fn from_dependency(dependency: impl Into<String>, key: impl Into<String>) -> Self {
        ParameterValue::Dependency {
            dependency: dependency.into(),
            key: key.into(),
        }
    }
}

fn default_ssh_user() -> String {
    "ubuntu".to_string()
}

fn default_ssl_verify() -> bool {
    true
}

/// Configuration-management provisioning for a project's hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningSpec {
    /// Project whose stack runs the configuration-management server
    pub server_stack: String,

    pub organization: String,

    pub username: String,

    pub chef_sub_domain: String,

    pub bastion_sub_domain: String,

    pub hosted_zone_name: DnsName,

    /// SSH key used to reach hosts through the bastion
    pub private_key: PathBuf,

    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,

    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,

    #[serde(default)]
    pub hosts: Vec<ProvisionedHost>,
}

impl ProvisioningSpec {
    /// Server URL for the organization
    pub fn chef_server_url(&self) -> Result<String, ModelError> {
        let host = self.hosted_zone_name.with_label(&self.chef_sub_domain)?;
        Ok(format!("https://{}/organizations/{}", host, self.organization))
    }

    /// Bastion host name
    pub fn bastion_hostname(&self) -> Result<DnsName, ModelError> {
        self.hosted_zone_name.with_label(&self.bastion_sub_domain)
    }
}

/// One host to bootstrap with a cookbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedHost {
    pub sub_domain: String,
    pub cookbook: PathBuf,
}

/// TLS pair installed on the configuration-management server
///
/// Published encrypted next to the server project's configuration; the
/// server fetches it at boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChefServerSsl {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Project metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    /// Bucket holding every published artifact
    pub bucket: String,

    /// Stack naming prefix
    pub prefix: String,

    pub kms_key: KmsKey,

    /// Stack region; the runtime default otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceModel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning: Option<ProvisioningSpec>,

    /// Template-specific parameter values
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,

    /// Free-form configuration published for dependents
    #[serde(default)]
    pub config: serde_json::Value,

    /// Nested templates, relative path under the template root → body
    #[serde(default)]
    pub templates: BTreeMap<String, String>,

    /// Provisioning bundles, stack name → local `.tar.gz`
    #[serde(default)]
    pub bundles: BTreeMap<String, PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chef_server_ssl: Option<ChefServerSsl>,

    /// Targets that deploy and destroy only touch when confirmed
    #[serde(default)]
    pub protected_targets: Vec<String>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        kms_key: KmsKey,
    ) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
            prefix: prefix.into(),
            kms_key,
            region: None,
            dependencies: Vec::new(),
            resources: None,
            provisioning: None,
            parameters: BTreeMap::new(),
            config: serde_json::Value::Null,
            templates: BTreeMap::new(),
            bundles: BTreeMap::new(),
            chef_server_ssl: None,
            protected_targets: Vec::new(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_resources(mut self, model: ResourceModel) -> Self {
        self.resources = Some(model);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_provisioning(mut self, provisioning: ProvisioningSpec) -> Self {
        self.provisioning = Some(provisioning);
        self
    }

    pub fn with_chef_server_ssl(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.chef_server_ssl = Some(ChefServerSsl {
            cert: cert.into(),
            key: key.into(),
        });
        self
    }

    pub fn with_protected_target(mut self, target: impl Into<String>) -> Self {
        self.protected_targets.push(target.into());
        self
    }

    pub fn is_protected(&self, target: &Target) -> bool {
        self.protected_targets.iter().any(|t| t == target.as_str())
    }

    /// Look up a declared dependency by name
    pub fn dependency(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    /// Check the naming invariants the artifact and stack names rely on
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_name("project", &self.name)?;
        validate_name("prefix", &self.prefix)?;
        if self.bucket.trim().is_empty() {
            return Err(ModelError::MissingAttribute {
                path: self.name.clone(),
                attribute: "bucket",
            });
        }
        for dependency in &self.dependencies {
            validate_name("dependency", &dependency.name)?;
        }
        for relative in self.templates.keys() {
            validate_relative_path("template path", relative)?;
        }
        for bundle in self.bundles.keys() {
            validate_name("bundle", bundle)?;
        }
        for target in &self.protected_targets {
            validate_name("protected target", target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str) -> Target {
        Target::new(name).unwrap()
    }

    #[test]
    fn test_target_validation() {
        assert!(Target::new("staging").is_ok());
        assert!(Target::new("").is_err());
        assert!(Target::new("a/b").is_err());
    }

    #[test]
    fn test_kms_key_per_target() {
        let shared = KmsKey::Shared("key-1".to_string());
        assert_eq!(shared.for_target(&target("production")), Some("key-1"));

        let per_target = KmsKey::PerTarget(BTreeMap::from([(
            "staging".to_string(),
            "key-s".to_string(),
        )]));
        assert_eq!(per_target.for_target(&target("staging")), Some("key-s"));
        assert_eq!(per_target.for_target(&target("production")), None);
    }

    #[test]
    fn test_dependency_target_defaults_to_own() {
        let own = target("staging");
        let dep = Dependency::new("network");
        assert_eq!(dep.resolved_target(&own), &own);

        let shared = Dependency::new("dns").in_target(target("shared"));
        assert_eq!(shared.resolved_target(&own).as_str(), "shared");
    }

    #[test]
    fn test_parameter_value_untagged() {
        let literal: ParameterValue = serde_json::from_str("\"t2.micro\"").unwrap();
        assert_eq!(literal, ParameterValue::literal("t2.micro"));

        let dependency: ParameterValue =
            serde_json::from_str(r#"{"dependency": "network", "key": "config.vpcId"}"#).unwrap();
        assert_eq!(
            dependency,
            ParameterValue::from_dependency("network", "config.vpcId")
        );
    }

    #[test]
    fn test_project_from_json() {
        let json = serde_json::json!({
            "name": "web",
            "bucket": "deploy-bucket",
            "prefix": "acme",
            "kms_key": { "staging": "kms-staging" },
            "dependencies": [{ "name": "network" }],
            "parameters": { "instanceType": "t2.small" },
            "protected_targets": ["production"]
        });
        let project: Project = serde_json::from_value(json).unwrap();
        assert!(project.validate().is_ok());
        assert!(project.is_protected(&target("production")));
        assert_eq!(project.chef_server_ssl, None);
        assert!(project.dependency("network").is_some());
        assert_eq!(
            project.kms_key.for_target(&target("staging")),
            Some("kms-staging")
        );
    }

    #[test]
    fn test_artifact_paths_stay_under_their_root() {
        let base = Project::new("web", "deploy-bucket", "acme", KmsKey::Shared("k".into()));

        let mut nested = base.clone();
        nested
            .templates
            .insert("nested/db.json".to_string(), "{}".to_string());
        assert!(nested.validate().is_ok());

        for path in ["../other/config.json", "nested/../../x.json", "a//b.json", "./x.json", ""] {
            let mut escaping = base.clone();
            escaping.templates.insert(path.to_string(), "{}".to_string());
            assert!(
                matches!(escaping.validate(), Err(ModelError::InvalidName { kind: "template path", .. })),
                "{path:?} accepted"
            );
        }

        let mut bundle = base;
        bundle
            .bundles
            .insert("../app".to_string(), PathBuf::from("app.tar.gz"));
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn test_protected_targets() {
        let project = Project::new("web", "deploy-bucket", "acme", KmsKey::Shared("k".into()))
            .with_protected_target("production");
        assert!(project.is_protected(&target("production")));
        assert!(!project.is_protected(&target("staging")));
    }

    #[test]
    fn test_chef_server_url() {
        let spec = ProvisioningSpec {
            server_stack: "chef".to_string(),
            organization: "acme".to_string(),
            username: "deployer".to_string(),
            chef_sub_domain: "chef".to_string(),
            bastion_sub_domain: "bastion".to_string(),
            hosted_zone_name: DnsName::new("example.com").unwrap(),
            private_key: PathBuf::from("id_rsa"),
            ssh_user: default_ssh_user(),
            ssl_verify: true,
            hosts: Vec::new(),
        };
        assert_eq!(
            spec.chef_server_url().unwrap(),
            "https://chef.example.com/organizations/acme"
        );
        assert_eq!(spec.bastion_hostname().unwrap().as_str(), "bastion.example.com");
    }
}
