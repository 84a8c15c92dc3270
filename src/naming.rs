// Copyright (c) 2025 - Cowboy AI, Inc.

//! Remote key and stack naming
//!
//! Published artifact keys and stack names are a compatibility surface:
//! other projects read them back, so the layout never changes.
//!
//! # Key Pattern
//!
//! ```text
//! {target}/{project}/config.json
//! {target}/{project}/cloudformation/{relative-path}
//! {target}/{project}/cloudformation/main.json
//! {target}/{project}/opsworks/{stack}.tar.gz
//! {target}/{project}/ssl/chef-server.crt
//! {target}/{project}/ssl/chef-server.key
//! {target}/{project}/chef/{user-or-organization}.pem
//! ```
//!
//! Stacks are named `{prefix}-{project}-{target}`.
//!
//! # Examples
//!
//! ```rust
//! use cim_formation::domain::Target;
//! use cim_formation::naming::{ArtifactKey, stack_name};
//!
//! let target = Target::new("staging").unwrap();
//! assert_eq!(ArtifactKey::config(&target, "web").to_string(), "staging/web/config.json");
//! assert_eq!(
//!     ArtifactKey::main_template(&target, "web").to_string(),
//!     "staging/web/cloudformation/main.json"
//! );
//! assert_eq!(stack_name("acme", "web", &target), "acme-web-staging");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Target;

/// File name of the published configuration document
pub const CONFIG_FILE: &str = "config.json";

/// Entry template under the template root
pub const MAIN_TEMPLATE: &str = "main.json";

/// Suffix of provisioning bundles
pub const BUNDLE_EXTENSION: &str = "tar.gz";

/// File names of the configuration-management server's TLS pair
pub const CHEF_SERVER_CERT: &str = "chef-server.crt";
pub const CHEF_SERVER_KEY: &str = "chef-server.key";

/// Kind of published artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Published configuration document
    Config,
    /// Stack template (main or nested)
    Template,
    /// Provisioning bundle
    CookbookBundle,
    /// TLS certificate or key installed on the configuration-management server
    ChefServerCert,
    /// Client key written back by the configuration-management server
    ChefKey,
}

impl ArtifactKind {
    /// Directory segment for kinds stored under a root
    pub fn directory(&self) -> Option<&'static str> {
        match self {
            ArtifactKind::Config => None,
            ArtifactKind::Template => Some("cloudformation"),
            ArtifactKind::CookbookBundle => Some("opsworks"),
            ArtifactKind::ChefServerCert => Some("ssl"),
            ArtifactKind::ChefKey => Some("chef"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Config => write!(f, "config"),
            ArtifactKind::Template => write!(f, "template"),
            ArtifactKind::CookbookBundle => write!(f, "cookbook-bundle"),
            ArtifactKind::ChefServerCert => write!(f, "chef-server-cert"),
            ArtifactKind::ChefKey => write!(f, "chef-key"),
        }
    }
}

/// Remote key of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub target: Target,
    pub project: String,
    pub kind: ArtifactKind,
    /// Path below the kind's root; unused for config
    pub relative: Option<String>,
}

impl ArtifactKey {
    /// `{target}/{project}/config.json`
    pub fn config(target: &Target, project: &str) -> Self {
        Self {
            target: target.clone(),
            project: project.to_string(),
            kind: ArtifactKind::Config,
            relative: None,
        }
    }

    /// `{target}/{project}/cloudformation/{relative}`
    pub fn template(target: &Target, project: &str, relative: &str) -> Self {
        Self {
            target: target.clone(),
            project: project.to_string(),
            kind: ArtifactKind::Template,
            relative: Some(relative.trim_start_matches('/').to_string()),
        }
    }

    /// `{target}/{project}/cloudformation/main.json`
    pub fn main_template(target: &Target, project: &str) -> Self {
        Self::template(target, project, MAIN_TEMPLATE)
    }

    /// `{target}/{project}/opsworks/{stack}.tar.gz`
    pub fn cookbook_bundle(target: &Target, project: &str, stack: &str) -> Self {
        Self {
            target: target.clone(),
            project: project.to_string(),
            kind: ArtifactKind::CookbookBundle,
            relative: Some(format!("{}.{}", stack, BUNDLE_EXTENSION)),
        }
    }

    /// `{target}/{project}/ssl/{file}`
    pub fn chef_server_cert(target: &Target, project: &str, file: &str) -> Self {
        Self {
            target: target.clone(),
            project: project.to_string(),
            kind: ArtifactKind::ChefServerCert,
            relative: Some(file.to_string()),
        }
    }

    /// `{target}/{server}/chef/{principal}.pem`, a user or organization key
    pub fn chef_key(target: &Target, server: &str, principal: &str) -> Self {
        Self {
            target: target.clone(),
            project: server.to_string(),
            kind: ArtifactKind::ChefKey,
            relative: Some(format!("{}.pem", principal)),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind.directory(), &self.relative) {
            (None, _) => write!(f, "{}/{}/{}", self.target, self.project, CONFIG_FILE),
            (Some(dir), Some(relative)) => {
                write!(f, "{}/{}/{}/{}", self.target, self.project, dir, relative)
            }
            (Some(dir), None) => write!(f, "{}/{}/{}", self.target, self.project, dir),
        }
    }
}

/// `{target}/{project}/cloudformation`
pub fn template_root(target: &Target, project: &str) -> String {
    format!("{}/{}/{}", target, project, "cloudformation")
}

/// `{target}/{project}/opsworks`
pub fn provisioning_root(target: &Target, project: &str) -> String {
    format!("{}/{}/{}", target, project, "opsworks")
}

/// `{prefix}-{project}-{target}`
pub fn stack_name(prefix: &str, project: &str, target: &Target) -> String {
    format!("{}-{}-{}", prefix, project, target)
}

/// Public URL of an object, as the stack service reads templates
pub fn object_url(host: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", host.trim_end_matches('/'), bucket, key)
}
