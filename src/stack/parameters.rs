// Copyright (c) 2025 - Cowboy AI, Inc.
//! Parameter binding
//!
//! The compiled template is the source of truth for which parameters a stack
//! needs. Each declared name is bound by fixed precedence:
//!
//! 1. well-known values derived from the project and target
//! 2. caller-supplied values, literal or read from a dependency
//!
//! A declared name with no value from either source is an error, raised
//! before any call to the stack service.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::{ParameterValue, Project, Target};
use crate::errors::{FormationError, FormationResult};
use crate::naming::{self, object_url, ArtifactKey};

/// Names of the parameters declared in a template body
pub fn declared_parameters(template_body: &str) -> FormationResult<Vec<String>> {
    let template: Value = serde_json::from_str(template_body)?;
    Ok(match template.get("Parameters") {
        Some(Value::Object(parameters)) => parameters.keys().cloned().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            return Err(FormationError::TemplateValidation(
                "Parameters section is not an object".to_string(),
            ))
        }
    })
}

/// Values the deploy flow provides for reserved parameter names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellKnownValues {
    pub name: String,
    pub target: String,
    pub prefix: String,
    pub s3_bucket: String,
    pub region: String,
    pub kms_key: String,
    /// Object key of the published configuration
    pub config: String,
    /// URL root of the published templates
    pub cloudformation_root: String,
    /// Object key root of the provisioning bundles
    pub opsworks_stacks_root_relative: String,
}

impl WellKnownValues {
    pub fn for_project(
        project: &Project,
        target: &Target,
        region: &str,
        kms_key: &str,
        template_host: &str,
    ) -> Self {
        Self {
            name: project.name.clone(),
            target: target.to_string(),
            prefix: project.prefix.clone(),
            s3_bucket: project.bucket.clone(),
            region: region.to_string(),
            kms_key: kms_key.to_string(),
            config: ArtifactKey::config(target, &project.name).to_string(),
            cloudformation_root: object_url(
                template_host,
                &project.bucket,
                &naming::template_root(target, &project.name),
            ),
            opsworks_stacks_root_relative: naming::provisioning_root(target, &project.name),
        }
    }

    /// Value for a reserved name
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "name" => &self.name,
            "target" => &self.target,
            "prefix" => &self.prefix,
            "s3Bucket" => &self.s3_bucket,
            "region" => &self.region,
            "kmsKey" => &self.kms_key,
            "config" => &self.config,
            "cloudformationRoot" => &self.cloudformation_root,
            "opsworksStacksRootRelative" => &self.opsworks_stacks_root_relative,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Where a declared parameter's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding<'a> {
    /// Known without any remote read
    Value(String),
    /// Read from a dependency's published configuration
    Dependency { dependency: &'a str, key: &'a str },
}

/// Bind every declared parameter to a source
///
/// Pure; fails with [`FormationError::UnresolvedParameter`] on the first
/// declared name (in name order) that has no source.
pub fn plan_bindings<'a>(
    declared: &[String],
    well_known: &WellKnownValues,
    supplied: &'a BTreeMap<String, ParameterValue>,
) -> FormationResult<BTreeMap<String, Binding<'a>>> {
    let mut sorted: Vec<&String> = declared.iter().collect();
    sorted.sort();

    sorted
        .into_iter()
        .map(|name| {
            let binding = match (well_known.get(name), supplied.get(name)) {
                (Some(value), _) => Binding::Value(value.to_string()),
                (None, Some(ParameterValue::Literal(value))) => Binding::Value(value.clone()),
                (None, Some(ParameterValue::Dependency { dependency, key })) => {
                    Binding::Dependency { dependency, key }
                }
                (None, None) => return Err(FormationError::UnresolvedParameter(name.clone())),
            };
            Ok((name.clone(), binding))
        })
        .collect()
}
