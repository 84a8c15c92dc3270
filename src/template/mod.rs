// Copyright (c) 2025 - Cowboy AI, Inc.
//! Template Synthesis
//!
//! Turns a [`ResourceModel`](crate::domain::ResourceModel) into a
//! declarative template document for the stack service.
//!
//! ```text
//! ResourceModel ──validate──▶ base traversal ──▶ add-ons (NAT → bastion → chef) ──▶ Template
//! ```
//!
//! Synthesis is a pure function of its input. Every section of the document
//! is a `BTreeMap`, so rendering the same model twice yields byte-identical
//! JSON.

pub mod addons;
pub mod intrinsic;
pub mod logical_id;
pub mod region_map;
pub mod synthesis;

pub use addons::{
    default_addons, AddonContext, BastionAddon, ChefServerAddon, NatAddon, TemplateMutation,
};
pub use synthesis::{synthesize, Synthesizer};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::domain::ModelError;
use crate::errors::FormationResult;

/// Template format version written into every document
pub const FORMAT_VERSION: &str = "2010-09-09";

/// Synthesized template document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "Parameters", default)]
    pub parameters: BTreeMap<String, Value>,

    #[serde(rename = "Mappings", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mappings: BTreeMap<String, Value>,

    #[serde(rename = "Resources", default)]
    pub resources: BTreeMap<String, Value>,

    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Value>,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description: description.into(),
            ..Default::default()
        }
    }

    /// Resource body by logical id
    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.resources.get(logical_id)
    }

    /// Logical ids of every resource with the given type, in id order
    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a str> {
        self.resources
            .iter()
            .filter(move |(_, body)| body["Type"] == resource_type)
            .map(|(id, _)| id.as_str())
    }

    /// Names of the declared parameters, in name order
    pub fn declared_parameters(&self) -> Vec<String> {
        self.parameters.keys().cloned().collect()
    }

    /// Canonical rendering: pretty JSON with a trailing newline
    pub fn to_json_pretty(&self) -> FormationResult<String> {
        let mut body = serde_json::to_string_pretty(self)?;
        body.push('\n');
        Ok(body)
    }

    /// Parse a rendered template
    pub fn from_json(body: &str) -> FormationResult<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Standard string parameter declaration
pub fn string_parameter(description: &str) -> Value {
    json!({ "Type": "String", "Description": description })
}

/// Accumulates a [`Template`] while tracking where each logical id came from
///
/// Add-ons receive the builder after the base traversal, so they can look up
/// resources that already exist instead of walking the model again.
#[derive(Debug)]
pub struct TemplateBuilder {
    template: Template,
    origins: BTreeMap<String, String>,
}

impl TemplateBuilder {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            template: Template::new(description),
            origins: BTreeMap::new(),
        }
    }

    /// Declare a parameter. Re-declaring with the same body is a no-op.
    pub fn add_parameter(&mut self, name: &str, declaration: Value) {
        self.template
            .parameters
            .entry(name.to_string())
            .or_insert(declaration);
    }

    pub fn add_mapping(&mut self, name: &str, mapping: Value) {
        self.template.mappings.insert(name.to_string(), mapping);
    }

    /// Add a resource under a logical id
    ///
    /// `origin` is the model path the resource was derived from; two paths
    /// deriving the same id are reported together.
    pub fn add_resource(
        &mut self,
        logical_id: &str,
        origin: &str,
        body: Value,
    ) -> Result<(), ModelError> {
        if let Some(first) = self.origins.get(logical_id) {
            return Err(ModelError::DuplicateLogicalId {
                id: logical_id.to_string(),
                first: first.clone(),
                second: origin.to_string(),
            });
        }
        self.origins
            .insert(logical_id.to_string(), origin.to_string());
        self.template.resources.insert(logical_id.to_string(), body);
        Ok(())
    }

    pub fn add_output(&mut self, name: &str, value: Value, description: &str) {
        self.template.outputs.insert(
            name.to_string(),
            json!({ "Description": description, "Value": value }),
        );
    }

    /// Whether a logical id has been emitted
    pub fn has_resource(&self, logical_id: &str) -> bool {
        self.template.resources.contains_key(logical_id)
    }

    /// Look up an already-synthesized resource
    pub fn require_resource(&self, logical_id: &str, from: &str) -> Result<&Value, ModelError> {
        self.template
            .resources
            .get(logical_id)
            .ok_or_else(|| ModelError::UnknownReference {
                path: from.to_string(),
                reference: logical_id.to_string(),
            })
    }

    pub fn build(self) -> Template {
        self.template
    }
}
