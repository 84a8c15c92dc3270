// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment Domain Models
//!
//! Value types describing what a deployment should look like. Nothing in this
//! module performs I/O; the records are produced by the configuration
//! front-end and consumed by template synthesis and the deploy flow.
//!
//! # Value Objects with Invariants
//!
//! - [`Cidr`] - IPv4 CIDR block with containment checks
//! - [`DnsName`] - RFC 1123 hosted-zone and host names
//! - [`VolumeType`] - block volume taxonomy
//! - [`Target`] - deployment environment name
//!
//! # Resource Model
//!
//! - [`ResourceModel`] → [`Vpc`] → [`Subnet`] → [`Instance`] → [`Volume`]
//! - [`Bootstrap`] with [`NatSpec`], [`BastionSpec`], [`ChefServerSpec`]
//!
//! # Project
//!
//! - [`Project`], [`Dependency`], [`KmsKey`], [`ParameterValue`],
//!   [`ProvisioningSpec`]

pub mod dns;
pub mod invariants;
pub mod network;
pub mod project;
pub mod resource_model;
pub mod volume;

pub use dns::DnsName;
pub use invariants::{validate_model, ModelError};
pub use network::Cidr;
pub use project::{
    ChefServerSsl, Dependency, KmsKey, ParameterValue, Project, ProvisionedHost, ProvisioningSpec,
    Target,
};
pub use resource_model::{
    BastionSpec, Bootstrap, ChefServerSpec, Instance, NatSpec, ResourceModel, Subnet, Volume, Vpc,
};
pub use volume::VolumeType;
