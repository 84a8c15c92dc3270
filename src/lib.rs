// Copyright (c) 2025 - Cowboy AI, Inc.
//! Template synthesis and stack convergence for declarative deployments
//!
//! A project's resource model is compiled into a provider template, its
//! configuration and templates are published to a shared object store, and
//! its stack is converged with an update-first, create-on-missing flow.
//! Dependent projects read each other's published configuration and wait for
//! each other's stacks to become ready.
//!
//! Remote collaborators sit behind traits ([`storage::ObjectStore`],
//! [`stack::StackService`], [`provision::CommandRunner`]) with in-memory
//! implementations for tests and AWS implementations behind the `aws`
//! feature.

pub mod config;
pub mod dependency;
pub mod deploy;
pub mod domain;
pub mod errors;
pub mod naming;
pub mod provision;
pub mod publisher;
pub mod stack;
pub mod state_machine;
pub mod storage;
pub mod template;

// Re-export commonly used types
pub use config::{FormationConfig, ReadinessPolicy};
pub use deploy::{DeployOptions, DeployReport, DestroyOptions, DestroyReport, Formation};
pub use domain::{Project, ResourceModel, Target};
pub use errors::{FormationError, FormationResult};
pub use template::{synthesize, Template};
