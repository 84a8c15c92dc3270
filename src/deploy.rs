// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deploy orchestration
//!
//! [`Formation`] ties synthesis, publishing, dependency resolution and
//! convergence together for one project and target.
//!
//! ```text
//! deploy:
//!   check protection ─▶ validate project ─▶ synthesize ─▶ bind parameters
//!     ─▶ resolve dependencies ─▶ validate templates
//!     ─▶ publish TLS pair, config, templates, bundles ─▶ converge stack [─▶ wait]
//!
//! destroy:
//!   check protection ─▶ delete stack ─▶ remove artifacts ─▶ deregister hosts
//! ```
//!
//! Every failure that can be detected locally or by reading (model errors,
//! unresolved parameters, unpublished or unready dependencies, rejected
//! templates) surfaces before the first artifact is written.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::FormationConfig;
use crate::dependency::DependencyResolver;
use crate::domain::{ModelError, Project, Target};
use crate::errors::{FormationError, FormationResult};
use crate::naming::{stack_name, ArtifactKey, CHEF_SERVER_CERT, CHEF_SERVER_KEY, MAIN_TEMPLATE};
use crate::provision::{CommandRunner, ProvisionReport, Provisioner, ShellRunner};
use crate::publisher::ArtifactPublisher;
use crate::stack::{
    declared_parameters, plan_bindings, wait_until_ready, Binding, ConvergenceEngine,
    ConvergenceReport, StackRequest, StackService, StackStatus, WellKnownValues,
};
use crate::storage::ObjectStore;
use crate::template::Synthesizer;

/// Deploy behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Poll the stack until it is ready after converging
    pub wait: bool,
    /// Allow deploying to a protected target
    pub confirm_protected: bool,
}

/// Destroy behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyOptions {
    /// Allow destroying a protected target
    pub confirm_protected: bool,
}

/// Outcome of a deploy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployReport {
    pub stack_name: String,
    pub template_url: String,
    /// Parameters passed to the stack service
    pub parameters: BTreeMap<String, String>,
    /// Object keys written, in publish order
    pub artifacts: Vec<String>,
    pub convergence: ConvergenceReport,
}

/// Outcome of a destroy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestroyReport {
    pub stack_name: String,
    /// Object keys removed
    pub removed: Vec<String>,
    /// Hosts removed from the configuration-management server
    pub deregistered: Vec<String>,
}

/// Render a project's main template body for a stack region
///
/// Synthesized from the resource model when there is one, otherwise taken
/// from the project's own `main.json`.
pub fn render(project: &Project, region: &str) -> FormationResult<String> {
    project.validate()?;

    match &project.resources {
        Some(model) => {
            for (name, vpc) in &model.vpcs {
                if vpc.region != region {
                    return Err(ModelError::RegionMismatch {
                        path: name.clone(),
                        expected: region.to_string(),
                        actual: vpc.region.clone(),
                    }
                    .into());
                }
            }
            Synthesizer::new(format!("{} stack", project.name))
                .synthesize(model)?
                .to_json_pretty()
        }
        None => project.templates.get(MAIN_TEMPLATE).cloned().ok_or_else(|| {
            FormationError::Configuration(format!(
                "project {} has neither resources nor a {} template",
                project.name, MAIN_TEMPLATE
            ))
        }),
    }
}

/// Orchestrates deploy, destroy and provision for projects
pub struct Formation {
    store: Arc<dyn ObjectStore>,
    stacks: Arc<dyn StackService>,
    runner: Arc<dyn CommandRunner>,
    config: FormationConfig,
    cancel: CancellationToken,
}

impl Formation {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        stacks: Arc<dyn StackService>,
        config: FormationConfig,
    ) -> Self {
        Self {
            store,
            stacks,
            runner: Arc::new(ShellRunner),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different runner for provisioning commands
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Token that aborts readiness polling and provisioning when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &FormationConfig {
        &self.config
    }

    fn region<'p>(&'p self, project: &'p Project) -> &'p str {
        project.region.as_deref().unwrap_or(&self.config.region)
    }

    fn kms_key<'p>(project: &'p Project, target: &Target) -> FormationResult<&'p str> {
        project.kms_key.for_target(target).ok_or_else(|| {
            FormationError::Configuration(format!(
                "project {} has no KMS key for target {}",
                project.name, target
            ))
        })
    }

    fn check_protected(project: &Project, target: &Target, confirmed: bool) -> FormationResult<()> {
        if project.is_protected(target) && !confirmed {
            warn!(project = %project.name, target = %target, "Refusing unconfirmed change to protected target");
            return Err(FormationError::ProtectedTarget(target.to_string()));
        }
        Ok(())
    }

    /// Render the main template body for a project
    pub fn synth(&self, project: &Project) -> FormationResult<String> {
        render(project, self.region(project))
    }

    /// Publish a project's artifacts and converge its stack
    pub async fn deploy(
        &self,
        project: &Project,
        target: &Target,
        options: DeployOptions,
    ) -> FormationResult<DeployReport> {
        Self::check_protected(project, target, options.confirm_protected)?;
        let body = self.synth(project)?;
        let kms_key = Self::kms_key(project, target)?;
        let region = self.region(project);
        let stack = stack_name(&project.prefix, &project.name, target);
        info!(stack = %stack, target = %target, "Deploying");

        let well_known =
            WellKnownValues::for_project(project, target, region, kms_key, &self.config.template_host);
        let declared = declared_parameters(&body)?;
        let bindings = plan_bindings(&declared, &well_known, &project.parameters)?;
        let parameters = self.resolve(project, target, bindings).await?;

        let engine = ConvergenceEngine::new(self.stacks.as_ref());
        for (relative, nested) in project.templates.iter().filter(|(r, _)| *r != MAIN_TEMPLATE) {
            engine.validate(nested).await.map_err(|e| {
                warn!(template = %relative, "Nested template rejected");
                e
            })?;
        }
        let template = engine.validate(&body).await?;

        let publisher = ArtifactPublisher::new(self.store.clone(), project.bucket.clone());
        let mut artifacts = Vec::new();

        if let Some(ssl) = &project.chef_server_ssl {
            for (file, path) in [(CHEF_SERVER_CERT, &ssl.cert), (CHEF_SERVER_KEY, &ssl.key)] {
                let published = publisher
                    .publish_chef_server_ssl(target, &project.name, file, path, kms_key)
                    .await?;
                artifacts.push(published.location);
            }
        }

        let config = publisher
            .publish_config(project, target, kms_key, &stack)
            .await?;
        artifacts.push(config.location);

        for (relative, nested) in project.templates.iter().filter(|(r, _)| *r != MAIN_TEMPLATE) {
            let published = publisher
                .publish_template(target, &project.name, relative, nested)
                .await?;
            artifacts.push(published.location);
        }

        for (bundle_stack, path) in &project.bundles {
            let published = publisher
                .publish_bundle(target, &project.name, bundle_stack, path)
                .await?;
            artifacts.push(published.location);
        }

        let main_key = ArtifactKey::main_template(target, &project.name);
        let main = publisher
            .publish_template(target, &project.name, MAIN_TEMPLATE, &body)
            .await?;
        artifacts.push(main.location);
        let template_url = publisher.url(&self.config.template_host, &main_key);

        let request = StackRequest::new(&stack, &template_url)
            .with_parameters(parameters.clone())
            .with_capabilities(self.config.capabilities.clone());

        let convergence = if options.wait {
            engine
                .converge_validated_and_wait(template, &request, self.config.readiness(), &self.cancel)
                .await?
        } else {
            engine.converge_validated(template, &request).await?
        };

        info!(stack = %stack, state = %convergence.state, "Deploy finished");
        Ok(DeployReport {
            stack_name: stack,
            template_url,
            parameters,
            artifacts,
            convergence,
        })
    }

    /// Turn a binding plan into concrete values
    ///
    /// Every declared dependency must have a published configuration, even
    /// when no parameter reads from it. Each dependency stack a binding
    /// uses is waited on once, before its first lookup.
    async fn resolve(
        &self,
        project: &Project,
        target: &Target,
        bindings: BTreeMap<String, Binding<'_>>,
    ) -> FormationResult<BTreeMap<String, String>> {
        let mut resolver = DependencyResolver::new(
            self.store.clone(),
            project.bucket.clone(),
            target.clone(),
            &project.dependencies,
        );
        for dependency in &project.dependencies {
            resolver.document(&dependency.name).await?;
        }

        let mut ready = BTreeSet::new();
        let mut values = BTreeMap::new();

        for (name, binding) in bindings {
            let value = match binding {
                Binding::Value(value) => value,
                Binding::Dependency { dependency, key } => {
                    if !ready.contains(dependency) {
                        let dependency_target = resolver.target_of(dependency)?;
                        let dependency_stack =
                            stack_name(&project.prefix, dependency, &dependency_target);
                        wait_until_ready(
                            self.stacks.as_ref(),
                            &dependency_stack,
                            self.config.readiness(),
                            &self.cancel,
                        )
                        .await?;
                        ready.insert(dependency);
                    }
                    resolver.lookup(dependency, key).await?
                }
            };
            values.insert(name, value);
        }
        Ok(values)
    }

    /// Wait for a project's stack to become ready
    pub async fn wait_ready(&self, project: &Project, target: &Target) -> FormationResult<StackStatus> {
        let stack = stack_name(&project.prefix, &project.name, target);
        wait_until_ready(self.stacks.as_ref(), &stack, self.config.readiness(), &self.cancel).await
    }

    /// Delete a project's stack and its published artifacts
    ///
    /// Hosts the project provisioned are removed from the
    /// configuration-management server last.
    pub async fn destroy(
        &self,
        project: &Project,
        target: &Target,
        options: DestroyOptions,
    ) -> FormationResult<DestroyReport> {
        Self::check_protected(project, target, options.confirm_protected)?;
        project.validate()?;
        let stack = stack_name(&project.prefix, &project.name, target);
        info!(stack = %stack, "Destroying stack");
        self.stacks.delete_stack(&stack).await?;

        let mut keys = vec![
            ArtifactKey::config(target, &project.name),
            ArtifactKey::main_template(target, &project.name),
        ];
        if project.chef_server_ssl.is_some() {
            keys.extend(
                [CHEF_SERVER_CERT, CHEF_SERVER_KEY]
                    .into_iter()
                    .map(|file| ArtifactKey::chef_server_cert(target, &project.name, file)),
            );
        }
        keys.extend(
            project
                .templates
                .keys()
                .filter(|relative| relative.as_str() != MAIN_TEMPLATE)
                .map(|relative| ArtifactKey::template(target, &project.name, relative)),
        );
        keys.extend(
            project
                .bundles
                .keys()
                .map(|bundle| ArtifactKey::cookbook_bundle(target, &project.name, bundle)),
        );

        let publisher = ArtifactPublisher::new(self.store.clone(), project.bucket.clone());
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            publisher.remove(&key).await?;
            removed.push(key.to_string());
        }

        let deregistered = match project.provisioning {
            Some(_) => self.provisioner().deprovision(project, target).await?,
            None => Vec::new(),
        };

        Ok(DestroyReport {
            stack_name: stack,
            removed,
            deregistered,
        })
    }

    fn provisioner(&self) -> Provisioner<'_> {
        Provisioner::new(
            self.stacks.as_ref(),
            self.store.as_ref(),
            self.runner.as_ref(),
            self.config.readiness(),
            &self.cancel,
        )
    }

    /// Run the configuration-management pipeline for a project
    pub async fn provision(
        &self,
        project: &Project,
        target: &Target,
    ) -> FormationResult<ProvisionReport> {
        project.validate()?;
        self.provisioner().provision(project, target).await
    }
}
