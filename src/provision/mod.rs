// Copyright (c) 2025 - Cowboy AI, Inc.
//! Configuration-management provisioning
//!
//! A thin sequential pipeline over the `knife` and `berks` command-line
//! tools. After the server stack is ready its keys are fetched from the
//! bucket, one environment is created for the project, then each host gets
//! its cookbook uploaded and is bootstrapped through the bastion. The first
//! non-zero exit stops the pipeline; already converged stacks are left
//! alone.
//!
//! Deprovisioning removes each host's node and client from the server.

pub mod berkshelf;
pub mod keys;
pub mod knife;
pub mod runner;

pub use berkshelf::Berkshelf;
pub use keys::ChefKeys;
pub use knife::{BootstrapRequest, Knife};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, RecordingRunner, ShellRunner};

use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ReadinessPolicy;
use crate::domain::{Project, ProvisioningSpec, Target};
use crate::errors::{FormationError, FormationResult};
use crate::naming::stack_name;
use crate::stack::{wait_until_ready, StackService};
use crate::storage::ObjectStore;

/// Connection settings for the configuration-management server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChefServer {
    /// Organization URL
    pub url: String,
    pub username: String,
    pub user_key: PathBuf,
    pub organization: String,
    /// Organization validator key handed to bootstrapped nodes
    pub validation_key: PathBuf,
    pub ssl_verify: bool,
}

impl ChefServer {
    fn new(spec: &ProvisioningSpec, keys: &ChefKeys) -> FormationResult<Self> {
        Ok(Self {
            url: spec.chef_server_url()?,
            username: spec.username.clone(),
            user_key: keys.user_key().to_path_buf(),
            organization: spec.organization.clone(),
            validation_key: keys.organization_key().to_path_buf(),
            ssl_verify: spec.ssl_verify,
        })
    }
}

/// Turn a non-zero exit into a provisioning failure
pub(crate) fn ensure_success(
    step: &str,
    output: &CommandOutput,
    message: String,
) -> FormationResult<()> {
    if output.is_success() {
        return Ok(());
    }
    Err(FormationError::Provisioning {
        step: step.to_string(),
        detail: format!("{}: {}", message, output.describe()),
    })
}

/// Outcome of a provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub environment: String,
    /// Fully qualified names, in bootstrap order
    pub hosts: Vec<String>,
}

/// Runs the provisioning pipeline for one project and target
pub struct Provisioner<'a> {
    stacks: &'a dyn StackService,
    store: &'a dyn ObjectStore,
    runner: &'a dyn CommandRunner,
    readiness: ReadinessPolicy,
    cancel: &'a CancellationToken,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        stacks: &'a dyn StackService,
        store: &'a dyn ObjectStore,
        runner: &'a dyn CommandRunner,
        readiness: ReadinessPolicy,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            stacks,
            store,
            runner,
            readiness,
            cancel,
        }
    }

    fn spec<'p>(project: &'p Project) -> FormationResult<&'p ProvisioningSpec> {
        project.provisioning.as_ref().ok_or_else(|| {
            FormationError::Configuration(format!(
                "project {} has no provisioning section",
                project.name
            ))
        })
    }

    /// Wait for the server stack, then fetch its keys
    async fn connect(
        &self,
        project: &Project,
        spec: &ProvisioningSpec,
        target: &Target,
    ) -> FormationResult<ChefKeys> {
        let server_stack = stack_name(&project.prefix, &spec.server_stack, target);
        wait_until_ready(self.stacks, &server_stack, self.readiness, self.cancel).await?;

        ChefKeys::download(
            self.store,
            &project.bucket,
            target,
            &spec.server_stack,
            &spec.username,
            &spec.organization,
        )
        .await
    }

    pub async fn provision(
        &self,
        project: &Project,
        target: &Target,
    ) -> FormationResult<ProvisionReport> {
        let spec = Self::spec(project)?;
        let keys = self.connect(project, spec, target).await?;
        let server = ChefServer::new(spec, &keys)?;
        let bastion = spec.bastion_hostname()?;
        let environment = stack_name(&project.prefix, &project.name, target);

        let knife = Knife::new(self.runner, &server);
        let berkshelf = Berkshelf::new(self.runner, &server)?;

        knife.create_environment(&environment).await?;

        let mut hosts = Vec::with_capacity(spec.hosts.len());
        for host in &spec.hosts {
            if self.cancel.is_cancelled() {
                return Err(FormationError::Cancelled(format!(
                    "provisioning of {}",
                    environment
                )));
            }

            let hostname = spec.hosted_zone_name.with_label(&host.sub_domain)?;
            let cookbook = host
                .cookbook
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    FormationError::Configuration(format!(
                        "cookbook path for {} has no directory name",
                        host.sub_domain
                    ))
                })?;

            info!(host = %hostname, cookbook = %cookbook, "Provisioning host");
            berkshelf.upload(&environment, &host.cookbook).await?;
            knife
                .bootstrap(&BootstrapRequest {
                    environment: &environment,
                    cookbook: &cookbook,
                    hostname: hostname.as_str(),
                    bastion_hostname: bastion.as_str(),
                    ssh_user: &spec.ssh_user,
                    private_key: &spec.private_key,
                })
                .await?;
            hosts.push(hostname.to_string());
        }

        info!(environment = %environment, hosts = hosts.len(), "Provisioning complete");
        Ok(ProvisionReport { environment, hosts })
    }

    /// Remove every host's node and client from the server
    ///
    /// Returns the hosts that were registered, in declaration order.
    pub async fn deprovision(&self, project: &Project, target: &Target) -> FormationResult<Vec<String>> {
        let spec = Self::spec(project)?;
        let keys = self.connect(project, spec, target).await?;
        let server = ChefServer::new(spec, &keys)?;
        let knife = Knife::new(self.runner, &server);

        let mut deregistered = Vec::new();
        for host in &spec.hosts {
            let hostname = spec.hosted_zone_name.with_label(&host.sub_domain)?;
            if knife.deregister(hostname.as_str()).await? {
                deregistered.push(hostname.to_string());
            }
        }
        Ok(deregistered)
    }
}
