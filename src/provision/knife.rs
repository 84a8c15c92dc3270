// Copyright (c) 2025 - Cowboy AI, Inc.
//! Knife environment, bootstrap and node cleanup commands

use std::path::Path;
use tracing::{debug, info};

use super::runner::{CommandRunner, CommandSpec};
use super::{ensure_success, ChefServer};
use crate::errors::FormationResult;

/// One host to bootstrap through the bastion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapRequest<'a> {
    pub environment: &'a str,
    /// Cookbook whose default recipe becomes the run list
    pub cookbook: &'a str,
    pub hostname: &'a str,
    pub bastion_hostname: &'a str,
    pub ssh_user: &'a str,
    pub private_key: &'a Path,
}

/// Knife client for one configuration-management server
pub struct Knife<'a> {
    runner: &'a dyn CommandRunner,
    server: &'a ChefServer,
}

impl<'a> Knife<'a> {
    pub fn new(runner: &'a dyn CommandRunner, server: &'a ChefServer) -> Self {
        Self { runner, server }
    }

    fn command(&self, args: &[&str]) -> CommandSpec {
        let mut command = CommandSpec::new("knife").args(args.iter().copied()).args([
            "--server-url",
            self.server.url.as_str(),
            "--user",
            self.server.username.as_str(),
            "--key",
        ]);
        command = command.arg(self.server.user_key.display().to_string());
        if !self.server.ssl_verify {
            command = command.args(["--config-option", "ssl_verify_mode=verify_none"]);
        }
        command
    }

    /// Whether `environment` is already defined on the server
    pub async fn environment_exists(&self, environment: &str) -> FormationResult<bool> {
        let output = self
            .runner
            .run(&self.command(&["environment", "show", environment]))
            .await?;
        Ok(output.is_success())
    }

    /// Create `environment` unless it exists
    pub async fn create_environment(&self, environment: &str) -> FormationResult<()> {
        if self.environment_exists(environment).await? {
            info!(environment, "Environment already exists");
            return Ok(());
        }

        let output = self
            .runner
            .run(&self.command(&["environment", "create", environment, "--disable-editing"]))
            .await?;
        ensure_success(
            "knife environment create",
            &output,
            format!("failed to create environment {}", environment),
        )?;
        info!(environment, "Environment created");
        Ok(())
    }

    /// Bootstrap a host, tunnelling SSH through the bastion
    pub async fn bootstrap(&self, request: &BootstrapRequest<'_>) -> FormationResult<()> {
        let gateway = format!("{}@{}", request.ssh_user, request.bastion_hostname);
        let key = request.private_key.display().to_string();
        let run_list = format!("recipe[{}]", request.cookbook);
        let validation_client = format!(
            "validation_client_name={}-validator",
            self.server.organization
        );
        let validation_key = format!("validation_key={}", self.server.validation_key.display());

        let output = self
            .runner
            .run(&self.command(&[
                "bootstrap",
                request.hostname,
                "--sudo",
                "--ssh-user",
                request.ssh_user,
                "--identity-file",
                &key,
                "--ssh-gateway",
                &gateway,
                "--node-name",
                request.hostname,
                "--environment",
                request.environment,
                "--run-list",
                &run_list,
                "--config-option",
                &validation_client,
                "--config-option",
                &validation_key,
                "--yes",
            ]))
            .await?;
        ensure_success(
            "knife bootstrap",
            &output,
            format!("failed to bootstrap {}", request.hostname),
        )?;
        info!(host = request.hostname, environment = request.environment, "Host bootstrapped");
        Ok(())
    }

    /// Delete the node and API client registered for `hostname`
    ///
    /// Each is deleted only when the server knows it. Returns whether
    /// anything was removed.
    pub async fn deregister(&self, hostname: &str) -> FormationResult<bool> {
        let mut removed = false;
        for kind in ["node", "client"] {
            let shown = self.runner.run(&self.command(&[kind, "show", hostname])).await?;
            if !shown.is_success() {
                debug!(host = hostname, kind, "Not registered");
                continue;
            }

            let output = self
                .runner
                .run(&self.command(&[kind, "delete", hostname, "--yes"]))
                .await?;
            ensure_success(
                &format!("knife {} delete", kind),
                &output,
                format!("failed to delete {} {}", kind, hostname),
            )?;
            removed = true;
        }
        if removed {
            info!(host = hostname, "Host deregistered");
        }
        Ok(removed)
    }
}
