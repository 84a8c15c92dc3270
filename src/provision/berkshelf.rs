// Copyright (c) 2025 - Cowboy AI, Inc.
//! Berkshelf cookbook upload

use serde_json::json;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

use super::runner::{CommandRunner, CommandSpec};
use super::{ensure_success, ChefServer};
use crate::errors::FormationResult;

const CONFIG_PREFIX: &str = "formation-berkshelf-";

/// Vendors, uploads and pins a cookbook's dependencies
///
/// Holds a client config file for the lifetime of the value; it is removed
/// on drop.
pub struct Berkshelf<'a> {
    runner: &'a dyn CommandRunner,
    config: NamedTempFile,
}

impl<'a> Berkshelf<'a> {
    pub fn new(runner: &'a dyn CommandRunner, server: &ChefServer) -> FormationResult<Self> {
        let mut config = tempfile::Builder::new()
            .prefix(CONFIG_PREFIX)
            .suffix(".json")
            .tempfile()?;

        let document = json!({
            "chef": {
                "chef_server_url": server.url,
                "node_name": server.username,
                "client_key": server.user_key,
            },
            "ssl": {
                "verify": server.ssl_verify,
            }
        });
        config.write_all(serde_json::to_string_pretty(&document)?.as_bytes())?;
        config.flush()?;

        Ok(Self { runner, config })
    }

    pub fn config_path(&self) -> &Path {
        self.config.path()
    }

    /// Install, upload and apply `cookbook`'s locked dependencies to `environment`
    pub async fn upload(&self, environment: &str, cookbook: &Path) -> FormationResult<()> {
        let berksfile = cookbook.join("Berksfile");
        let lockfile = cookbook.join("Berksfile.lock");
        let config = path_arg(self.config.path());

        let install = CommandSpec::new("berks").args(["install", "-b", &path_arg(&berksfile)]);
        let output = self.runner.run(&install).await?;
        ensure_success(
            "berks install",
            &output,
            format!("failed to download cookbooks for {}", environment),
        )?;

        let upload = CommandSpec::new("berks").args([
            "upload",
            "-c",
            &config,
            "-b",
            &path_arg(&berksfile),
        ]);
        let output = self.runner.run(&upload).await?;
        ensure_success(
            "berks upload",
            &output,
            format!("failed to upload cookbooks for {}", environment),
        )?;

        let apply = CommandSpec::new("berks").args([
            "apply",
            environment,
            "-c",
            &config,
            "-b",
            &path_arg(&lockfile),
        ]);
        let output = self.runner.run(&apply).await?;
        ensure_success(
            "berks apply",
            &output,
            format!("failed to apply cookbooks to {}", environment),
        )?;

        info!(environment, cookbook = %cookbook.display(), "Cookbooks uploaded");
        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FormationError;
    use crate::provision::runner::RecordingRunner;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn server() -> ChefServer {
        ChefServer {
            url: "https://chef.example.com/organizations/acme".to_string(),
            username: "deployer".to_string(),
            user_key: PathBuf::from("/keys/deployer.pem"),
            organization: "acme".to_string(),
            validation_key: PathBuf::from("/keys/acme.pem"),
            ssl_verify: false,
        }
    }

    #[test]
    fn test_config_file_contents() {
        let runner = RecordingRunner::new();
        let berks = Berkshelf::new(&runner, &server()).unwrap();

        let name = berks
            .config_path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with(CONFIG_PREFIX));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(berks.config_path()).unwrap()).unwrap();
        assert_eq!(
            written,
            json!({
                "chef": {
                    "chef_server_url": "https://chef.example.com/organizations/acme",
                    "node_name": "deployer",
                    "client_key": "/keys/deployer.pem"
                },
                "ssl": { "verify": false }
            })
        );
    }

    #[test]
    fn test_config_file_removed_on_drop() {
        let runner = RecordingRunner::new();
        let berks = Berkshelf::new(&runner, &server()).unwrap();
        let path = berks.config_path().to_path_buf();
        assert!(path.exists());
        drop(berks);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_upload_runs_install_upload_apply() {
        let runner = RecordingRunner::new();
        let berks = Berkshelf::new(&runner, &server()).unwrap();
        let config = berks.config_path().display().to_string();

        berks
            .upload("acme-web-staging", Path::new("cookbooks/web"))
            .await
            .unwrap();

        assert_eq!(
            runner.command_lines().await,
            vec![
                "berks install -b cookbooks/web/Berksfile".to_string(),
                format!("berks upload -c {} -b cookbooks/web/Berksfile", config),
                format!(
                    "berks apply acme-web-staging -c {} -b cookbooks/web/Berksfile.lock",
                    config
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_upload_failure_stops_before_apply() {
        let runner = RecordingRunner::new();
        runner.fail("berks upload", "401 Unauthorized").await;
        let berks = Berkshelf::new(&runner, &server()).unwrap();

        let err = berks
            .upload("acme-web-staging", Path::new("cookbooks/web"))
            .await
            .unwrap_err();

        match err {
            FormationError::Provisioning { step, detail } => {
                assert_eq!(step, "berks upload");
                assert!(detail.starts_with("failed to upload cookbooks for acme-web-staging"));
                assert!(detail.contains("401 Unauthorized"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.commands().await.len(), 2);
    }
}
