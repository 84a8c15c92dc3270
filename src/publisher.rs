// Copyright (c) 2025 - Cowboy AI, Inc.
//! Artifact Publisher
//!
//! Writes a project's artifacts to the shared object store under the fixed
//! key layout in [`naming`](crate::naming):
//!
//! - the configuration document, encrypted with the target's key
//! - the main template and any nested templates, unencrypted so the stack
//!   service can fetch them by URL
//! - provisioning bundles read from local disk
//! - the configuration-management server's TLS pair, encrypted like the
//!   configuration document

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::domain::{Project, Target};
use crate::errors::{FormationError, FormationResult};
use crate::naming::{object_url, ArtifactKey};
use crate::storage::ObjectStore;

/// Configuration document published for dependents
///
/// Field names are part of the published format and are read back by other
/// projects' dependency lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub name: String,
    pub target: String,
    pub prefix: String,
    pub s3_bucket: String,
    pub kms_key: String,
    pub stack_name: String,
    pub config: serde_json::Value,
}

impl ConfigDocument {
    pub fn for_project(
        project: &Project,
        target: &Target,
        kms_key: &str,
        stack_name: &str,
    ) -> Self {
        Self {
            name: project.name.clone(),
            target: target.to_string(),
            prefix: project.prefix.clone(),
            s3_bucket: project.bucket.clone(),
            kms_key: kms_key.to_string(),
            stack_name: stack_name.to_string(),
            config: project.config.clone(),
        }
    }
}

/// Record of one successful put
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub key: ArtifactKey,
    /// Full object key
    pub location: String,
    /// Encryption key the object was written under
    pub kms_key: Option<String>,
    pub bytes: usize,
}

/// Publishes artifacts into one bucket
#[derive(Clone)]
pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// URL the stack service reads an artifact from
    pub fn url(&self, host: &str, key: &ArtifactKey) -> String {
        object_url(host, &self.bucket, &key.to_string())
    }

    async fn put(
        &self,
        key: ArtifactKey,
        body: Vec<u8>,
        kms_key: Option<&str>,
    ) -> FormationResult<PublishedArtifact> {
        let location = key.to_string();
        let bytes = body.len();

        self.store
            .put(&self.bucket, &location, body, kms_key)
            .await
            .map_err(|e| FormationError::ArtifactUpload {
                key: location.clone(),
                reason: e.to_string(),
            })?;

        info!(
            bucket = %self.bucket,
            key = %location,
            kind = %key.kind,
            bytes,
            "Published artifact"
        );

        Ok(PublishedArtifact {
            key,
            location,
            kms_key: kms_key.map(String::from),
            bytes,
        })
    }

    /// Publish the configuration document, encrypted with `kms_key`
    pub async fn publish_config(
        &self,
        project: &Project,
        target: &Target,
        kms_key: &str,
        stack_name: &str,
    ) -> FormationResult<PublishedArtifact> {
        let document = ConfigDocument::for_project(project, target, kms_key, stack_name);
        let mut body = serde_json::to_vec_pretty(&document)?;
        body.push(b'\n');

        self.put(ArtifactKey::config(target, &project.name), body, Some(kms_key))
            .await
    }

    /// Publish a template body under the template root
    pub async fn publish_template(
        &self,
        target: &Target,
        project: &str,
        relative: &str,
        body: &str,
    ) -> FormationResult<PublishedArtifact> {
        self.put(
            ArtifactKey::template(target, project, relative),
            body.as_bytes().to_vec(),
            None,
        )
        .await
    }

    /// Publish a local provisioning bundle for `stack`
    pub async fn publish_bundle(
        &self,
        target: &Target,
        project: &str,
        stack: &str,
        path: &Path,
    ) -> FormationResult<PublishedArtifact> {
        let body = tokio::fs::read(path).await?;
        self.put(ArtifactKey::cookbook_bundle(target, project, stack), body, None)
            .await
    }

    /// Publish a local TLS file for a configuration-management server
    pub async fn publish_chef_server_ssl(
        &self,
        target: &Target,
        project: &str,
        file: &str,
        path: &Path,
        kms_key: &str,
    ) -> FormationResult<PublishedArtifact> {
        let body = tokio::fs::read(path).await?;
        self.put(
            ArtifactKey::chef_server_cert(target, project, file),
            body,
            Some(kms_key),
        )
        .await
    }

    /// Delete an artifact; a missing object is not an error
    pub async fn remove(&self, key: &ArtifactKey) -> FormationResult<()> {
        let location = key.to_string();
        self.store.delete(&self.bucket, &location).await?;
        info!(bucket = %self.bucket, key = %location, "Removed artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KmsKey;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    fn project() -> Project {
        Project::new("web", "deploy-bucket", "acme", KmsKey::Shared("kms-1".into()))
            .with_config(serde_json::json!({ "port": 8080 }))
    }

    fn staging() -> Target {
        Target::new("staging").unwrap()
    }

    #[tokio::test]
    async fn test_config_is_encrypted_and_readable() {
        let store = MemoryStore::new();
        let publisher = ArtifactPublisher::new(Arc::new(store.clone()), "deploy-bucket");

        let artifact = publisher
            .publish_config(&project(), &staging(), "kms-1", "acme-web-staging")
            .await
            .unwrap();
        assert_eq!(artifact.location, "staging/web/config.json");
        assert_eq!(artifact.kms_key.as_deref(), Some("kms-1"));

        let stored = store
            .object("deploy-bucket", "staging/web/config.json")
            .await
            .unwrap();
        assert_eq!(stored.kms_key.as_deref(), Some("kms-1"));

        let document: serde_json::Value = serde_json::from_slice(&stored.body).unwrap();
        assert_eq!(document["stackName"], "acme-web-staging");
        assert_eq!(document["s3Bucket"], "deploy-bucket");
        assert_eq!(document["config"]["port"], 8080);
    }

    #[tokio::test]
    async fn test_templates_are_not_encrypted() {
        let store = MemoryStore::new();
        let publisher = ArtifactPublisher::new(Arc::new(store.clone()), "deploy-bucket");

        publisher
            .publish_template(&staging(), "web", "nested/db.json", "{}")
            .await
            .unwrap();
        let stored = store
            .object("deploy-bucket", "staging/web/cloudformation/nested/db.json")
            .await
            .unwrap();
        assert_eq!(stored.kms_key, None);
    }

    #[tokio::test]
    async fn test_upload_failure_names_the_key() {
        let store = MemoryStore::new();
        store.reject_bucket("deploy-bucket").await;
        let publisher = ArtifactPublisher::new(Arc::new(store), "deploy-bucket");

        let err = publisher
            .publish_template(&staging(), "web", "main.json", "{}")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FormationError::ArtifactUpload { ref key, .. } if key == "staging/web/cloudformation/main.json"
        ));
    }

    #[tokio::test]
    async fn test_missing_bundle_is_io_error() {
        let publisher = ArtifactPublisher::new(Arc::new(MemoryStore::new()), "deploy-bucket");
        let err = publisher
            .publish_bundle(
                &staging(),
                "web",
                "app",
                Path::new("/nonexistent/bundle.tar.gz"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FormationError::Io(_)));
    }

    #[tokio::test]
    async fn test_chef_server_ssl_is_encrypted() {
        let mut cert = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut cert, b"-----BEGIN CERTIFICATE-----").unwrap();
        let store = MemoryStore::new();
        let publisher = ArtifactPublisher::new(Arc::new(store.clone()), "deploy-bucket");

        let artifact = publisher
            .publish_chef_server_ssl(&staging(), "chef", "chef-server.crt", cert.path(), "kms-1")
            .await
            .unwrap();

        assert_eq!(artifact.location, "staging/chef/ssl/chef-server.crt");
        let stored = store
            .object("deploy-bucket", "staging/chef/ssl/chef-server.crt")
            .await
            .unwrap();
        assert_eq!(stored.kms_key.as_deref(), Some("kms-1"));
        assert_eq!(stored.body, b"-----BEGIN CERTIFICATE-----".to_vec());
    }

    #[test]
    fn test_template_url() {
        let publisher = ArtifactPublisher::new(Arc::new(MemoryStore::new()), "deploy-bucket");
        let key = ArtifactKey::main_template(&staging(), "web");
        assert_eq!(
            publisher.url("https://s3.amazonaws.com", &key),
            "https://s3.amazonaws.com/deploy-bucket/staging/web/cloudformation/main.json"
        );
    }
}
