// Copyright (c) 2025 - Cowboy AI, Inc.
//! Configuration-management server keys
//!
//! The server stack writes the deploying user's key and the organization's
//! validator key to the bucket at first boot. Provisioning reads them back
//! into private temporary files for `knife` and `berks`.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::domain::Target;
use crate::errors::{FormationError, FormationResult};
use crate::naming::ArtifactKey;
use crate::storage::ObjectStore;

/// Downloaded user and organization keys, removed on drop
#[derive(Debug)]
pub struct ChefKeys {
    user: NamedTempFile,
    organization: NamedTempFile,
}

impl ChefKeys {
    /// Fetch both keys published by the `server` project for `target`
    pub async fn download(
        store: &dyn ObjectStore,
        bucket: &str,
        target: &Target,
        server: &str,
        username: &str,
        organization: &str,
    ) -> FormationResult<Self> {
        Ok(Self {
            user: fetch(store, bucket, &ArtifactKey::chef_key(target, server, username), server)
                .await?,
            organization: fetch(
                store,
                bucket,
                &ArtifactKey::chef_key(target, server, organization),
                server,
            )
            .await?,
        })
    }

    pub fn user_key(&self) -> &Path {
        self.user.path()
    }

    /// Organization validator key
    pub fn organization_key(&self) -> &Path {
        self.organization.path()
    }
}

async fn fetch(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &ArtifactKey,
    server: &str,
) -> FormationResult<NamedTempFile> {
    let location = key.to_string();
    let body = store.get(bucket, &location).await?.ok_or_else(|| {
        FormationError::DependencyUnresolved {
            dependency: server.to_string(),
            reason: format!("no key at s3://{}/{}", bucket, location),
        }
    })?;

    let mut file = tempfile::Builder::new()
        .prefix("formation-key-")
        .suffix(".pem")
        .tempfile()?;
    file.write_all(&body)?;
    file.flush()?;
    debug!(key = %location, "Downloaded server key");
    Ok(file)
}
