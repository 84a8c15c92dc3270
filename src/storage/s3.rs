// Copyright (c) 2025 - Cowboy AI, Inc.
//! Amazon S3 object store

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use tracing::debug;

use super::{ObjectStore, StoreError};

/// Object store backed by S3
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client from a loaded SDK configuration
    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

fn rejected(bucket: &str, key: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Rejected {
        bucket: bucket.to_string(),
        key: key.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        kms_key: Option<&str>,
    ) -> Result<(), StoreError> {
        debug!(bucket, key, encrypted = kms_key.is_some(), "s3 put_object");

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));

        if let Some(kms_key) = kms_key {
            request = request
                .server_side_encryption(ServerSideEncryption::AwsKms)
                .ssekms_key_id(kms_key);
        }

        request
            .send()
            .await
            .map_err(|e| rejected(bucket, key, aws_sdk_s3::error::DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        debug!(bucket, key, "s3 get_object");

        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    return Ok(None);
                }
                return Err(rejected(
                    bucket,
                    key,
                    aws_sdk_s3::error::DisplayErrorContext(err),
                ));
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Some(bytes.into_bytes().to_vec()))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        debug!(bucket, key, "s3 delete_object");

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| rejected(bucket, key, aws_sdk_s3::error::DisplayErrorContext(e)))?;
        Ok(())
    }
}
