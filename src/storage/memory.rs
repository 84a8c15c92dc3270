// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory object store

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ObjectStore, StoreError};

/// Stored object with the encryption key it was written under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub kms_key: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<(String, String), StoredObject>,
    reads: Vec<(String, String)>,
    writes: usize,
    rejected_buckets: BTreeSet<String>,
}

/// Object store kept in process memory
///
/// Cloning shares the underlying map, so a test can keep a handle while the
/// code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as a write
    pub async fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        let mut inner = self.inner.lock().await;
        inner.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.into(),
                kms_key: None,
            },
        );
    }

    /// Stored object, including its encryption key
    pub async fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let inner = self.inner.lock().await;
        inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys stored in a bucket, in key order
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Number of put and delete calls
    pub async fn write_count(&self) -> usize {
        self.inner.lock().await.writes
    }

    /// Every (bucket, key) read so far, in call order
    pub async fn reads(&self) -> Vec<(String, String)> {
        self.inner.lock().await.reads.clone()
    }

    /// Make every put to a bucket fail
    pub async fn reject_bucket(&self, bucket: &str) {
        self.inner
            .lock()
            .await
            .rejected_buckets
            .insert(bucket.to_string());
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        kms_key: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.rejected_buckets.contains(bucket) {
            return Err(StoreError::Rejected {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "access denied".to_string(),
            });
        }

        debug!(bucket, key, bytes = body.len(), encrypted = kms_key.is_some(), "put");
        inner.writes += 1;
        inner.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                kms_key: kms_key.map(String::from),
            },
        );
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.inner.lock().await;
        let location = (bucket.to_string(), key.to_string());
        let body = inner.objects.get(&location).map(|o| o.body.clone());
        inner.reads.push(location);
        Ok(body)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.writes += 1;
        inner
            .objects
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
