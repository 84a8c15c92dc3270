// Copyright (c) 2025 - Cowboy AI, Inc.
//! Object Store
//!
//! The shared artifact store between projects and targets. Publishing writes
//! to it, dependency resolution reads from it, and the stack service fetches
//! templates from it by URL.
//!
//! # Implementations
//!
//! - [`MemoryStore`] - in-process map, used by tests and dry runs
//! - `S3Store` - Amazon S3 (feature `aws`)

use async_trait::async_trait;

pub mod memory;
#[cfg(feature = "aws")]
pub mod s3;

pub use memory::{MemoryStore, StoredObject};
#[cfg(feature = "aws")]
pub use s3::S3Store;

/// Errors returned by an object store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store refused the request (permissions, encryption, bad bucket)
    #[error("s3://{bucket}/{key}: {reason}")]
    Rejected {
        bucket: String,
        key: String,
        reason: String,
    },

    /// The store could not be reached
    #[error("Object store unavailable: {0}")]
    Unavailable(String),
}

/// Remote key/value blob store
///
/// Operations on a single key are expected to be read-your-writes
/// consistent.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, encrypting it server-side when a key is given
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        kms_key: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Read an object; `None` when the key does not exist
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}
