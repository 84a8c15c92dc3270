// Copyright (c) 2025 - Cowboy AI, Inc.
//! Dependency Resolver
//!
//! Reads other projects' published configuration documents from the shared
//! store and looks values up by dotted path. The resolver never writes.
//! Each dependency document is fetched at most once per resolver and cached
//! for its lifetime.
//!
//! ```text
//! lookup("network", "config.vpc.cidr")
//!   → get {dep_target}/network/config.json
//!   → walk config → vpc → cidr
//! ```

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Dependency, Target};
use crate::errors::{FormationError, FormationResult};
use crate::naming::ArtifactKey;
use crate::storage::ObjectStore;

fn unresolved(dependency: &str, reason: impl Into<String>) -> FormationError {
    FormationError::DependencyUnresolved {
        dependency: dependency.to_string(),
        reason: reason.into(),
    }
}

/// Walk a dotted path through objects and arrays
pub fn lookup_path<'v>(document: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(document, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Scalar value as a parameter string
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Lazy, read-only resolver over a project's declared dependencies
pub struct DependencyResolver {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    target: Target,
    dependencies: BTreeMap<String, Dependency>,
    cache: BTreeMap<String, Value>,
}

impl DependencyResolver {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        target: Target,
        dependencies: &[Dependency],
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            target,
            dependencies: dependencies
                .iter()
                .map(|d| (d.name.clone(), d.clone()))
                .collect(),
            cache: BTreeMap::new(),
        }
    }

    /// Declared dependency by name
    pub fn dependency(&self, name: &str) -> FormationResult<&Dependency> {
        self.dependencies
            .get(name)
            .ok_or_else(|| unresolved(name, "not declared by this project"))
    }

    /// Target a dependency is read from
    pub fn target_of(&self, name: &str) -> FormationResult<Target> {
        Ok(self.dependency(name)?.resolved_target(&self.target).clone())
    }

    /// Published configuration document of a dependency
    pub async fn document(&mut self, name: &str) -> FormationResult<&Value> {
        if !self.cache.contains_key(name) {
            let target = self.target_of(name)?;
            let key = ArtifactKey::config(&target, name).to_string();
            debug!(dependency = name, key = %key, "Fetching dependency configuration");

            let body = self
                .store
                .get(&self.bucket, &key)
                .await
                .map_err(|e| unresolved(name, e.to_string()))?
                .ok_or_else(|| unresolved(name, format!("no published configuration at {}", key)))?;

            let document: Value = serde_json::from_slice(&body)
                .map_err(|e| unresolved(name, format!("unreadable configuration: {}", e)))?;
            self.cache.insert(name.to_string(), document);
        }

        self.cache
            .get(name)
            .ok_or_else(|| unresolved(name, "configuration not cached"))
    }

    /// Value at a dotted path in a dependency's published configuration
    pub async fn lookup(&mut self, name: &str, key: &str) -> FormationResult<String> {
        let document = self.document(name).await?;
        let value = lookup_path(document, key)
            .ok_or_else(|| unresolved(name, format!("no value at '{}'", key)))?;
        scalar_text(value)
            .ok_or_else(|| unresolved(name, format!("value at '{}' is not a scalar", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn staging() -> Target {
        Target::new("staging").unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let document = json!({
            "name": "network",
            "stackName": "acme-network-staging",
            "config": { "vpc": { "cidr": "10.0.0.0/16", "azs": ["a", "b"] }, "nat": true, "port": 22 }
        });
        store
            .insert("bucket", "staging/network/config.json", document.to_string())
            .await;
        store
    }

    #[test]
    fn test_lookup_path() {
        let doc = json!({"a": {"b": [{"c": 1}]}});
        assert_eq!(lookup_path(&doc, "a.b.0.c"), Some(&json!(1)));
        assert_eq!(lookup_path(&doc, "a.x"), None);
        assert_eq!(lookup_path(&doc, ""), Some(&doc));
    }

    #[tokio::test]
    async fn test_lookup_scalars() {
        let store = seeded().await;
        let mut resolver = DependencyResolver::new(
            Arc::new(store),
            "bucket",
            staging(),
            &[Dependency::new("network")],
        );

        assert_eq!(
            resolver.lookup("network", "config.vpc.cidr").await.unwrap(),
            "10.0.0.0/16"
        );
        assert_eq!(resolver.lookup("network", "config.nat").await.unwrap(), "true");
        assert_eq!(resolver.lookup("network", "config.port").await.unwrap(), "22");
        assert_eq!(
            resolver.lookup("network", "config.vpc.azs.1").await.unwrap(),
            "b"
        );
    }

    #[tokio::test]
    async fn test_document_fetched_once_and_never_written() {
        let store = seeded().await;
        let mut resolver = DependencyResolver::new(
            Arc::new(store.clone()),
            "bucket",
            staging(),
            &[Dependency::new("network")],
        );

        resolver.lookup("network", "name").await.unwrap();
        resolver.lookup("network", "stackName").await.unwrap();

        assert_eq!(store.reads().await.len(), 1);
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_undeclared_dependency() {
        let store = seeded().await;
        let mut resolver = DependencyResolver::new(Arc::new(store), "bucket", staging(), &[]);
        let err = resolver.lookup("network", "name").await.unwrap_err();
        assert!(err.is_unresolved());
    }

    #[tokio::test]
    async fn test_missing_artifact_and_non_scalar() {
        let store = seeded().await;
        let mut resolver = DependencyResolver::new(
            Arc::new(store),
            "bucket",
            staging(),
            &[
                Dependency::new("network"),
                Dependency::new("dns").in_target(Target::new("shared").unwrap()),
            ],
        );

        assert!(matches!(
            resolver.lookup("dns", "zone").await,
            Err(FormationError::DependencyUnresolved { ref dependency, .. }) if dependency == "dns"
        ));
        assert!(resolver.lookup("network", "config.vpc").await.is_err());
    }
}
