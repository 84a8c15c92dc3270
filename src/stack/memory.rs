// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory stack service
//!
//! Behaves like the remote service for the calls convergence makes:
//! update of a missing stack reports `NotFound`, update with an unchanged
//! template and parameters reports `NoChanges`, create of an existing stack
//! reports `AlreadyExists`. Every call is recorded so tests can assert on
//! exact call sequences.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{StackRequest, StackService, StackServiceError, StackStatus};

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCall {
    Validate,
    Update(String),
    Create(String),
    Describe(String),
    Delete(String),
}

#[derive(Debug, Default)]
struct FakeStack {
    request: Option<StackRequest>,
    body: Option<String>,
    /// Reported in order; the last one repeats
    statuses: VecDeque<StackStatus>,
}

#[derive(Debug, Default)]
struct Inner {
    stacks: BTreeMap<String, FakeStack>,
    calls: Vec<StackCall>,
    last_validated: Option<String>,
    validation_error: Option<String>,
    update_errors: BTreeMap<String, VecDeque<StackServiceError>>,
    create_errors: BTreeMap<String, VecDeque<StackServiceError>>,
    /// Statuses reported after the next accepted create or update
    settle: BTreeMap<String, VecDeque<StackStatus>>,
}

impl Inner {
    fn settled(&mut self, name: &str, default: &str) -> VecDeque<StackStatus> {
        self.settle
            .remove(name)
            .unwrap_or_else(|| VecDeque::from([StackStatus::from(default)]))
    }
}

/// Stack service kept in process memory
///
/// Cloning shares state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStackService {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStackService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing stack with a status
    pub async fn seed_stack(&self, name: &str, status: &str) {
        self.seed_statuses(name, &[status]).await;
    }

    /// Register a stack whose describes walk through `statuses`
    pub async fn seed_statuses(&self, name: &str, statuses: &[&str]) {
        let mut inner = self.inner.lock().await;
        let stack = inner.stacks.entry(name.to_string()).or_default();
        stack.statuses = statuses.iter().map(|s| StackStatus::from(*s)).collect();
    }

    /// Statuses the stack walks through after its next create or update
    pub async fn settle_with(&self, name: &str, statuses: &[&str]) {
        self.inner.lock().await.settle.insert(
            name.to_string(),
            statuses.iter().map(|s| StackStatus::from(*s)).collect(),
        );
    }

    /// Reject every template validation with `message`
    pub async fn reject_templates(&self, message: &str) {
        self.inner.lock().await.validation_error = Some(message.to_string());
    }

    /// Make the next update of `name` fail with `error`
    pub async fn fail_next_update(&self, name: &str, error: StackServiceError) {
        let mut inner = self.inner.lock().await;
        inner
            .update_errors
            .entry(name.to_string())
            .or_default()
            .push_back(error);
    }

    /// Make the next create of `name` fail with `error`
    pub async fn fail_next_create(&self, name: &str, error: StackServiceError) {
        let mut inner = self.inner.lock().await;
        inner
            .create_errors
            .entry(name.to_string())
            .or_default()
            .push_back(error);
    }

    /// Every call so far, in order
    pub async fn calls(&self) -> Vec<StackCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn validate_count(&self) -> usize {
        self.count(|c| matches!(c, StackCall::Validate)).await
    }

    pub async fn update_count(&self, name: &str) -> usize {
        self.count(|c| matches!(c, StackCall::Update(n) if n == name))
            .await
    }

    pub async fn create_count(&self, name: &str) -> usize {
        self.count(|c| matches!(c, StackCall::Create(n) if n == name))
            .await
    }

    pub async fn describe_count(&self, name: &str) -> usize {
        self.count(|c| matches!(c, StackCall::Describe(n) if n == name))
            .await
    }

    async fn count(&self, predicate: impl Fn(&StackCall) -> bool) -> usize {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| predicate(c))
            .count()
    }

    /// Request the stack was last created or updated with
    pub async fn request(&self, name: &str) -> Option<StackRequest> {
        self.inner
            .lock()
            .await
            .stacks
            .get(name)
            .and_then(|s| s.request.clone())
    }

    pub async fn exists(&self, name: &str) -> bool {
        self.inner.lock().await.stacks.contains_key(name)
    }
}

#[async_trait]
impl StackService for MemoryStackService {
    async fn validate_template(&self, body: &str) -> Result<(), StackServiceError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(StackCall::Validate);

        if let Some(message) = &inner.validation_error {
            return Err(StackServiceError::Validation(message.clone()));
        }
        serde_json::from_str::<serde_json::Value>(body)
            .map_err(|e| StackServiceError::Validation(format!("Template format error: {}", e)))?;

        inner.last_validated = Some(body.to_string());
        Ok(())
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<(), StackServiceError> {
        let mut inner = self.inner.lock().await;
        let name = request.stack_name.clone();
        inner.calls.push(StackCall::Create(name.clone()));
        debug!(stack = %name, "fake create_stack");

        if let Some(error) = inner.create_errors.get_mut(&name).and_then(|q| q.pop_front()) {
            return Err(error);
        }
        if inner.stacks.contains_key(&name) {
            return Err(StackServiceError::AlreadyExists(name));
        }

        let body = inner.last_validated.clone();
        let statuses = inner.settled(&name, "CREATE_COMPLETE");
        inner.stacks.insert(
            name,
            FakeStack {
                request: Some(request.clone()),
                body,
                statuses,
            },
        );
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<(), StackServiceError> {
        let mut inner = self.inner.lock().await;
        let name = request.stack_name.clone();
        inner.calls.push(StackCall::Update(name.clone()));
        debug!(stack = %name, "fake update_stack");

        if let Some(error) = inner.update_errors.get_mut(&name).and_then(|q| q.pop_front()) {
            return Err(error);
        }

        let body = inner.last_validated.clone();
        let unchanged = match inner.stacks.get(&name) {
            None => return Err(StackServiceError::NotFound(name)),
            Some(stack) => stack.request.as_ref() == Some(request) && stack.body == body,
        };
        if unchanged {
            return Err(StackServiceError::NoChanges);
        }

        let statuses = inner.settled(&name, "UPDATE_COMPLETE");
        if let Some(stack) = inner.stacks.get_mut(&name) {
            stack.request = Some(request.clone());
            stack.body = body;
            stack.statuses = statuses;
        }
        Ok(())
    }

    async fn describe_stack_status(
        &self,
        stack_name: &str,
    ) -> Result<Option<StackStatus>, StackServiceError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(StackCall::Describe(stack_name.to_string()));

        Ok(inner.stacks.get_mut(stack_name).and_then(|stack| {
            if stack.statuses.len() > 1 {
                stack.statuses.pop_front()
            } else {
                stack.statuses.front().cloned()
            }
        }))
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), StackServiceError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(StackCall::Delete(stack_name.to_string()));
        inner.stacks.remove(stack_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> StackRequest {
        StackRequest::new(name, "https://s3.amazonaws.com/b/main.json")
    }

    #[tokio::test]
    async fn test_update_missing_then_create() {
        let service = MemoryStackService::new();
        service.validate_template("{}").await.unwrap();

        assert_eq!(
            service.update_stack(&request("s")).await,
            Err(StackServiceError::NotFound("s".to_string()))
        );
        service.create_stack(&request("s")).await.unwrap();
        assert_eq!(
            service.create_stack(&request("s")).await,
            Err(StackServiceError::AlreadyExists("s".to_string()))
        );
        assert_eq!(
            service.calls().await,
            vec![
                StackCall::Validate,
                StackCall::Update("s".to_string()),
                StackCall::Create("s".to_string()),
                StackCall::Create("s".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unchanged_update_reports_no_changes() {
        let service = MemoryStackService::new();
        service.validate_template(r#"{"a": 1}"#).await.unwrap();
        service.create_stack(&request("s")).await.unwrap();

        assert_eq!(
            service.update_stack(&request("s")).await,
            Err(StackServiceError::NoChanges)
        );

        service.validate_template(r#"{"a": 2}"#).await.unwrap();
        assert_eq!(service.update_stack(&request("s")).await, Ok(()));
    }

    #[tokio::test]
    async fn test_settle_with_scripts_post_change_statuses() {
        let service = MemoryStackService::new();
        service
            .settle_with("s", &["CREATE_IN_PROGRESS", "CREATE_FAILED"])
            .await;
        service.validate_template("{}").await.unwrap();
        service.create_stack(&request("s")).await.unwrap();

        let first = service.describe_stack_status("s").await.unwrap().unwrap();
        let second = service.describe_stack_status("s").await.unwrap().unwrap();
        assert_eq!(first.as_str(), "CREATE_IN_PROGRESS");
        assert_eq!(second.as_str(), "CREATE_FAILED");
    }

    #[tokio::test]
    async fn test_invalid_json_fails_validation() {
        let service = MemoryStackService::new();
        assert!(matches!(
            service.validate_template("not json").await,
            Err(StackServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_status_sequence_repeats_last() {
        let service = MemoryStackService::new();
        service
            .seed_statuses("s", &["CREATE_IN_PROGRESS", "CREATE_COMPLETE"])
            .await;

        let first = service.describe_stack_status("s").await.unwrap().unwrap();
        let second = service.describe_stack_status("s").await.unwrap().unwrap();
        let third = service.describe_stack_status("s").await.unwrap().unwrap();
        assert_eq!(first.as_str(), "CREATE_IN_PROGRESS");
        assert_eq!(second.as_str(), "CREATE_COMPLETE");
        assert_eq!(third.as_str(), "CREATE_COMPLETE");
        assert_eq!(service.describe_stack_status("x").await.unwrap(), None);
    }
}
