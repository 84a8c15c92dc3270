// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Convergence
//!
//! ```text
//! Template body ──▶ validate ──▶ update ──┬─ accepted ──▶ Updating
//!                                         ├─ no changes ─▶ NoChange
//!                                         └─ missing ───▶ create ──▶ Creating
//!
//! dependents: wait_until_ready(stack) ──▶ poll status ──▶ Ready | StackNotReady | Timeout
//! ```
//!
//! The remote stack service is reached through [`StackService`] so the
//! convergence flow can run against [`MemoryStackService`] in tests and
//! against CloudFormation (feature `aws`) in production.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "aws")]
pub mod cloudformation;
pub mod engine;
pub mod memory;
pub mod parameters;
pub mod readiness;

#[cfg(feature = "aws")]
pub use cloudformation::CloudFormationService;
pub use engine::{ConvergenceEngine, ConvergenceReport, ValidatedTemplate};
pub use memory::{MemoryStackService, StackCall};
pub use parameters::{declared_parameters, plan_bindings, Binding, WellKnownValues};
pub use readiness::wait_until_ready;

/// Errors reported by a stack service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackServiceError {
    /// Template or request rejected as invalid
    #[error("Validation error: {0}")]
    Validation(String),

    /// Create found an existing stack
    #[error("Stack {0} already exists")]
    AlreadyExists(String),

    /// Update or describe found no stack
    #[error("Stack {0} does not exist")]
    NotFound(String),

    /// Update had nothing to change
    #[error("No updates are to be performed")]
    NoChanges,

    /// Transport or service failure
    #[error("{0}")]
    Remote(String),
}

/// Behaviour when a create fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnFailure {
    /// Leave the failed stack in place for inspection
    #[default]
    DoNothing,
    Rollback,
    Delete,
}

/// Create or update request for one stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_url: String,
    pub parameters: BTreeMap<String, String>,
    pub capabilities: Vec<String>,
    /// Applies to create only
    pub on_failure: OnFailure,
}

impl StackRequest {
    pub fn new(stack_name: impl Into<String>, template_url: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            template_url: template_url.into(),
            parameters: BTreeMap::new(),
            capabilities: Vec::new(),
            on_failure: OnFailure::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Classification of a remote status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPhase {
    /// Terminal success; outputs may be read
    Ready,
    /// Terminal failure or rolled back
    Failed,
    /// Still moving
    Pending,
}

/// Remote stack status as reported by the provider, e.g. `CREATE_COMPLETE`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackStatus(String);

impl StackStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Phase as seen by a reader of the stack's outputs
    ///
    /// `UPDATE_ROLLBACK_COMPLETE` is ready: the previous template is back in
    /// place and the stack accepts further updates.
    pub fn phase(&self) -> StatusPhase {
        let status = self.0.as_str();
        if status.ends_with("_IN_PROGRESS") {
            StatusPhase::Pending
        } else if status.ends_with("_FAILED")
            || matches!(status, "ROLLBACK_COMPLETE" | "DELETE_COMPLETE")
        {
            StatusPhase::Failed
        } else if status.ends_with("_COMPLETE") {
            StatusPhase::Ready
        } else {
            StatusPhase::Pending
        }
    }

    /// Whether the last update was rolled back
    pub fn is_update_rollback(&self) -> bool {
        self.0 == "UPDATE_ROLLBACK_COMPLETE"
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StackStatus {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Remote stack-management service
///
/// Each method is a single remote call. Implementations must not retry
/// mutating calls on their own.
#[async_trait]
pub trait StackService: Send + Sync {
    /// Submit a template body for validation
    async fn validate_template(&self, body: &str) -> Result<(), StackServiceError>;

    /// Create a stack; `AlreadyExists` when the name is taken
    async fn create_stack(&self, request: &StackRequest) -> Result<(), StackServiceError>;

    /// Update a stack; `NotFound` when missing, `NoChanges` when identical
    async fn update_stack(&self, request: &StackRequest) -> Result<(), StackServiceError>;

    /// Current status; `None` when the stack does not exist
    async fn describe_stack_status(
        &self,
        stack_name: &str,
    ) -> Result<Option<StackStatus>, StackServiceError>;

    /// Delete a stack
    async fn delete_stack(&self, stack_name: &str) -> Result<(), StackServiceError>;
}
