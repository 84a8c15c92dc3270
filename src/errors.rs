// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for formation operations

use thiserror::Error;

use crate::domain::ModelError;
use crate::stack::StackServiceError;
use crate::state_machine::TransitionError;
use crate::storage::StoreError;

/// Errors that can occur while synthesizing, publishing or converging a stack
///
/// Every variant aborts the remaining steps of the running `deploy`,
/// `destroy` or `provision` operation. The update-to-create fallback is the
/// only automatic branch and never surfaces here.
#[derive(Debug, Error)]
pub enum FormationError {
    /// Structurally invalid resource model, raised before any remote call
    #[error("Invalid resource model: {0}")]
    Model(#[from] ModelError),

    /// The stack service rejected the synthesized template
    #[error("Template validation failed: {0}")]
    TemplateValidation(String),

    /// Create was attempted against a stack that already exists
    #[error("Stack already exists: {0}")]
    StackConflict(String),

    /// A declared dependency could not be resolved
    #[error("Dependency '{dependency}' unresolved: {reason}")]
    DependencyUnresolved { dependency: String, reason: String },

    /// A declared template parameter has no value from any source
    #[error("Template parameter '{0}' has no resolvable value")]
    UnresolvedParameter(String),

    /// Stack reached a terminal failure state while waiting for readiness
    #[error("Stack {stack} not ready: {status}")]
    StackNotReady { stack: String, status: String },

    /// Readiness polling exhausted its attempt budget
    #[error("Timed out waiting for stack {stack} after {attempts} attempts")]
    ReadinessTimeout { stack: String, attempts: u32 },

    /// Caller aborted a suspended operation
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Object store rejected an artifact put
    #[error("Failed to upload artifact {key}: {reason}")]
    ArtifactUpload { key: String, reason: String },

    /// Object store failure outside of uploads
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stack service failure with no more specific category
    #[error("Stack service error: {0}")]
    StackService(String),

    /// External provisioning process exited non-zero
    #[error("Provisioning step '{step}' failed: {detail}")]
    Provisioning { step: String, detail: String },

    /// Convergence state machine reached an impossible transition
    #[error("Convergence transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Target is protected and the caller did not confirm
    #[error("Target {0} is protected; confirm to continue")]
    ProtectedTarget(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Local I/O error (bundles, keys, command spawning)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for formation operations
pub type FormationResult<T> = Result<T, FormationError>;

impl FormationError {
    /// Whether this error came from a missing dependency or parameter value
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            FormationError::DependencyUnresolved { .. } | FormationError::UnresolvedParameter(_)
        )
    }
}

impl From<serde_json::Error> for FormationError {
    fn from(err: serde_json::Error) -> Self {
        FormationError::Serialization(err.to_string())
    }
}

impl From<StoreError> for FormationError {
    fn from(err: StoreError) -> Self {
        FormationError::Storage(err.to_string())
    }
}

impl From<StackServiceError> for FormationError {
    fn from(err: StackServiceError) -> Self {
        match err {
            StackServiceError::Validation(msg) => FormationError::TemplateValidation(msg),
            StackServiceError::AlreadyExists(name) => FormationError::StackConflict(name),
            other => FormationError::StackService(other.to_string()),
        }
    }
}
