// Copyright (c) 2025 - Cowboy AI, Inc.
//! Convergence engine
//!
//! Drives [`ConvergenceMachine`] with the results of remote calls. The
//! machine decides what happens next; the engine only performs the call a
//! directive asks for, so each mutating call is issued at most once.

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::readiness::wait_until_ready;
use super::{StackRequest, StackService, StackServiceError};
use crate::config::ReadinessPolicy;
use crate::errors::{FormationError, FormationResult};
use crate::state_machine::{
    ConvergenceInput, ConvergenceMachine, ConvergenceState, Directive, RecordedMachine,
};

/// One recorded convergence step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceStep {
    pub from: ConvergenceState,
    pub to: ConvergenceState,
    pub input: ConvergenceInput,
    pub at: chrono::DateTime<Utc>,
}

/// Outcome of converging one stack
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceReport {
    pub stack_name: String,
    pub state: ConvergenceState,
    pub history: Vec<ConvergenceStep>,
}

impl ConvergenceReport {
    fn from_machine(stack_name: &str, fsm: RecordedMachine<ConvergenceMachine>) -> Self {
        let (machine, history) = fsm.into_parts();
        Self {
            stack_name: stack_name.to_string(),
            state: machine.state(),
            history: history
                .into_iter()
                .map(|t| ConvergenceStep {
                    from: t.from.state(),
                    to: t.to.state(),
                    input: t.input,
                    at: t.at,
                })
                .collect(),
        }
    }

    /// Whether the remote reported nothing to change
    pub fn is_no_change(&self) -> bool {
        self.history
            .iter()
            .any(|step| step.to == ConvergenceState::NoChange)
    }
}

/// Template body the stack service has accepted
///
/// Obtained from [`ConvergenceEngine::validate`]; converging requires one, so
/// no mutating call can happen for an unvalidated body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedTemplate<'t> {
    body: &'t str,
}

impl<'t> ValidatedTemplate<'t> {
    pub fn body(&self) -> &'t str {
        self.body
    }
}

/// Converges one named stack against a stack service
pub struct ConvergenceEngine<'a> {
    service: &'a dyn StackService,
}

impl<'a> ConvergenceEngine<'a> {
    pub fn new(service: &'a dyn StackService) -> Self {
        Self { service }
    }

    /// Submit a body to the remote validation endpoint
    pub async fn validate<'t>(&self, template_body: &'t str) -> FormationResult<ValidatedTemplate<'t>> {
        self.service.validate_template(template_body).await?;
        debug!(bytes = template_body.len(), "Template validated");
        Ok(ValidatedTemplate {
            body: template_body,
        })
    }

    /// Validate, then update, falling back to create when the stack is missing
    ///
    /// Returns with the stack in `Updating`, `Creating` or `NoChange`.
    /// Readiness is a separate step; see [`ConvergenceEngine::converge_and_wait`].
    pub async fn converge(
        &self,
        template_body: &str,
        request: &StackRequest,
    ) -> FormationResult<ConvergenceReport> {
        let template = self.validate(template_body).await?;
        self.converge_validated(template, request).await
    }

    /// Update-then-create for an already validated body
    pub async fn converge_validated(
        &self,
        template: ValidatedTemplate<'_>,
        request: &StackRequest,
    ) -> FormationResult<ConvergenceReport> {
        let fsm = self.run(template, request).await?;
        Ok(ConvergenceReport::from_machine(&request.stack_name, fsm))
    }

    /// Converge, then wait for the stack to become ready
    pub async fn converge_and_wait(
        &self,
        template_body: &str,
        request: &StackRequest,
        policy: ReadinessPolicy,
        cancel: &CancellationToken,
    ) -> FormationResult<ConvergenceReport> {
        let template = self.validate(template_body).await?;
        self.converge_validated_and_wait(template, request, policy, cancel)
            .await
    }

    /// Converge an already validated body, then wait for readiness
    ///
    /// A stack that settles in `UPDATE_ROLLBACK_COMPLETE` is usable by
    /// dependents, but when this convergence issued the update it failed.
    pub async fn converge_validated_and_wait(
        &self,
        template: ValidatedTemplate<'_>,
        request: &StackRequest,
        policy: ReadinessPolicy,
        cancel: &CancellationToken,
    ) -> FormationResult<ConvergenceReport> {
        let mut fsm = self.run(template, request).await?;
        let stack = request.stack_name.as_str();

        let updated = fsm.state().state() == ConvergenceState::Updating;

        let settled = match wait_until_ready(self.service, stack, policy, cancel).await {
            Ok(status) if updated && status.is_update_rollback() => Err(status.to_string()),
            Ok(_) => Ok(()),
            Err(FormationError::StackNotReady { status, .. }) => Err(status),
            Err(other) => return Err(other),
        };

        match settled {
            Ok(()) => {
                fsm.apply(ConvergenceInput::StatusReady, Utc::now())?;
                Ok(ConvergenceReport::from_machine(stack, fsm))
            }
            Err(status) => {
                fsm.apply(ConvergenceInput::StatusFailed(status.clone()), Utc::now())?;
                warn!(stack, status = %status, "Stack did not converge");
                Err(FormationError::StackNotReady {
                    stack: stack.to_string(),
                    status,
                })
            }
        }
    }

    async fn run(
        &self,
        template: ValidatedTemplate<'_>,
        request: &StackRequest,
    ) -> FormationResult<RecordedMachine<ConvergenceMachine>> {
        let stack = request.stack_name.as_str();
        let mut fsm = RecordedMachine::new(ConvergenceMachine::new());

        info!(stack, bytes = template.body().len(), "Updating stack");
        let (input, error) = match self.service.update_stack(request).await {
            Ok(()) => (ConvergenceInput::UpdateAccepted, None),
            Err(StackServiceError::NoChanges) => (ConvergenceInput::NoChanges, None),
            Err(StackServiceError::NotFound(_)) => (ConvergenceInput::StackMissing, None),
            Err(err) => (ConvergenceInput::Rejected(err.to_string()), Some(err)),
        };

        let mut directive = fsm.apply(input, Utc::now())?;

        if directive == Directive::IssueCreate {
            info!(stack, "Stack does not exist, creating");
            let (input, create_error) = match self.service.create_stack(request).await {
                Ok(()) => (ConvergenceInput::CreateAccepted, None),
                Err(StackServiceError::AlreadyExists(name)) => (
                    ConvergenceInput::AlreadyExists,
                    Some(StackServiceError::AlreadyExists(name)),
                ),
                Err(err) => (ConvergenceInput::Rejected(err.to_string()), Some(err)),
            };
            directive = fsm.apply(input, Utc::now())?;

            if directive == Directive::Fail {
                return Err(Self::failure(stack, create_error));
            }
        } else if directive == Directive::Fail {
            return Err(Self::failure(stack, error));
        }

        let state = fsm.state().state();
        match state {
            ConvergenceState::NoChange => info!(stack, "No updates to perform"),
            _ => info!(stack, state = %state, "Convergence issued"),
        }
        Ok(fsm)
    }

    fn failure(stack: &str, error: Option<StackServiceError>) -> FormationError {
        warn!(stack, error = ?error, "Convergence failed");
        match error {
            Some(err) => err.into(),
            None => FormationError::StackService(format!("convergence of {} failed", stack)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{MemoryStackService, StackCall};
    use std::time::Duration;

    fn request() -> StackRequest {
        StackRequest::new("acme-web-staging", "https://s3.amazonaws.com/b/main.json")
            .with_capabilities(vec!["CAPABILITY_IAM".to_string()])
    }

    #[tokio::test]
    async fn test_missing_stack_updates_once_then_creates_once() {
        let service = MemoryStackService::new();
        let report = ConvergenceEngine::new(&service)
            .converge("{}", &request())
            .await
            .unwrap();

        assert_eq!(report.state, ConvergenceState::Creating);
        assert_eq!(
            service.calls().await,
            vec![
                StackCall::Validate,
                StackCall::Update("acme-web-staging".to_string()),
                StackCall::Create("acme-web-staging".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_stack_never_creates() {
        let service = MemoryStackService::new();
        service.seed_stack("acme-web-staging", "CREATE_COMPLETE").await;

        let report = ConvergenceEngine::new(&service)
            .converge("{}", &request())
            .await
            .unwrap();

        assert_eq!(report.state, ConvergenceState::Updating);
        assert_eq!(service.update_count("acme-web-staging").await, 1);
        assert_eq!(service.create_count("acme-web-staging").await, 0);
    }

    #[tokio::test]
    async fn test_no_changes_is_success() {
        let service = MemoryStackService::new();
        service
            .fail_next_update("acme-web-staging", StackServiceError::NoChanges)
            .await;

        let report = ConvergenceEngine::new(&service)
            .converge("{}", &request())
            .await
            .unwrap();

        assert_eq!(report.state, ConvergenceState::NoChange);
        assert!(report.is_no_change());
        assert_eq!(service.create_count("acme-web-staging").await, 0);
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_mutating_call() {
        let service = MemoryStackService::new();
        service.reject_templates("Unresolved resource dependencies").await;

        let err = ConvergenceEngine::new(&service)
            .converge("{}", &request())
            .await
            .unwrap_err();

        assert!(matches!(err, FormationError::TemplateValidation(_)));
        assert_eq!(service.calls().await, vec![StackCall::Validate]);
    }

    #[tokio::test]
    async fn test_create_race_surfaces_conflict() {
        let service = MemoryStackService::new();
        service
            .fail_next_create(
                "acme-web-staging",
                StackServiceError::AlreadyExists("acme-web-staging".to_string()),
            )
            .await;

        let err = ConvergenceEngine::new(&service)
            .converge("{}", &request())
            .await
            .unwrap_err();
        assert!(matches!(err, FormationError::StackConflict(_)));
    }

    #[tokio::test]
    async fn test_rejected_update_fails() {
        let service = MemoryStackService::new();
        service
            .fail_next_update(
                "acme-web-staging",
                StackServiceError::Remote("throttled".to_string()),
            )
            .await;

        let err = ConvergenceEngine::new(&service)
            .converge("{}", &request())
            .await
            .unwrap_err();
        assert!(matches!(err, FormationError::StackService(ref m) if m == "throttled"));
        assert_eq!(service.create_count("acme-web-staging").await, 0);
    }

    #[tokio::test]
    async fn test_converge_and_wait_reaches_ready() {
        let service = MemoryStackService::new();
        let report = ConvergenceEngine::new(&service)
            .converge_and_wait(
                "{}",
                &request(),
                ReadinessPolicy::new(Duration::from_millis(1), 3),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.state, ConvergenceState::Ready);
        let path: Vec<_> = report.history.iter().map(|s| s.to).collect();
        assert_eq!(
            path,
            vec![
                ConvergenceState::Absent,
                ConvergenceState::Creating,
                ConvergenceState::Ready
            ]
        );
    }

    #[tokio::test]
    async fn test_validated_template_is_not_resubmitted() {
        let service = MemoryStackService::new();
        let engine = ConvergenceEngine::new(&service);

        let template = engine.validate("{}").await.unwrap();
        assert_eq!(template.body(), "{}");
        engine.converge_validated(template, &request()).await.unwrap();

        assert_eq!(service.validate_count().await, 1);
    }

    #[tokio::test]
    async fn test_unchanged_stack_in_update_rollback_is_ready() {
        let service = MemoryStackService::new();
        service
            .seed_stack("acme-web-staging", "UPDATE_ROLLBACK_COMPLETE")
            .await;
        service
            .fail_next_update("acme-web-staging", StackServiceError::NoChanges)
            .await;

        let report = ConvergenceEngine::new(&service)
            .converge_and_wait(
                "{}",
                &request(),
                ReadinessPolicy::new(Duration::from_millis(1), 3),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.state, ConvergenceState::Ready);
        assert!(report.is_no_change());
    }
}
