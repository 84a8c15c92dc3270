// Copyright (c) 2025 - Cowboy AI, Inc.
//! Readiness polling
//!
//! Polls a stack's status at a fixed interval until it reaches a terminal
//! state or the attempt budget runs out. The outcomes are distinct:
//!
//! - terminal success → `Ok(status)`
//! - terminal failure or missing stack → [`FormationError::StackNotReady`]
//! - budget exhausted → [`FormationError::ReadinessTimeout`]
//! - cancelled → [`FormationError::Cancelled`], checked before every poll and
//!   while sleeping

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{StackService, StackStatus, StatusPhase};
use crate::config::ReadinessPolicy;
use crate::errors::{FormationError, FormationResult};

/// Status reported for a stack that does not exist
pub const MISSING_STATUS: &str = "DOES_NOT_EXIST";

/// Wait for a stack to reach a terminal success status
pub async fn wait_until_ready(
    service: &dyn StackService,
    stack_name: &str,
    policy: ReadinessPolicy,
    cancel: &CancellationToken,
) -> FormationResult<StackStatus> {
    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(FormationError::Cancelled(format!(
                "readiness wait for {}",
                stack_name
            )));
        }

        let status = service
            .describe_stack_status(stack_name)
            .await?
            .ok_or_else(|| FormationError::StackNotReady {
                stack: stack_name.to_string(),
                status: MISSING_STATUS.to_string(),
            })?;

        match status.phase() {
            StatusPhase::Ready => {
                info!(stack = stack_name, status = %status, attempt, "Stack ready");
                return Ok(status);
            }
            StatusPhase::Failed => {
                warn!(stack = stack_name, status = %status, "Stack reached a failed state");
                return Err(FormationError::StackNotReady {
                    stack: stack_name.to_string(),
                    status: status.to_string(),
                });
            }
            StatusPhase::Pending => {
                debug!(stack = stack_name, status = %status, attempt, "Stack not ready yet");
            }
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(FormationError::Cancelled(format!(
                        "readiness wait for {}",
                        stack_name
                    )));
                }
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    Err(FormationError::ReadinessTimeout {
        stack: stack_name.to_string(),
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::MemoryStackService;
    use std::time::Duration;

    fn quick(max_attempts: u32) -> ReadinessPolicy {
        ReadinessPolicy::new(Duration::from_millis(1), max_attempts)
    }

    #[tokio::test]
    async fn test_ready_after_progress() {
        let service = MemoryStackService::new();
        service
            .seed_statuses("net", &["CREATE_IN_PROGRESS", "CREATE_IN_PROGRESS", "CREATE_COMPLETE"])
            .await;

        let status = wait_until_ready(&service, "net", quick(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status.as_str(), "CREATE_COMPLETE");
        assert_eq!(service.describe_count("net").await, 3);
    }

    #[tokio::test]
    async fn test_failed_status_is_not_a_timeout() {
        let service = MemoryStackService::new();
        service
            .seed_statuses("net", &["CREATE_IN_PROGRESS", "ROLLBACK_COMPLETE"])
            .await;

        let err = wait_until_ready(&service, "net", quick(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FormationError::StackNotReady { ref status, .. } if status == "ROLLBACK_COMPLETE"
        ));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_times_out() {
        let service = MemoryStackService::new();
        service.seed_statuses("net", &["UPDATE_IN_PROGRESS"]).await;

        let err = wait_until_ready(&service, "net", quick(4), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FormationError::ReadinessTimeout { attempts: 4, .. }
        ));
        assert_eq!(service.describe_count("net").await, 4);
    }

    #[tokio::test]
    async fn test_missing_stack_is_not_ready() {
        let service = MemoryStackService::new();
        let err = wait_until_ready(&service, "ghost", quick(3), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FormationError::StackNotReady { ref status, .. } if status == MISSING_STATUS
        ));
    }

    #[tokio::test]
    async fn test_cancellation_stops_polling() {
        let service = MemoryStackService::new();
        service.seed_statuses("net", &["CREATE_IN_PROGRESS"]).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = wait_until_ready(&service, "net", quick(100), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FormationError::Cancelled(_)));
        assert_eq!(service.describe_count("net").await, 0);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_sleep() {
        let service = MemoryStackService::new();
        service.seed_statuses("net", &["CREATE_IN_PROGRESS"]).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let policy = ReadinessPolicy::new(Duration::from_secs(3600), 10);

        let (result, _) = tokio::join!(
            wait_until_ready(&service, "net", policy, &cancel),
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                trigger.cancel();
            }
        );
        assert!(matches!(result, Err(FormationError::Cancelled(_))));
        assert_eq!(service.describe_count("net").await, 1);
    }
}
