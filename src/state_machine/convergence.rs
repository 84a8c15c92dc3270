// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Convergence State Machine
//!
//! ```text
//!              UpdateAccepted
//!            ┌───────────────┐
//!            ▼               │
//!   ──▶ Updating ────────────┘
//!         │  │ NoChanges ──▶ NoChange
//!         │  │
//!         │  └ StackMissing ──▶ Absent ── CreateAccepted ──▶ Creating
//!         │                       │
//!         │                       └ AlreadyExists / Rejected ──▶ Failed
//!         └ Rejected ──▶ Failed
//!
//!   Creating | Updating | NoChange ── StatusReady ──▶ Ready
//!   Creating | Updating | NoChange ── StatusFailed ──▶ Failed
//! ```
//!
//! Convergence always begins by attempting an update, so the initial state is
//! `Updating`. The remote service is the authority on existence; `Absent` is
//! only entered when an update reports the stack missing, and `IssueCreate`
//! is emitted exactly once on that edge.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};

/// Convergence state of one named stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceState {
    /// Stack does not exist remotely
    Absent,
    /// Create issued, not yet ready
    Creating,
    /// Update attempted or in progress
    Updating,
    /// Remote reported nothing to update
    NoChange,
    /// Terminal success status observed
    Ready,
    /// Terminal failure
    Failed,
}

impl fmt::Display for ConvergenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "Absent",
            Self::Creating => "Creating",
            Self::Updating => "Updating",
            Self::NoChange => "NoChange",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Observations fed into the machine by the convergence engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceInput {
    /// Update call accepted
    UpdateAccepted,
    /// Update call reported no updates to perform
    NoChanges,
    /// Update call reported the stack does not exist
    StackMissing,
    /// Create call accepted
    CreateAccepted,
    /// Create call found an existing stack
    AlreadyExists,
    /// Mutating call rejected for any other reason
    Rejected(String),
    /// Readiness poll observed a terminal success status
    StatusReady,
    /// Readiness poll observed a terminal failure status
    StatusFailed(String),
}

impl fmt::Display for ConvergenceInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpdateAccepted => f.write_str("UpdateAccepted"),
            Self::NoChanges => f.write_str("NoChanges"),
            Self::StackMissing => f.write_str("StackMissing"),
            Self::CreateAccepted => f.write_str("CreateAccepted"),
            Self::AlreadyExists => f.write_str("AlreadyExists"),
            Self::Rejected(reason) => write!(f, "Rejected({})", reason),
            Self::StatusReady => f.write_str("StatusReady"),
            Self::StatusFailed(status) => write!(f, "StatusFailed({})", status),
        }
    }
}

/// What the engine must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Issue the create call
    IssueCreate,
    /// Nothing further to call; the stack is converging or converged
    Settle,
    /// Stop with an error
    Fail,
}

/// Convergence machine, starting in [`ConvergenceState::Updating`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceMachine {
    state: ConvergenceState,
}

impl Default for ConvergenceMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvergenceMachine {
    pub fn new() -> Self {
        Self {
            state: ConvergenceState::Updating,
        }
    }

    pub fn state(&self) -> ConvergenceState {
        self.state
    }

    fn to(state: ConvergenceState, directive: Directive) -> TransitionResult<(Self, Directive)> {
        Ok((Self { state }, directive))
    }
}

impl StateMachine for ConvergenceMachine {
    type Input = ConvergenceInput;
    type Output = Directive;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use ConvergenceInput as In;
        use ConvergenceState::*;

        match (self.state, input) {
            (Ready | Failed, _) => Err(TransitionError::Terminal(self.state.to_string())),

            (Updating, In::UpdateAccepted) => Self::to(Updating, Directive::Settle),
            (Updating, In::NoChanges) => Self::to(NoChange, Directive::Settle),
            (Updating, In::StackMissing) => Self::to(Absent, Directive::IssueCreate),

            (Absent, In::CreateAccepted) => Self::to(Creating, Directive::Settle),
            (Absent, In::AlreadyExists) => Self::to(Failed, Directive::Fail),

            (Updating | Absent, In::Rejected(_)) => Self::to(Failed, Directive::Fail),

            (Creating | Updating | NoChange, In::StatusReady) => Self::to(Ready, Directive::Settle),
            (Creating | Updating | NoChange, In::StatusFailed(_)) => {
                Self::to(Failed, Directive::Fail)
            }

            (state, input) => Err(TransitionError::InvalidTransition {
                from: state.to_string(),
                input: input.to_string(),
            }),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state, ConvergenceState::Ready | ConvergenceState::Failed)
    }
}
