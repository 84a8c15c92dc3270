// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Transitions are pure functions. Remote calls are driven by the output a
//! transition returns and never performed inside it.
//!
//! # Mealy Machine
//!
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! The output tells the caller what to do next, so the control flow of a
//! convergence lives in one `match` that can be tested without a remote
//! service.

use chrono::{DateTime, Utc};

pub mod convergence;

pub use convergence::{ConvergenceInput, ConvergenceMachine, ConvergenceState, Directive};

pub type TransitionResult<S> = Result<S, TransitionError>;

/// Rejected transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    #[error("State {0} is terminal")]
    Terminal(String),
}

/// Pure finite state machine
pub trait StateMachine: Sized + Clone {
    type Input;

    /// What the caller must do after the transition
    type Output;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    /// Whether no input is accepted any more
    fn is_terminal(&self) -> bool;
}

/// One accepted transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub at: DateTime<Utc>,
}

/// A machine plus the transitions it has accepted, oldest first
///
/// Rejected inputs leave both state and record untouched.
#[derive(Debug, Clone)]
pub struct RecordedMachine<M: StateMachine> {
    state: M,
    record: Vec<TransitionRecord<M, M::Input>>,
}

impl<M: StateMachine> RecordedMachine<M> {
    pub fn new(initial: M) -> Self {
        Self {
            state: initial,
            record: Vec::new(),
        }
    }

    /// Feed one input, keeping it in the record when accepted
    pub fn apply(&mut self, input: M::Input, at: DateTime<Utc>) -> TransitionResult<M::Output> {
        let (next, output) = self.state.transition(&input)?;
        let from = std::mem::replace(&mut self.state, next.clone());
        self.record.push(TransitionRecord {
            from,
            to: next,
            input,
            at,
        });
        Ok(output)
    }

    pub fn state(&self) -> &M {
        &self.state
    }

    pub fn record(&self) -> &[TransitionRecord<M, M::Input>] {
        &self.record
    }

    pub fn into_parts(self) -> (M, Vec<TransitionRecord<M, M::Input>>) {
        (self.state, self.record)
    }
}
