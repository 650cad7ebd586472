//! Publish call state machine
//!
//! States: START → CREDENTIALS_READY → MATCHING → DRAINING → DONE
//!
//! A call that fails before matching moves straight to DONE.

use serde::{Deserialize, Serialize};

/// Publish call state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishState {
    /// Task accepted, nothing resolved yet
    Start,
    /// Credentials resolved, location map not built
    CredentialsReady,
    /// Artifact chains running
    Matching,
    /// All chains finished, report being assembled
    Draining,
    /// Terminal
    Done,
}

impl PublishState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishState::Done)
    }

    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: PublishState) -> bool {
        match (self, target) {
            (PublishState::Start, PublishState::CredentialsReady) => true,
            (PublishState::CredentialsReady, PublishState::Matching) => true,
            (PublishState::Matching, PublishState::Draining) => true,
            (PublishState::Draining, PublishState::Done) => true,

            // Fatal errors end the call early
            (PublishState::Start, PublishState::Done) => true,
            (PublishState::CredentialsReady, PublishState::Done) => true,

            _ => false,
        }
    }
}

/// Errors for state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishStateError {
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: PublishState, to: PublishState },

    #[error("Publish call is in terminal state {0:?}")]
    TerminalState(PublishState),
}

/// Tracks the state of one publish call
#[derive(Debug, Clone)]
pub struct PublishStateMachine {
    state: PublishState,
    history: Vec<PublishState>,
}

impl Default for PublishStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishStateMachine {
    pub fn new() -> Self {
        Self {
            state: PublishState::Start,
            history: vec![PublishState::Start],
        }
    }

    pub fn state(&self) -> PublishState {
        self.state
    }

    /// States visited so far, including the current one
    pub fn history(&self) -> &[PublishState] {
        &self.history
    }

    pub fn transition(&mut self, to: PublishState) -> Result<(), PublishStateError> {
        if self.state.is_terminal() {
            return Err(PublishStateError::TerminalState(self.state));
        }
        if !self.state.can_transition_to(to) {
            return Err(PublishStateError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// End the call from whatever state it is in. No-op once done.
    pub fn finish(&mut self) {
        if !self.state.is_terminal() {
            self.state = PublishState::Done;
            self.history.push(PublishState::Done);
        }
    }
}
