//! Signal handling for graceful shutdown (SIGINT/SIGTERM)
//!
//! On the first signal the publish call's `CancellationToken` is set: chains
//! that have not started a stage yet finish as `Cancelled`, and the report is
//! still written. On a second signal the CLI exits immediately with code 80.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::summary::ExitCode;

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: stop starting new stages
    InitiateCancellation,
    /// Second signal: exit now
    ImmediateExit,
    /// Third+ signal: ignore
    Ignore,
}

/// Signal bookkeeping shared with the handler thread
#[derive(Debug, Default)]
pub struct SignalState {
    token: CancellationToken,
    signal_count: AtomicU8,
}

impl SignalState {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            signal_count: AtomicU8::new(0),
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Record a signal and decide what to do about it
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);
        match count {
            0 => {
                self.token.cancel();
                SignalAction::InitiateCancellation
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Installs the process-wide ctrlc handler
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            state: Arc::new(SignalState::new(token)),
        }
    }

    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install handlers for SIGINT and SIGTERM. Call once at startup.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::InitiateCancellation => {
                eprintln!("\nReceived interrupt signal, finishing in-flight stages...");
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nReceived second interrupt, exiting immediately...");
                std::process::exit(ExitCode::Cancelled.as_i32());
            }
            SignalAction::Ignore => {}
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_signal_cancels_token() {
        let token = CancellationToken::new();
        let state = SignalState::new(token.clone());

        assert_eq!(state.handle_signal(), SignalAction::InitiateCancellation);
        assert!(token.is_cancelled());
        assert!(state.is_cancel_requested());
    }

    #[test]
    fn test_second_and_third_signal() {
        let state = SignalState::new(CancellationToken::new());

        state.handle_signal();
        assert_eq!(state.handle_signal(), SignalAction::ImmediateExit);
        assert_eq!(state.handle_signal(), SignalAction::Ignore);
        assert_eq!(state.signal_count(), 3);
    }

    #[test]
    fn test_handler_shares_state() {
        let token = CancellationToken::new();
        let handler = SignalHandler::new(token.clone());

        handler.state().handle_signal();
        assert!(token.is_cancelled());
    }
}
