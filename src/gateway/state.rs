//! Per-call state machine
//!
//! ```text
//! AwaitingAuth -> Resolving -> Translating -> Dispatching -> Normalizing -> Completed
//!        \____________\_____________\______________\______________\-----> Failed(kind)
//! ```
//!
//! Transitions only move forward. `Completed` and `Failed` are terminal.

use std::fmt;

use tracing::{debug, warn};

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    AwaitingAuth,
    Resolving,
    Translating,
    Dispatching,
    Normalizing,
    Completed,
    Failed(ErrorKind),
}

impl CallState {
    fn rank(&self) -> u8 {
        match self {
            CallState::AwaitingAuth => 0,
            CallState::Resolving => 1,
            CallState::Translating => 2,
            CallState::Dispatching => 3,
            CallState::Normalizing => 4,
            CallState::Completed | CallState::Failed(_) => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Completed | CallState::Failed(_))
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::AwaitingAuth => f.write_str("awaiting_auth"),
            CallState::Resolving => f.write_str("resolving"),
            CallState::Translating => f.write_str("translating"),
            CallState::Dispatching => f.write_str("dispatching"),
            CallState::Normalizing => f.write_str("normalizing"),
            CallState::Completed => f.write_str("completed"),
            CallState::Failed(kind) => write!(f, "failed({})", kind),
        }
    }
}

/// Tracks one call's state and logs every transition with the call id
#[derive(Debug)]
pub struct CallTracker {
    call_id: String,
    state: CallState,
}

impl CallTracker {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            state: CallState::AwaitingAuth,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Move to `next`. Backward moves and moves out of a terminal state are ignored.
    pub fn advance(&mut self, next: CallState) -> bool {
        if self.state.is_terminal() || next.rank() <= self.state.rank() {
            warn!(
                call_id = %self.call_id,
                from = %self.state,
                to = %next,
                "Ignoring out-of-order call state transition"
            );
            return false;
        }
        debug!(call_id = %self.call_id, from = %self.state, to = %next, "Call state transition");
        self.state = next;
        true
    }

    pub fn fail(&mut self, kind: ErrorKind) -> bool {
        self.advance(CallState::Failed(kind))
    }
}
