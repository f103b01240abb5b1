//! Run lifecycle states
//!
//! A run moves strictly forward through these states. The only optional
//! step is cleanup, and any state may fail.

use serde::{Deserialize, Serialize};

/// State of the top-level run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Init,
    Rendered,
    Submitted,
    Monitoring,
    Terminated,
    LogsFetched,
    CleanedUp,
    Done,
    Failed,
}

impl RunState {
    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;

        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Init, Rendered)
            | (Rendered, Submitted)
            | (Submitted, Monitoring)
            | (Monitoring, Terminated)
            | (Terminated, LogsFetched)
            | (LogsFetched, CleanedUp)
            | (LogsFetched, Done)
            | (CleanedUp, Done) => true,
            _ => false,
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Init => "Init",
            RunState::Rendered => "Rendered",
            RunState::Submitted => "Submitted",
            RunState::Monitoring => "Monitoring",
            RunState::Terminated => "Terminated",
            RunState::LogsFetched => "LogsFetched",
            RunState::CleanedUp => "CleanedUp",
            RunState::Done => "Done",
            RunState::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}
