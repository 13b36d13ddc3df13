use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable state of the playback engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    /// Nothing is playing. Initial state, and where stop/cancel lands.
    #[default]
    Idle,
    /// `current_run` is 1-based. `total_runs` is `None` for an endless loop.
    Running {
        current_run: u32,
        total_runs: Option<u32>,
    },
    Paused,
    Completed,
    Error { reason: String },
}

impl ExecutionState {
    pub fn error(reason: impl Into<String>) -> Self {
        ExecutionState::Error {
            reason: reason.into(),
        }
    }

    /// States a run can end in.
    pub fn is_terminal(&self) -> bool {
        match self {
            ExecutionState::Idle | ExecutionState::Completed | ExecutionState::Error { .. } => true,
            ExecutionState::Running { .. } | ExecutionState::Paused => false,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::Idle => write!(f, "idle"),
            ExecutionState::Running {
                current_run,
                total_runs: Some(total),
            } => write!(f, "running {}/{}", current_run, total),
            ExecutionState::Running {
                current_run,
                total_runs: None,
            } => write!(f, "running {}/inf", current_run),
            ExecutionState::Paused => write!(f, "paused"),
            ExecutionState::Completed => write!(f, "completed"),
            ExecutionState::Error { reason } => write!(f, "error: {}", reason),
        }
    }
}
