//! Driver state types

use crate::store::Settings;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the driver is in the session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    /// Transcript is empty; nothing to respond to yet
    #[default]
    WaitingFirstMessage,

    /// Scheduling turns and requesting completions
    Active,

    /// Paused by the panel or no agents configured
    Paused,

    /// Every agent passed; waiting for a human message or a reset
    AllPassedWait,

    /// Shutting down (terminal)
    Stopping,
}

impl DriverState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DriverState::Stopping)
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverState::WaitingFirstMessage => "waiting_first_message",
            DriverState::Active => "active",
            DriverState::Paused => "paused",
            DriverState::AllPassedWait => "all_passed_wait",
            DriverState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// In-memory scheduling cache, re-derived from the transcript when it changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnCursor {
    /// Roster index of the next speaker
    pub turn: usize,
    /// Transcript message count seen at the last scheduling decision
    pub last_observed: usize,
}

impl TurnCursor {
    pub fn reset() -> Self {
        Self::default()
    }
}

/// Everything the driver reads from shared files in one poll
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Observation {
    pub stop_requested: bool,
    pub settings: Settings,
    pub message_count: usize,
    pub last_author: Option<String>,
}
