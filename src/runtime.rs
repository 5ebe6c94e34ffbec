//! Runtime for driving a conversation
//!
//! The executor polls the shared session files once per tick, feeds what it
//! sees through the pure state machine and performs the resulting effects.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationDriver;
pub use traits::*;

use crate::llm::{LoggingClient, OpenAiClient};
use crate::state_machine::TransitionError;
use crate::store::{FileWorkspace, StoreError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Type alias for the production driver with concrete implementations
pub type ProductionDriver = ConversationDriver<FileWorkspace, LoggingClient<OpenAiClient>>;

pub const DEFAULT_TICK: Duration = Duration::from_millis(300);
pub const MAX_COMPLETION_ATTEMPTS: u32 = 3;

/// Timing knobs for the driver loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Poll interval for shared state
    pub tick: Duration,
    /// Completion attempts per turn before the turn becomes a pass
    pub max_attempts: u32,
    /// First retry delay; doubles on each further attempt
    pub retry_base_delay: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            max_attempts: MAX_COMPLETION_ATTEMPTS,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl DriverOptions {
    /// Exponential backoff: base, 2x base, 4x base, ...
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_base_delay.saturating_mul(factor)
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOutcome {
    pub transcript: PathBuf,
    pub messages: usize,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Shared state error: {0}")]
    Store(#[from] StoreError),
    #[error("State machine error: {0}")]
    Transition(#[from] TransitionError),
}
