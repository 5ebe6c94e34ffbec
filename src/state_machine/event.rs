//! Events that drive the conversation loop

use super::state::Observation;
use crate::llm::Completion;
use crate::prompt::PASS_SENTINEL;

/// Why an agent's turn produced no message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// Agent answered with the pass sentinel
    Sentinel,
    /// Completion came back blank
    Empty,
    /// Model refused to answer
    Refused,
    /// Completion call failed after retries
    Failed,
}

/// Classified outcome of one completion call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Contribution(String),
    Pass(PassReason),
}

impl Reply {
    pub fn classify(completion: &Completion) -> Self {
        match completion {
            Completion::Refusal(_) => Reply::Pass(PassReason::Refused),
            Completion::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Reply::Pass(PassReason::Empty)
                } else if trimmed == PASS_SENTINEL {
                    Reply::Pass(PassReason::Sentinel)
                } else {
                    Reply::Contribution(trimmed.to_string())
                }
            }
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Reply::Pass(_))
    }
}

/// Events that trigger driver transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// Fresh view of the shared files, taken once per tick
    Poll(Observation),

    /// A completion call returned; `observation` is re-read after the call
    CompletionFinished {
        agent: String,
        reply: Reply,
        observation: Observation,
    },

    /// A pass was written to the agent state
    PassRecorded { agent: String, all_passed: bool },

    /// A contribution was appended at `message_index`
    MessageAppended { message_index: u64 },
}
