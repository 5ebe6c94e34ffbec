//! Effects produced by driver transitions

use crate::store::{AgentActivity, AgentConfig, Settings};

/// Side effects the executor performs after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Wait one poll tick
    Sleep,

    /// Advisory agent-state update
    MarkAgent {
        agent: String,
        activity: AgentActivity,
    },

    /// Ask the completion client for this agent's next message
    RequestCompletion {
        agent: AgentConfig,
        settings: Settings,
    },

    /// Record a pass and check whether the whole roster has passed
    RecordPass { agent: String, roster: Vec<String> },

    /// Append a contribution to the transcript
    AppendMessage { author: String, content: String },

    /// Inter-turn delay, cut short by new messages, pause, reset or stop
    Cooldown { baseline_count: usize },

    ClearAgentState,

    /// Forget the pass window after a human broke a deadlock
    ClearPassHistory,

    ClearStopSignal,

    /// Report the final transcript location
    Finish,
}

impl Effect {
    pub fn mark(agent: impl Into<String>, activity: AgentActivity) -> Self {
        Effect::MarkAgent {
            agent: agent.into(),
            activity,
        }
    }

    /// Effects of a clean shutdown, in order
    pub fn shutdown() -> [Effect; 3] {
        [Effect::ClearStopSignal, Effect::ClearAgentState, Effect::Finish]
    }
}
