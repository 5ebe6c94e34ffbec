//! Pure state transition function
//!
//! Given the same state, cursor and event this always yields the same result
//! and performs no I/O. Shared files are read by the executor and arrive here
//! as an `Observation`.

use super::event::Reply;
use super::{DriverState, Effect, Event, Observation, TurnCursor};
use crate::scheduler;
use crate::store::{AgentActivity, USER_AUTHOR};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: DriverState,
    pub cursor: TurnCursor,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: DriverState, cursor: TurnCursor) -> Self {
        Self {
            new_state: state,
            cursor,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    fn with_effects_front(mut self, effect: Effect) -> Self {
        self.effects.insert(0, effect);
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Driver is stopping")]
    Stopped,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

pub fn transition(
    state: DriverState,
    cursor: TurnCursor,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    if state.is_terminal() {
        return Err(TransitionError::Stopped);
    }

    match (state, event) {
        // ============================================================
        // Stop requests win over everything else
        // ============================================================
        (_, Event::Poll(obs)) if obs.stop_requested => Ok(stopping(cursor)),

        (
            DriverState::Active,
            Event::CompletionFinished {
                agent, observation, ..
            },
        ) if observation.stop_requested => Ok(stopping(cursor)
            .with_effects_front(Effect::mark(agent, AgentActivity::Idle))),

        // ============================================================
        // Polling
        // ============================================================
        (DriverState::WaitingFirstMessage, Event::Poll(obs)) => {
            if obs.message_count == 0 {
                Ok(TransitionResult::new(DriverState::WaitingFirstMessage, cursor)
                    .with_effect(Effect::Sleep))
            } else {
                Ok(step_active(cursor, &obs))
            }
        }

        (DriverState::Active | DriverState::Paused, Event::Poll(obs)) => {
            Ok(step_active(cursor, &obs))
        }

        (DriverState::AllPassedWait, Event::Poll(obs)) => Ok(step_all_passed(cursor, &obs)),

        // ============================================================
        // Completion outcome
        // ============================================================
        (
            DriverState::Active,
            Event::CompletionFinished {
                agent,
                reply,
                observation,
            },
        ) => Ok(finish_turn(cursor, agent, reply, &observation)),

        (DriverState::Active, Event::PassRecorded { all_passed, .. }) => {
            if all_passed {
                Ok(TransitionResult::new(DriverState::AllPassedWait, cursor)
                    .with_effect(Effect::Sleep))
            } else {
                Ok(TransitionResult::new(DriverState::Active, cursor))
            }
        }

        (DriverState::Active, Event::MessageAppended { message_index }) => {
            let last_observed = usize::try_from(message_index).unwrap_or(usize::MAX);
            let cursor = TurnCursor {
                last_observed,
                ..cursor
            };
            Ok(TransitionResult::new(DriverState::Active, cursor).with_effect(Effect::Cooldown {
                baseline_count: last_observed,
            }))
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{state} cannot handle {}",
            event_name(&event)
        ))),
    }
}

fn stopping(cursor: TurnCursor) -> TransitionResult {
    TransitionResult::new(DriverState::Stopping, cursor).with_effects(Effect::shutdown())
}

/// One scheduling step: pick the next speaker and ask for its message
fn step_active(cursor: TurnCursor, obs: &Observation) -> TransitionResult {
    let settings = &obs.settings;
    if settings.paused || settings.agents.is_empty() {
        return TransitionResult::new(DriverState::Paused, cursor).with_effect(Effect::Sleep);
    }

    if obs.message_count == 0 {
        return restart(cursor);
    }

    let mut cursor = cursor;
    if obs.message_count != cursor.last_observed {
        let roster = settings.roster();
        cursor.turn = scheduler::next_turn(&roster, obs.last_author.as_deref(), cursor.turn)
            .unwrap_or(0);
        cursor.last_observed = obs.message_count;
    }
    cursor.turn %= settings.agents.len();

    let agent = settings.agents[cursor.turn].clone();
    TransitionResult::new(DriverState::Active, cursor)
        .with_effect(Effect::mark(agent.name.clone(), AgentActivity::Thinking))
        .with_effect(Effect::RequestCompletion {
            agent,
            settings: settings.clone(),
        })
}

/// Transcript was deleted: forget everything and wait for a first message
fn restart(cursor: TurnCursor) -> TransitionResult {
    let result = TransitionResult::new(DriverState::WaitingFirstMessage, TurnCursor::reset());
    if cursor.last_observed > 0 {
        result
            .with_effect(Effect::ClearAgentState)
            .with_effect(Effect::Sleep)
    } else {
        result.with_effect(Effect::Sleep)
    }
}

fn finish_turn(
    cursor: TurnCursor,
    agent: String,
    reply: Reply,
    obs: &Observation,
) -> TransitionResult {
    // Transcript reset or rewritten during the call; the next poll re-derives
    if obs.message_count == 0 || obs.message_count < cursor.last_observed {
        return TransitionResult::new(DriverState::Active, cursor);
    }

    let roster = obs.settings.roster();
    let cursor = TurnCursor {
        turn: scheduler::advance(cursor.turn, roster.len()),
        ..cursor
    };

    match reply {
        Reply::Pass(_) => TransitionResult::new(DriverState::Active, cursor)
            .with_effect(Effect::RecordPass { agent, roster }),
        Reply::Contribution(content) => TransitionResult::new(DriverState::Active, cursor)
            .with_effect(Effect::AppendMessage {
                author: agent.clone(),
                content,
            })
            .with_effect(Effect::mark(agent, AgentActivity::Responded)),
    }
}

fn step_all_passed(cursor: TurnCursor, obs: &Observation) -> TransitionResult {
    if obs.message_count == 0 {
        return TransitionResult::new(DriverState::WaitingFirstMessage, TurnCursor::reset())
            .with_effect(Effect::ClearAgentState)
            .with_effect(Effect::Sleep);
    }

    let human_spoke = obs.message_count != cursor.last_observed
        && obs.last_author.as_deref() == Some(USER_AUTHOR);
    if human_spoke {
        let cursor = TurnCursor {
            turn: 0,
            last_observed: obs.message_count,
        };
        return TransitionResult::new(DriverState::Active, cursor)
            .with_effect(Effect::ClearPassHistory);
    }

    TransitionResult::new(DriverState::AllPassedWait, cursor).with_effect(Effect::Sleep)
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Poll(_) => "Poll",
        Event::CompletionFinished { .. } => "CompletionFinished",
        Event::PassRecorded { .. } => "PassRecorded",
        Event::MessageAppended { .. } => "MessageAppended",
    }
}
