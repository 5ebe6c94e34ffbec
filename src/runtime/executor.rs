//! Conversation driver executor

use super::traits::Workspace;
use super::{DriverError, DriverOptions, DriverOutcome};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::prompt::{build_instructions, transcript_turn};
use crate::state_machine::{
    transition, DriverState, Effect, Event, Observation, PassReason, Reply, TurnCursor,
};
use crate::store::{AgentActivity, AgentConfig, Settings, USER_AUTHOR};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const PREVIEW_CHARS: usize = 60;
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Single-task driver: one completion in flight at most, shared state
/// re-read every tick
pub struct ConversationDriver<W, C>
where
    W: Workspace,
    C: CompletionClient,
{
    workspace: W,
    client: C,
    options: DriverOptions,
    state: DriverState,
    cursor: TurnCursor,
}

impl<W, C> ConversationDriver<W, C>
where
    W: Workspace,
    C: CompletionClient,
{
    pub fn new(workspace: W, client: C, options: DriverOptions) -> Self {
        Self {
            workspace,
            client,
            options,
            state: DriverState::default(),
            cursor: TurnCursor::default(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    /// Prepare shared state for a new run.
    ///
    /// Clears a stale stop request and agent state. With an opening message
    /// the old transcript is discarded and the message becomes the first
    /// `User` entry; without one, whatever transcript exists is resumed.
    pub fn start_session(&mut self, opening: Option<&str>) -> Result<(), DriverError> {
        self.workspace.clear_stop()?;
        self.workspace.clear_agent_state()?;

        if let Some(text) = opening.map(str::trim).filter(|t| !t.is_empty()) {
            self.workspace.remove()?;
            let msg = self.workspace.append(USER_AUTHOR, text)?;
            tracing::info!(index = msg.index, "Session started with opening message");
        } else {
            tracing::info!(
                messages = self.workspace.count()?,
                "Session resumed from existing transcript"
            );
        }

        self.state = DriverState::WaitingFirstMessage;
        self.cursor = TurnCursor::reset();
        Ok(())
    }

    pub async fn run(mut self) -> Result<DriverOutcome, DriverError> {
        tracing::info!(
            transcript = %self.workspace.location().display(),
            "Starting conversation driver"
        );

        while !self.state.is_terminal() {
            let observation = self.observe()?;
            self.process_event(Event::Poll(observation)).await?;
        }

        let outcome = DriverOutcome {
            transcript: self.workspace.location().to_path_buf(),
            messages: self.workspace.count()?,
        };
        tracing::info!(messages = outcome.messages, "Conversation driver stopped");
        Ok(outcome)
    }

    /// Read everything a transition needs from shared state
    fn observe(&self) -> Result<Observation, DriverError> {
        let stop_requested = self.workspace.stop_requested();
        let settings = self.workspace.load_settings();
        let (message_count, last_author) = self.workspace.observe_transcript()?;
        Ok(Observation {
            stop_requested,
            settings,
            message_count,
            last_author,
        })
    }

    async fn process_event(&mut self, event: Event) -> Result<(), DriverError> {
        // Follow-up events run in the order their effects produced them
        let mut events_to_process = VecDeque::from([event]);

        while let Some(current_event) = events_to_process.pop_front() {
            let result = transition(self.state, self.cursor, current_event)?;

            if result.new_state != self.state {
                tracing::info!(from = %self.state, to = %result.new_state, "Driver state changed");
            }
            self.state = result.new_state;
            self.cursor = result.cursor;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await? {
                    events_to_process.push_back(generated_event);
                }
            }
        }

        Ok(())
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, DriverError> {
        match effect {
            Effect::Sleep => {
                tokio::time::sleep(self.options.tick).await;
                Ok(None)
            }

            Effect::MarkAgent { agent, activity } => {
                self.mark_agent(&agent, activity);
                Ok(None)
            }

            Effect::RequestCompletion { agent, settings } => {
                let event = self.request_completion(agent, &settings).await?;
                Ok(Some(event))
            }

            Effect::RecordPass { agent, roster } => {
                self.mark_agent(&agent, AgentActivity::Passed);
                let all_passed = self.workspace.all_passed(&roster);
                tracing::info!(agent = %agent, all_passed, "Agent passed");
                Ok(Some(Event::PassRecorded { agent, all_passed }))
            }

            Effect::AppendMessage { author, content } => {
                let msg = self.workspace.append(&author, &content)?;
                tracing::info!(
                    agent = %msg.author,
                    index = msg.index,
                    preview = %preview(&msg.content),
                    "Agent responded"
                );
                Ok(Some(Event::MessageAppended {
                    message_index: msg.index,
                }))
            }

            Effect::Cooldown { baseline_count } => {
                self.cooldown(baseline_count).await?;
                Ok(None)
            }

            Effect::ClearAgentState => {
                if let Err(e) = self.workspace.clear_agent_state() {
                    tracing::warn!(error = %e, "Failed to clear agent state");
                }
                Ok(None)
            }

            Effect::ClearPassHistory => {
                if let Err(e) = self.workspace.clear_pass_history() {
                    tracing::warn!(error = %e, "Failed to clear pass history");
                }
                Ok(None)
            }

            Effect::ClearStopSignal => {
                self.workspace.clear_stop()?;
                Ok(None)
            }

            Effect::Finish => {
                tracing::info!(
                    transcript = %self.workspace.location().display(),
                    "Conversation saved"
                );
                Ok(None)
            }
        }
    }

    /// Agent state is advisory; failing to write it never stops the driver
    fn mark_agent(&self, agent: &str, activity: AgentActivity) {
        if let Err(e) = self.workspace.mark_agent(agent, activity) {
            tracing::warn!(agent = %agent, %activity, error = %e, "Failed to update agent state");
        }
    }

    async fn request_completion(
        &self,
        agent: AgentConfig,
        settings: &Settings,
    ) -> Result<Event, DriverError> {
        let request = CompletionRequest {
            instructions: build_instructions(settings, &agent),
            input: transcript_turn(&self.workspace.read()?),
            max_tokens: settings.max_tokens,
            model: agent.model.clone(),
            reasoning_effort: Some(settings.reasoning_effort_for(&agent).to_string()),
        };

        tracing::debug!(agent = %agent.name, model = %agent.model, "Requesting completion");
        let reply = self.complete_with_retry(&agent.name, &request).await;

        // Shared state may have changed while the call was in flight
        let observation = self.observe()?;
        Ok(Event::CompletionFinished {
            agent: agent.name,
            reply,
            observation,
        })
    }

    /// Retry transient failures with backoff; a final failure becomes a pass
    async fn complete_with_retry(&self, agent: &str, request: &CompletionRequest) -> Reply {
        let max_attempts = self.options.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.client.complete(request).await {
                Ok(response) => return Reply::classify(&response.completion),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    if self.workspace.stop_requested() {
                        break;
                    }
                    let delay = e
                        .retry_after
                        .map_or_else(|| self.options.retry_delay(attempt), |d| d.min(MAX_RETRY_AFTER));
                    tracing::warn!(
                        agent = %agent,
                        attempt,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(agent = %agent, attempt, error = %e, "Completion failed, treating as pass");
                    return Reply::Pass(PassReason::Failed);
                }
            }
        }

        Reply::Pass(PassReason::Failed)
    }

    /// Inter-turn delay. Ends early on stop, pause, a new message or a reset.
    async fn cooldown(&self, baseline_count: usize) -> Result<(), DriverError> {
        let delay = self.workspace.load_settings().delay();
        if delay.is_zero() {
            return Ok(());
        }

        let deadline = Instant::now() + delay;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if self.workspace.stop_requested() || self.workspace.load_settings().paused {
                break;
            }
            let count = self.workspace.count()?;
            if count == 0 || count > baseline_count {
                tracing::debug!(count, baseline_count, "Cooldown interrupted by transcript change");
                break;
            }
            tokio::time::sleep(self.options.tick.min(deadline - now)).await;
        }
        Ok(())
    }
}

/// Single-line preview of a message for progress logs
fn preview(content: &str) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        flat
    }
}
