//! Control-panel operations on the shared session
//!
//! These are the mutations a separate panel process performs while the driver
//! runs: post human messages, restart, stop, and edit settings. They go
//! through the same files the driver polls, so nothing here talks to the
//! driver directly. Prompt enrichment is the one panel action that calls a
//! model instead.

use crate::llm::{Completion, CompletionClient, CompletionRequest, LlmError};
use crate::prompt::{enrich_brief, ENRICH_INSTRUCTIONS};
use crate::runtime::Workspace;
use crate::store::{
    clamp_delay_seconds, clamp_max_tokens, de_whole_number_opt, estimate_tokens, AgentConfig,
    AgentStateSnapshot, Message, Settings, StoreError, USER_AUTHOR,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("No prompt provided")]
    EmptyPrompt,
    #[error("Enrichment refused: {0}")]
    Refused(String),
    #[error("Enrichment failed: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Partial settings edit; absent fields are left alone
const ENRICH_MODEL: &str = "gpt-4o";
const ENRICH_MAX_TOKENS: u32 = 500;
const DEFAULT_ENRICH_NAME: &str = "Agent";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    #[serde(deserialize_with = "de_whole_number_opt")]
    pub max_tokens: Option<i64>,
    #[serde(deserialize_with = "de_whole_number_opt")]
    pub delay_seconds: Option<i64>,
    pub paused: Option<bool>,
    pub global_prompt: Option<String>,
    pub default_reasoning_effort: Option<String>,
    pub agents: Option<Vec<AgentConfig>>,
}

impl SettingsUpdate {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.max_tokens {
            settings.max_tokens = clamp_max_tokens(v);
        }
        if let Some(v) = self.delay_seconds {
            settings.delay_seconds = clamp_delay_seconds(v);
        }
        if let Some(v) = self.paused {
            settings.paused = v;
        }
        if let Some(v) = self.global_prompt {
            settings.global_prompt = v;
        }
        if let Some(v) = self.default_reasoning_effort {
            settings.default_reasoning_effort = v;
        }
        if let Some(v) = self.agents {
            settings.agents = v;
        }
    }
}

/// What the panel renders on each refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSnapshot {
    pub messages: Vec<Message>,
    pub total_tokens: usize,
    pub agent_state: AgentStateSnapshot,
    pub settings: Settings,
}

pub struct ControlPanel<W> {
    workspace: W,
}

impl<W: Workspace> ControlPanel<W> {
    pub fn new(workspace: W) -> Self {
        Self { workspace }
    }

    /// Append a human message to the transcript
    pub fn post_user_message(&self, text: &str) -> Result<Message, ControlError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ControlError::EmptyMessage);
        }
        let msg = self.workspace.append(USER_AUTHOR, text)?;
        tracing::info!(index = msg.index, "User message posted");
        Ok(msg)
    }

    /// Delete the transcript; the driver notices and waits for a new first message
    pub fn restart(&self) -> Result<(), ControlError> {
        self.workspace.remove()?;
        tracing::info!("Transcript cleared");
        Ok(())
    }

    pub fn request_stop(&self) -> Result<(), ControlError> {
        self.workspace.request_stop()?;
        tracing::info!("Stop requested");
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        self.workspace.load_settings()
    }

    /// Load, apply with clamping, save; returns the saved record
    pub fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, ControlError> {
        let mut settings = self.workspace.load_settings();
        update.apply(&mut settings);
        self.workspace.save_settings(&settings)?;
        Ok(settings)
    }

    pub fn replace_agents(&self, agents: Vec<AgentConfig>) -> Result<Settings, ControlError> {
        self.update_settings(SettingsUpdate {
            agents: Some(agents),
            ..SettingsUpdate::default()
        })
    }

    pub fn set_paused(&self, paused: bool) -> Result<Settings, ControlError> {
        self.update_settings(SettingsUpdate {
            paused: Some(paused),
            ..SettingsUpdate::default()
        })
    }

    pub fn snapshot(&self) -> Result<PanelSnapshot, ControlError> {
        let text = self.workspace.read()?;
        Ok(PanelSnapshot {
            messages: crate::store::parse(&text),
            total_tokens: estimate_tokens(&text),
            agent_state: self.workspace.load_agent_state(),
            settings: self.workspace.load_settings(),
        })
    }
}

/// Expand a short agent description into a full prompt.
///
/// One call, no retries: the panel shows the error and the user can click
/// again.
pub async fn enrich_prompt<C>(
    client: &C,
    name: &str,
    prompt: &str,
) -> Result<String, ControlError>
where
    C: CompletionClient + ?Sized,
{
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ControlError::EmptyPrompt);
    }
    let name = match name.trim() {
        "" => DEFAULT_ENRICH_NAME,
        n => n,
    };

    let request = CompletionRequest {
        instructions: ENRICH_INSTRUCTIONS.to_string(),
        input: enrich_brief(name, prompt),
        max_tokens: ENRICH_MAX_TOKENS,
        model: ENRICH_MODEL.to_string(),
        reasoning_effort: None,
    };

    match client.complete(&request).await {
        Ok(response) => match response.completion {
            Completion::Text(text) => Ok(text.trim().to_string()),
            Completion::Refusal(reason) => Err(ControlError::Refused(reason)),
        },
        Err(e) => {
            tracing::warn!(agent = %name, error = %e, "Prompt enrichment failed");
            Err(e.into())
        }
    }
}
