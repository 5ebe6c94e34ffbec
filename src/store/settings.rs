//! Shared settings record
//!
//! Written whole by either process, last write wins. Loading never fails:
//! absent or unreadable settings fall back to defaults.

use super::{read_optional, write_replace, StoreError, StoreResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MAX_TOKENS_RANGE: RangeInclusive<u32> = 100..=4000;
pub const DELAY_SECONDS_RANGE: RangeInclusive<u32> = 0..=300;
pub const DEFAULT_MODEL: &str = "gpt-4o";

const DEFAULT_MAX_TOKENS: u32 = 512;
const DEFAULT_REASONING_EFFORT: &str = "medium";

fn clamp_into(value: i64, range: &RangeInclusive<u32>) -> u32 {
    let clamped = value.clamp(i64::from(*range.start()), i64::from(*range.end()));
    u32::try_from(clamped).unwrap_or(*range.start())
}

pub fn clamp_max_tokens(value: i64) -> u32 {
    clamp_into(value, &MAX_TOKENS_RANGE)
}

pub fn clamp_delay_seconds(value: i64) -> u32 {
    clamp_into(value, &DELAY_SECONDS_RANGE)
}

/// Integer field that may have been written as a float; fractions are dropped
#[derive(Deserialize)]
#[serde(untagged)]
enum WholeNumber {
    Int(i64),
    Float(f64),
}

impl WholeNumber {
    #[allow(clippy::cast_possible_truncation)]
    fn truncate(self) -> i64 {
        match self {
            WholeNumber::Int(v) => v,
            WholeNumber::Float(v) => v.trunc() as i64,
        }
    }
}

pub(crate) fn de_whole_number_opt<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<i64>, D::Error> {
    Option::<WholeNumber>::deserialize(d).map(|v| v.map(WholeNumber::truncate))
}

fn de_max_tokens<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    WholeNumber::deserialize(d).map(|v| clamp_max_tokens(v.truncate()))
}

fn de_delay_seconds<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    WholeNumber::deserialize(d).map(|v| clamp_delay_seconds(v.truncate()))
}

fn default_agent_name() -> String {
    "Unknown".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// One roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            model: default_model(),
            reasoning_effort: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(deserialize_with = "de_max_tokens")]
    pub max_tokens: u32,
    #[serde(deserialize_with = "de_delay_seconds")]
    pub delay_seconds: u32,
    pub paused: bool,
    pub global_prompt: String,
    pub agents: Vec<AgentConfig>,
    pub default_reasoning_effort: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            delay_seconds: 0,
            paused: false,
            global_prompt: String::new(),
            agents: Vec::new(),
            default_reasoning_effort: DEFAULT_REASONING_EFFORT.to_string(),
        }
    }
}

impl Settings {
    /// Numeric fields forced into their allowed ranges
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.max_tokens = clamp_max_tokens(i64::from(self.max_tokens));
        self.delay_seconds = clamp_delay_seconds(i64::from(self.delay_seconds));
        self
    }

    /// Agent names in speaking order
    pub fn roster(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.delay_seconds))
    }

    /// The agent's own hint wins over the session default
    pub fn reasoning_effort_for<'a>(&'a self, agent: &'a AgentConfig) -> &'a str {
        agent
            .reasoning_effort
            .as_deref()
            .unwrap_or(&self.default_reasoning_effort)
    }
}

#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Settings {
        let text = match read_optional(&self.path) {
            Ok(Some(text)) => text,
            Ok(None) => return Settings::default(),
            Err(e) => {
                tracing::debug!(error = %e, "Settings unreadable, using defaults");
                return Settings::default();
            }
        };

        match serde_json::from_str::<Settings>(&text) {
            Ok(settings) => settings.clamped(),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Settings corrupt, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> StoreResult<()> {
        let clamped = settings.clone().clamped();
        let json = serde_json::to_vec_pretty(&clamped).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })?;
        write_replace(&self.path, &json)
    }
}
