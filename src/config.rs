//! Process configuration from environment variables

use crate::runtime::DriverOptions;
use crate::store::{SessionPaths, DEFAULT_CHANNEL_FILE};
use std::path::PathBuf;
use std::time::Duration;

/// Everything the binary needs to start a driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZooConfig {
    /// Directory holding the shared session files
    pub session_dir: PathBuf,
    /// Transcript file name inside the session directory
    pub channel_file: String,
    /// Replaces any existing transcript when set
    pub opening_message: Option<String>,
    pub tick: Option<Duration>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
}

impl ZooConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let tick = get("AGENT_ZOO_TICK_MS").and_then(|ms| match ms.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
            _ => {
                tracing::warn!(value = %ms, "Ignoring invalid AGENT_ZOO_TICK_MS");
                None
            }
        });

        Self {
            session_dir: get("AGENT_ZOO_DIR").map_or_else(|| PathBuf::from("."), PathBuf::from),
            channel_file: get("AGENT_ZOO_CHANNEL")
                .unwrap_or_else(|| DEFAULT_CHANNEL_FILE.to_string()),
            opening_message: get("AGENT_ZOO_MESSAGE"),
            tick,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
        }
    }

    pub fn session_paths(&self) -> SessionPaths {
        SessionPaths::new(&self.session_dir, &self.channel_file)
    }

    pub fn driver_options(&self) -> DriverOptions {
        let mut options = DriverOptions::default();
        if let Some(tick) = self.tick {
            options.tick = tick;
        }
        options
    }
}
