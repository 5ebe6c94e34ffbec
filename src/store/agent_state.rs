//! Advisory agent activity and the pass-history window
//!
//! The snapshot is informational for the panel except for `pass_history`,
//! which the driver consults to detect that every agent has passed.

use super::{read_optional, remove_if_exists, write_replace, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Passes older than this no longer count toward a deadlock
pub const PASS_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentActivity {
    #[default]
    Idle,
    Thinking,
    Passed,
    Responded,
}

impl fmt::Display for AgentActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentActivity::Idle => "idle",
            AgentActivity::Thinking => "thinking",
            AgentActivity::Passed => "passed",
            AgentActivity::Responded => "responded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRecord {
    pub agent: String,
    /// Seconds since the Unix epoch
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentStateSnapshot {
    pub current_agent: Option<String>,
    pub state: AgentActivity,
    pub timestamp: f64,
    pub pass_history: Vec<PassRecord>,
}

impl AgentStateSnapshot {
    /// Apply one activity update at time `now`
    pub fn record(&mut self, agent: &str, activity: AgentActivity, now: f64) {
        self.current_agent = Some(agent.to_string());
        self.state = activity;
        self.timestamp = now;
        if activity == AgentActivity::Passed {
            self.pass_history.push(PassRecord {
                agent: agent.to_string(),
                time: now,
            });
        }
        self.prune(now);
    }

    /// Drop passes that fell out of the window
    pub fn prune(&mut self, now: f64) {
        let horizon = now - PASS_WINDOW.as_secs_f64();
        self.pass_history.retain(|p| p.time > horizon);
    }

    /// Every roster name has a pass in the history
    pub fn all_passed<S: AsRef<str>>(&self, roster: &[S]) -> bool {
        if roster.is_empty() || self.pass_history.is_empty() {
            return false;
        }
        roster
            .iter()
            .all(|name| self.pass_history.iter().any(|p| p.agent == name.as_ref()))
    }
}

/// Wall clock in fractional epoch seconds
#[allow(clippy::cast_precision_loss)]
pub(crate) fn now_seconds() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp_millis() as f64 / 1000.0
}

#[derive(Debug, Clone)]
pub struct AgentStateFile {
    path: PathBuf,
}

impl AgentStateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot; absent or corrupt state reads as the default
    pub fn load(&self) -> AgentStateSnapshot {
        match read_optional(&self.path) {
            Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Agent state corrupt, starting fresh");
                AgentStateSnapshot::default()
            }),
            Ok(None) => AgentStateSnapshot::default(),
            Err(e) => {
                tracing::debug!(error = %e, "Agent state unreadable, starting fresh");
                AgentStateSnapshot::default()
            }
        }
    }

    pub fn update(&self, agent: &str, activity: AgentActivity) -> StoreResult<AgentStateSnapshot> {
        self.update_at(agent, activity, now_seconds())
    }

    pub fn update_at(
        &self,
        agent: &str,
        activity: AgentActivity,
        now: f64,
    ) -> StoreResult<AgentStateSnapshot> {
        let mut snapshot = self.load();
        snapshot.record(agent, activity, now);
        self.save(&snapshot)?;
        Ok(snapshot)
    }

    pub fn all_passed<S: AsRef<str>>(&self, roster: &[S]) -> bool {
        self.all_passed_at(roster, now_seconds())
    }

    pub fn all_passed_at<S: AsRef<str>>(&self, roster: &[S], now: f64) -> bool {
        let mut snapshot = self.load();
        snapshot.prune(now);
        snapshot.all_passed(roster)
    }

    /// Forget recent passes but keep the activity fields
    pub fn clear_pass_history(&self) -> StoreResult<()> {
        let mut snapshot = self.load();
        if snapshot.pass_history.is_empty() {
            return Ok(());
        }
        snapshot.pass_history.clear();
        self.save(&snapshot)
    }

    pub fn clear(&self) -> StoreResult<()> {
        remove_if_exists(&self.path)
    }

    fn save(&self, snapshot: &AgentStateSnapshot) -> StoreResult<()> {
        let json = serde_json::to_vec(snapshot).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })?;
        write_replace(&self.path, &json)
    }
}
