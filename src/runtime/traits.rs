//! Trait abstractions for the shared session state
//!
//! These traits enable testing the driver against an isolated workspace and
//! keep the polling file protocol behind one seam.

use crate::store::{
    AgentActivity, AgentStateSnapshot, FileWorkspace, Message, Settings, StoreResult,
};
use std::path::Path;
use std::sync::Arc;

/// The shared append-only transcript
pub trait TranscriptStore: Send + Sync {
    /// Append a message and return it with its assigned index
    fn append(&self, author: &str, content: &str) -> StoreResult<Message>;

    /// Full raw text, empty when absent
    fn read(&self) -> StoreResult<String>;

    fn count(&self) -> StoreResult<usize>;

    fn last_author(&self) -> StoreResult<Option<String>>;

    /// Parsed messages
    fn messages(&self) -> StoreResult<Vec<Message>>;

    /// Delete the transcript
    fn remove(&self) -> StoreResult<()>;

    /// Where the transcript lives, for reporting
    fn location(&self) -> &Path;

    /// Count and last author in one read
    fn observe_transcript(&self) -> StoreResult<(usize, Option<String>)> {
        Ok((self.count()?, self.last_author()?))
    }
}

/// Shared settings record
pub trait SettingsStore: Send + Sync {
    /// Never fails; defaults stand in for missing or corrupt settings
    fn load_settings(&self) -> Settings;

    fn save_settings(&self, settings: &Settings) -> StoreResult<()>;
}

/// Advisory agent activity and pass window
pub trait AgentStateStore: Send + Sync {
    fn load_agent_state(&self) -> AgentStateSnapshot;

    fn mark_agent(&self, agent: &str, activity: AgentActivity) -> StoreResult<AgentStateSnapshot>;

    fn all_passed(&self, roster: &[String]) -> bool;

    fn clear_pass_history(&self) -> StoreResult<()>;

    fn clear_agent_state(&self) -> StoreResult<()>;
}

/// Cross-process stop request
pub trait StopSignal: Send + Sync {
    fn stop_requested(&self) -> bool;

    fn request_stop(&self) -> StoreResult<()>;

    fn clear_stop(&self) -> StoreResult<()>;
}

/// Combined session state trait for convenience
pub trait Workspace: TranscriptStore + SettingsStore + AgentStateStore + StopSignal {}
impl<T: TranscriptStore + SettingsStore + AgentStateStore + StopSignal> Workspace for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

impl<T: TranscriptStore + ?Sized> TranscriptStore for Arc<T> {
    fn append(&self, author: &str, content: &str) -> StoreResult<Message> {
        (**self).append(author, content)
    }

    fn read(&self) -> StoreResult<String> {
        (**self).read()
    }

    fn count(&self) -> StoreResult<usize> {
        (**self).count()
    }

    fn last_author(&self) -> StoreResult<Option<String>> {
        (**self).last_author()
    }

    fn messages(&self) -> StoreResult<Vec<Message>> {
        (**self).messages()
    }

    fn remove(&self) -> StoreResult<()> {
        (**self).remove()
    }

    fn location(&self) -> &Path {
        (**self).location()
    }

    fn observe_transcript(&self) -> StoreResult<(usize, Option<String>)> {
        (**self).observe_transcript()
    }
}

impl<T: SettingsStore + ?Sized> SettingsStore for Arc<T> {
    fn load_settings(&self) -> Settings {
        (**self).load_settings()
    }

    fn save_settings(&self, settings: &Settings) -> StoreResult<()> {
        (**self).save_settings(settings)
    }
}

impl<T: AgentStateStore + ?Sized> AgentStateStore for Arc<T> {
    fn load_agent_state(&self) -> AgentStateSnapshot {
        (**self).load_agent_state()
    }

    fn mark_agent(&self, agent: &str, activity: AgentActivity) -> StoreResult<AgentStateSnapshot> {
        (**self).mark_agent(agent, activity)
    }

    fn all_passed(&self, roster: &[String]) -> bool {
        (**self).all_passed(roster)
    }

    fn clear_pass_history(&self) -> StoreResult<()> {
        (**self).clear_pass_history()
    }

    fn clear_agent_state(&self) -> StoreResult<()> {
        (**self).clear_agent_state()
    }
}

impl<T: StopSignal + ?Sized> StopSignal for Arc<T> {
    fn stop_requested(&self) -> bool {
        (**self).stop_requested()
    }

    fn request_stop(&self) -> StoreResult<()> {
        (**self).request_stop()
    }

    fn clear_stop(&self) -> StoreResult<()> {
        (**self).clear_stop()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

impl TranscriptStore for FileWorkspace {
    fn append(&self, author: &str, content: &str) -> StoreResult<Message> {
        self.transcript().append(author, content)
    }

    fn read(&self) -> StoreResult<String> {
        self.transcript().read()
    }

    fn count(&self) -> StoreResult<usize> {
        self.transcript().count()
    }

    fn last_author(&self) -> StoreResult<Option<String>> {
        self.transcript().last_author()
    }

    fn messages(&self) -> StoreResult<Vec<Message>> {
        self.transcript().messages()
    }

    fn remove(&self) -> StoreResult<()> {
        self.transcript().remove()
    }

    fn location(&self) -> &Path {
        self.transcript().path()
    }

    fn observe_transcript(&self) -> StoreResult<(usize, Option<String>)> {
        self.transcript().observe()
    }
}

impl SettingsStore for FileWorkspace {
    fn load_settings(&self) -> Settings {
        self.settings().load()
    }

    fn save_settings(&self, settings: &Settings) -> StoreResult<()> {
        self.settings().save(settings)
    }
}

impl AgentStateStore for FileWorkspace {
    fn load_agent_state(&self) -> AgentStateSnapshot {
        self.agent_state().load()
    }

    fn mark_agent(&self, agent: &str, activity: AgentActivity) -> StoreResult<AgentStateSnapshot> {
        self.agent_state().update(agent, activity)
    }

    fn all_passed(&self, roster: &[String]) -> bool {
        self.agent_state().all_passed(roster)
    }

    fn clear_pass_history(&self) -> StoreResult<()> {
        self.agent_state().clear_pass_history()
    }

    fn clear_agent_state(&self) -> StoreResult<()> {
        self.agent_state().clear()
    }
}

impl StopSignal for FileWorkspace {
    fn stop_requested(&self) -> bool {
        self.stop().is_raised()
    }

    fn request_stop(&self) -> StoreResult<()> {
        self.stop().raise()
    }

    fn clear_stop(&self) -> StoreResult<()> {
        self.stop().clear()
    }
}
