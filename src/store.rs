//! Shared on-disk state for one conversation session
//!
//! Every file in the session directory is read and written by two independent
//! processes: the conversation driver and the control panel. Nothing is locked.
//! Each side re-reads the files on every poll, so a lost update heals itself
//! on the next tick.

mod agent_state;
mod settings;
mod stop;
mod transcript;

pub use agent_state::{AgentActivity, AgentStateFile, AgentStateSnapshot, PassRecord, PASS_WINDOW};
pub use settings::{
    clamp_delay_seconds, clamp_max_tokens, AgentConfig, Settings, SettingsFile, DEFAULT_MODEL,
    DELAY_SECONDS_RANGE, MAX_TOKENS_RANGE,
};
pub(crate) use settings::de_whole_number_opt;
pub use stop::StopFile;
pub use transcript::{
    count_frames, estimate_tokens, format_frame, last_author_in, parse, Message, TranscriptFile,
    SEPARATOR, SUBSEPARATOR, USER_AUTHOR,
};

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Default transcript file name inside the session directory
pub const DEFAULT_CHANNEL_FILE: &str = "channel.txt";
const SETTINGS_FILE: &str = ".settings.json";
const AGENT_STATE_FILE: &str = ".agent_state.json";
const STOP_FILE: &str = ".stop";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Locations of the shared files for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub dir: PathBuf,
    pub channel: PathBuf,
    pub settings: PathBuf,
    pub agent_state: PathBuf,
    pub stop: PathBuf,
}

impl SessionPaths {
    pub fn new(dir: impl Into<PathBuf>, channel_file: &str) -> Self {
        let dir = dir.into();
        Self {
            channel: dir.join(channel_file),
            settings: dir.join(SETTINGS_FILE),
            agent_state: dir.join(AGENT_STATE_FILE),
            stop: dir.join(STOP_FILE),
            dir,
        }
    }

    /// Session directory with the default transcript name
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, DEFAULT_CHANNEL_FILE)
    }
}

/// File-backed handle to every shared record of a session
#[derive(Debug, Clone)]
pub struct FileWorkspace {
    paths: SessionPaths,
    transcript: TranscriptFile,
    settings: SettingsFile,
    agent_state: AgentStateFile,
    stop: StopFile,
}

impl FileWorkspace {
    pub fn new(paths: SessionPaths) -> Self {
        Self {
            transcript: TranscriptFile::new(paths.channel.clone()),
            settings: SettingsFile::new(paths.settings.clone()),
            agent_state: AgentStateFile::new(paths.agent_state.clone()),
            stop: StopFile::new(paths.stop.clone()),
            paths,
        }
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    pub fn transcript(&self) -> &TranscriptFile {
        &self.transcript
    }

    pub fn settings(&self) -> &SettingsFile {
        &self.settings
    }

    pub fn agent_state(&self) -> &AgentStateFile {
        &self.agent_state
    }

    pub fn stop(&self) -> &StopFile {
        &self.stop
    }
}

/// Read a file that may legitimately be absent
pub(crate) fn read_optional(path: &Path) -> StoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Delete a file; deleting an absent file succeeds
pub(crate) fn remove_if_exists(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Sibling temp path unique to this process and call
fn temp_path_for(path: &Path) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let seq = NEXT.fetch_add(1, Ordering::Relaxed);

    let mut tmp_name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    tmp_name.push(format!(".{}.{seq}.tmp", std::process::id()));
    path.with_file_name(tmp_name)
}

/// Replace a whole record via a sibling temp file and rename, so the other
/// process never reads a half-written JSON document.
pub(crate) fn write_replace(path: &Path, contents: &[u8]) -> StoreResult<()> {
    let tmp_path = temp_path_for(path);

    fs::write(&tmp_path, contents).map_err(|e| StoreError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))
}
