use super::{remove_if_exists, StoreError, StoreResult};
use std::path::{Path, PathBuf};

/// Stop request marker; its presence is the signal
#[derive(Debug, Clone)]
pub struct StopFile {
    path: PathBuf,
}

impl StopFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_raised(&self) -> bool {
        self.path.exists()
    }

    pub fn raise(&self) -> StoreResult<()> {
        std::fs::write(&self.path, "stop").map_err(|e| StoreError::io(&self.path, e))
    }

    pub fn clear(&self) -> StoreResult<()> {
        remove_if_exists(&self.path)
    }
}
