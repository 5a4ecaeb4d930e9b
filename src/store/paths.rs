//! Application directory layout.

use std::fs;
use std::path::{Path, PathBuf};

use super::StoreError;

/// Name of the application directory inside the platform config directory.
pub const APP_DIR_NAME: &str = "ttm";

const BOOKMARKS_FILE: &str = "bookmarks.json";
const CONFIG_FILE: &str = "config.json";
const KNOWN_HOSTS_FILE: &str = "known_hosts";
const LOG_FILE: &str = "ttm.log";

/// Locations of every file the application reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<platform config dir>/ttm`
    pub fn discover() -> Result<Self, StoreError> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join(APP_DIR_NAME)))
            .ok_or(StoreError::NoConfigDir)
    }

    /// Create the application directory if it does not exist yet.
    pub fn ensure(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|e| StoreError::io(&self.root, e))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bookmarks(&self) -> PathBuf {
        self.root.join(BOOKMARKS_FILE)
    }

    pub fn config(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn known_hosts(&self) -> PathBuf {
        self.root.join(KNOWN_HOSTS_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }
}
