//! Gist sync configuration.
//!
//! Stored as `config.json` in the application directory. A default file is
//! written the first time the application runs so the user has something to
//! fill in.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::StoreError;

const DEFAULT_PLATFORM: &str = "github";

/// Where the bookmark gist is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GistPlatform {
    Github,
    Gitee,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistConfig {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub gist_id: String,
}

fn default_platform() -> String {
    DEFAULT_PLATFORM.to_string()
}

impl Default for GistConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            token: String::new(),
            gist_id: String::new(),
        }
    }
}

impl std::fmt::Debug for GistConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GistConfig")
            .field("platform", &self.platform)
            .field("token", &if self.token.is_empty() { "" } else { "<set>" })
            .field("gist_id", &self.gist_id)
            .finish()
    }
}

impl GistConfig {
    /// Anything other than `gitee` means GitHub.
    pub fn platform(&self) -> GistPlatform {
        if self.platform.eq_ignore_ascii_case("gitee") {
            GistPlatform::Gitee
        } else {
            GistPlatform::Github
        }
    }

    /// Read `path`, writing the default configuration there first if it is missing.
    pub fn load_or_create(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
            let text = serde_json::to_string(&GistConfig::default())?;
            fs::write(path, text).map_err(|e| StoreError::io(path, e))?;
            info!("Created default configuration at {}", path.display());
        }

        let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}
