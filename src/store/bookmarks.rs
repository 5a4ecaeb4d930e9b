//! Bookmark records and their JSON file store.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::ssh::profile::{ConnectionProfile, DEFAULT_SSH_PORT};

use super::StoreError;

/// One command of a bookmark's login script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCommand {
    pub cmd: String,
    /// Milliseconds to wait before sending; the bookmark's `loginScriptDelay` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

/// A saved host, as stored in `bookmarks.json`.
///
/// Several fields are kept only so that records round-trip unchanged
/// through sync; the session uses host, port, username, credentials and the
/// login script.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub host: String,
    pub username: String,
    pub auth_type: String,
    pub password: String,
    pub port: i64,
    pub login_script_delay: u64,
    pub encode: String,
    pub enable_ssh: bool,
    pub enable_sftp: bool,
    pub env_lang: String,
    pub term: String,
    pub proxy: String,
    pub private_key: String,
    pub passphrase: String,
    pub start_directory_local: String,
    pub start_directory: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub login_script: Vec<LoginCommand>,
}

impl Default for Bookmark {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            host: String::new(),
            username: String::new(),
            auth_type: String::new(),
            password: String::new(),
            port: i64::from(DEFAULT_SSH_PORT),
            login_script_delay: 0,
            encode: String::new(),
            enable_ssh: false,
            enable_sftp: false,
            env_lang: String::new(),
            term: String::new(),
            proxy: String::new(),
            private_key: String::new(),
            passphrase: String::new(),
            start_directory_local: String::new(),
            start_directory: String::new(),
            login_script: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Bookmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bookmark")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("login_script", &self.login_script)
            .finish_non_exhaustive()
    }
}

impl Bookmark {
    /// Display label, `title(host)`.
    pub fn label(&self) -> String {
        format!("{}({})", self.title, self.host)
    }

    /// Build the connection profile for a session against this bookmark.
    pub fn to_profile(&self) -> Result<ConnectionProfile, StoreError> {
        if self.host.trim().is_empty() {
            return Err(StoreError::InvalidProfile(format!(
                "{}: host is empty",
                self.label()
            )));
        }

        let port = u16::try_from(self.port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| {
                StoreError::InvalidProfile(format!(
                    "{}: port {} is outside 1-65535",
                    self.label(),
                    self.port
                ))
            })?;

        let mut profile = ConnectionProfile::new(self.host.trim(), port, self.username.as_str());
        if !self.private_key.is_empty() {
            profile = profile.with_private_key(self.private_key.as_str());
        }
        if !self.passphrase.is_empty() {
            profile = profile.with_passphrase(self.passphrase.as_str());
        }
        if !self.password.is_empty() {
            profile = profile.with_password(self.password.as_str());
        }
        for command in &self.login_script {
            let delay = command.delay.unwrap_or(self.login_script_delay);
            profile = profile.with_script_step(command.cmd.as_str(), Duration::from_millis(delay));
        }

        Ok(profile)
    }
}

/// Parse a bookmark list, giving every record without an id a fresh one.
pub fn parse_bookmarks(text: &str) -> Result<Vec<Bookmark>, StoreError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let bookmarks: Vec<Bookmark> = serde_json::from_str(text)?;
    Ok(assign_ids(bookmarks))
}

fn assign_ids(mut bookmarks: Vec<Bookmark>) -> Vec<Bookmark> {
    for bookmark in bookmarks.iter_mut().filter(|b| b.id.is_empty()) {
        bookmark.id = Uuid::new_v4().to_string();
    }
    bookmarks
}

/// Bookmarks backed by a JSON file.
#[derive(Debug)]
pub struct BookmarkStore {
    path: PathBuf,
    bookmarks: Vec<Bookmark>,
}

impl BookmarkStore {
    /// Load `path`. A missing file is an empty store; a malformed one is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let bookmarks = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
            parse_bookmarks(&text)?
        } else {
            debug!("No bookmark file at {}", path.display());
            Vec::new()
        };

        Ok(Self { path, bookmarks })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    /// Replace every bookmark and write the file.
    pub fn replace(&mut self, bookmarks: Vec<Bookmark>) -> Result<(), StoreError> {
        self.bookmarks = assign_ids(bookmarks);
        self.save()
    }

    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let text = serde_json::to_string_pretty(&self.bookmarks)?;
        // Write next to the target, then rename, so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        info!(
            "Saved {} bookmark(s) to {}",
            self.bookmarks.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Find a bookmark by id, label, title, or 1-based position, in that order.
    pub fn find(&self, selector: &str) -> Option<&Bookmark> {
        let selector = selector.trim();

        self.bookmarks
            .iter()
            .find(|b| b.id == selector)
            .or_else(|| self.bookmarks.iter().find(|b| b.label() == selector))
            .or_else(|| self.bookmarks.iter().find(|b| b.title == selector))
            .or_else(|| {
                selector
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|index| self.bookmarks.get(index))
            })
    }
}
