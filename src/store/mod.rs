//! Local application data: directory layout, gist settings, bookmarks, and
//! bookmark download from a gist.
//!
//! - `paths`: Where the application keeps its files
//! - `settings`: Gist sync configuration (`config.json`)
//! - `bookmarks`: Bookmark records and the JSON file store
//! - `gist`: Gist client with retry

pub mod bookmarks;
pub mod gist;
pub mod paths;
pub mod settings;

use std::path::PathBuf;

use thiserror::Error;

pub use bookmarks::{Bookmark, BookmarkStore, LoginCommand};
pub use gist::GistClient;
pub use paths::AppPaths;
pub use settings::{GistConfig, GistPlatform};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no configuration directory available on this platform")]
    NoConfigDir,

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Http(String),

    #[error("access token is empty")]
    MissingToken,

    #[error("gist not found: {0}")]
    GistNotFound(String),

    #[error("no bookmark matches '{0}'")]
    UnknownBookmark(String),

    #[error("invalid bookmark {0}")]
    InvalidProfile(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
