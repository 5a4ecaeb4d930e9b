//! Application context.
//!
//! Holds everything the front end works with: file locations, gist settings,
//! the bookmark list, session settings and the last status line. Each
//! operation owns its writes to the context; nothing here is global.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::ssh::prompt::Prompter;
use crate::ssh::terminal::LocalTerminal;
use crate::ssh::{self, STATUS_CONNECTED, SessionSettings};
use crate::store::{AppPaths, Bookmark, BookmarkStore, GistClient, GistConfig, StoreError};

pub struct AppContext {
    paths: AppPaths,
    gist: GistConfig,
    bookmarks: BookmarkStore,
    settings: SessionSettings,
    status: String,
}

impl AppContext {
    /// Load configuration and bookmarks from `paths`, creating the
    /// application directory and default configuration when needed.
    pub fn load(paths: AppPaths, settings: SessionSettings) -> Result<Self, StoreError> {
        paths.ensure()?;
        let gist = GistConfig::load_or_create(&paths.config())?;
        let bookmarks = BookmarkStore::load(paths.bookmarks())?;

        info!(
            "Loaded {} bookmark(s) from {}",
            bookmarks.len(),
            bookmarks.path().display()
        );

        Ok(Self {
            status: format!("bookmarks: {}", bookmarks.path().display()),
            paths,
            gist,
            bookmarks,
            settings,
        })
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        self.bookmarks.bookmarks()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Open an interactive session against the bookmark `selector` names.
    ///
    /// The outcome is recorded as the status line: `connected`,
    /// `connection failed: ...` or `login failed: ...`.
    pub async fn activate(
        &mut self,
        selector: &str,
        prompter: Arc<dyn Prompter>,
        terminal: Arc<dyn LocalTerminal>,
        shutdown: CancellationToken,
    ) -> &str {
        let profile = match self
            .bookmarks
            .find(selector)
            .ok_or_else(|| StoreError::UnknownBookmark(selector.to_string()))
            .and_then(Bookmark::to_profile)
        {
            Ok(profile) => profile,
            Err(e) => {
                error!("Cannot open session: {}", e);
                self.status = format!("connection failed: {}", e);
                return &self.status;
            }
        };

        self.status = match ssh::open_interactive_session(
            &profile,
            self.settings.clone(),
            prompter,
            terminal,
            shutdown,
        )
        .await
        {
            Ok(_) => STATUS_CONNECTED.to_string(),
            Err(e) => {
                error!("Session with {} failed: {}", profile.destination(), e);
                e.status()
            }
        };
        &self.status
    }

    /// Replace the local bookmarks with the ones in the configured gist.
    pub async fn sync(&mut self) -> &str {
        match GistClient::new(self.gist.clone()) {
            Ok(client) => self.sync_with(&client).await,
            Err(e) => {
                self.status = format!("sync failed: {}", e);
                &self.status
            }
        }
    }

    pub(crate) async fn sync_with(&mut self, client: &GistClient) -> &str {
        let result = match client.fetch_bookmarks().await {
            Ok(bookmarks) => self.bookmarks.replace(bookmarks),
            Err(e) => Err(e),
        };

        self.status = match result {
            Ok(()) => format!("sync succeeded: {} bookmarks", self.bookmarks.len()),
            Err(e) => {
                error!("Bookmark sync failed: {}", e);
                format!("sync failed: {}", e)
            }
        };
        &self.status
    }
}
