//! SSH bookmark manager with interactive remote sessions.
//!
//! - [`ssh`]: credential resolution, negotiation, and the interactive session
//! - [`store`]: bookmarks, gist settings, and gist download
//! - [`app`]: the application context the front end drives

pub mod app;
pub mod ssh;
pub mod store;

#[cfg(test)]
pub(crate) mod test_utils;
