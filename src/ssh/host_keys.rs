//! Host identity verification policy.

use std::path::{Path, PathBuf};

use russh::keys::{self, PublicKey};
use tracing::{info, warn};

/// How the client decides whether to trust the key a server presents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Trust every server key without looking at it.
    ///
    /// Equivalent to `StrictHostKeyChecking=no`. Only meant for hosts that are
    /// re-keyed constantly or reached over an already-trusted network.
    AcceptAny,
    /// Trust on first use against an OpenSSH `known_hosts` file.
    ///
    /// Known keys are accepted, unknown hosts are recorded and accepted, and a
    /// key that differs from the recorded one is rejected.
    KnownHosts(PathBuf),
}

/// Outcome of checking a server key against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyVerdict {
    Trusted,
    Learned,
    Rejected(String),
}

impl HostKeyVerdict {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, HostKeyVerdict::Rejected(_))
    }
}

impl HostKeyPolicy {
    /// Check `key` for `host:port`, recording it when first seen.
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> HostKeyVerdict {
        match self {
            HostKeyPolicy::AcceptAny => HostKeyVerdict::Trusted,
            HostKeyPolicy::KnownHosts(path) => verify_known_hosts(path, host, port, key),
        }
    }
}

fn verify_known_hosts(path: &Path, host: &str, port: u16, key: &PublicKey) -> HostKeyVerdict {
    match keys::check_known_hosts_path(host, port, key, path) {
        Ok(true) => HostKeyVerdict::Trusted,
        Ok(false) => learn(path, host, port, key),
        Err(keys::Error::KeyChanged { line }) => {
            warn!(
                "Host key for {}:{} does not match {} line {}",
                host,
                port,
                path.display(),
                line
            );
            HostKeyVerdict::Rejected(format!(
                "host key for {}:{} changed (see {} line {})",
                host,
                port,
                path.display(),
                line
            ))
        }
        // A missing or unreadable file means nothing is known yet.
        Err(e) => {
            warn!("Could not read known hosts file {}: {}", path.display(), e);
            learn(path, host, port, key)
        }
    }
}

fn learn(path: &Path, host: &str, port: u16, key: &PublicKey) -> HostKeyVerdict {
    if let Some(parent) = path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!("Could not create {}: {}", parent.display(), e);
    }

    match keys::known_hosts::learn_known_hosts_path(host, port, key, path) {
        Ok(()) => {
            info!("Recorded new host key for {}:{} in {}", host, port, path.display());
            HostKeyVerdict::Learned
        }
        Err(e) => {
            // The key is still accepted for this session, it just will not be remembered.
            warn!("Could not record host key for {}:{}: {}", host, port, e);
            HostKeyVerdict::Learned
        }
    }
}
