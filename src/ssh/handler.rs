//! russh client handler.
//!
//! The handler is consulted by russh during the key exchange. Its only job here
//! is to apply the configured [`HostKeyPolicy`] to the server's public key.

use std::sync::{Arc, Mutex};

use russh::{client, keys};
use tracing::{debug, warn};

use super::host_keys::{HostKeyPolicy, HostKeyVerdict};

/// Why the last server key was refused, readable after russh drops the handler.
#[derive(Debug, Clone, Default)]
pub struct HostKeyRejection(Arc<Mutex<Option<String>>>);

impl HostKeyRejection {
    pub(crate) fn record(&self, reason: String) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(reason);
        }
    }

    pub fn take(&self) -> Option<String> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Client handler that checks server keys against a [`HostKeyPolicy`].
pub struct SshClientHandler {
    policy: HostKeyPolicy,
    host: String,
    port: u16,
    rejection: HostKeyRejection,
}

impl SshClientHandler {
    pub fn new(policy: HostKeyPolicy, host: impl Into<String>, port: u16) -> Self {
        Self {
            policy,
            host: host.into(),
            port,
            rejection: HostKeyRejection::default(),
        }
    }

    /// Shared view of the rejection reason, if the server key gets refused.
    pub fn rejection(&self) -> HostKeyRejection {
        self.rejection.clone()
    }
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.policy.verify(&self.host, self.port, server_public_key) {
            HostKeyVerdict::Trusted => {
                debug!("Server key for {}:{} trusted", self.host, self.port);
                Ok(true)
            }
            HostKeyVerdict::Learned => Ok(true),
            HostKeyVerdict::Rejected(reason) => {
                warn!("Rejecting server key: {}", reason);
                self.rejection.record(reason);
                Ok(false)
            }
        }
    }
}
