//! Connection negotiation.
//!
//! [`negotiate`] opens an authenticated transport for a profile. When every
//! method of the first attempt is refused and no password was among them, the
//! user is asked for one and the connection is retried exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client;
use tracing::{error, info, warn};

use super::auth::AuthChain;
use super::config::SessionSettings;
use super::error::SessionError;
use super::handler::{HostKeyRejection, SshClientHandler};
use super::profile::ConnectionProfile;
use super::prompt::Prompter;
use super::transport::{RusshTransport, Transport};

/// Build the russh client configuration for interactive sessions.
///
/// The cipher list favours compatibility with older servers over strength.
/// There is no inactivity timeout and russh's own keepalive is off: an
/// interactive shell may sit idle for hours, and liveness is the job of the
/// session's keepalive loop.
pub(crate) fn build_client_config() -> Arc<client::Config> {
    let preferred = russh::Preferred {
        cipher: (&[
            russh::cipher::AES_128_CTR,
            russh::cipher::AES_192_CTR,
            russh::cipher::AES_256_CTR,
            russh::cipher::AES_256_GCM,
            russh::cipher::CHACHA20_POLY1305,
            russh::cipher::AES_128_CBC,
            russh::cipher::AES_192_CBC,
            russh::cipher::AES_256_CBC,
        ][..])
            .into(),
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: None,
        preferred,
        ..Default::default()
    })
}

/// Opens authenticated transports.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// One connection attempt using exactly `methods`.
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        methods: &AuthChain,
    ) -> Result<Self::Transport, SessionError>;
}

/// [`Connector`] backed by russh.
pub struct RusshConnector {
    settings: SessionSettings,
}

impl RusshConnector {
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for RusshConnector {
    type Transport = RusshTransport;

    async fn connect(
        &self,
        profile: &ConnectionProfile,
        methods: &AuthChain,
    ) -> Result<RusshTransport, SessionError> {
        let config = build_client_config();
        let handler = SshClientHandler::new(
            self.settings.host_keys.clone(),
            profile.host.clone(),
            profile.port,
        );
        let rejection = handler.rejection();
        let timeout = self.settings.connect_timeout;

        info!("Connecting to {}", profile.destination());

        let mut handle = tokio::time::timeout(
            timeout,
            client::connect(config, (profile.host.as_str(), profile.port), handler),
        )
        .await
        .map_err(|_| SessionError::Timeout(timeout))?
        .map_err(|e| connect_failure(profile, &e, &rejection))?;

        methods.run(&mut handle, &profile.username).await?;

        info!("Authenticated to {}", profile.destination());
        Ok(RusshTransport::new(handle))
    }
}

/// Describe a failed dial, naming the host key mismatch when that was the cause.
fn connect_failure(
    profile: &ConnectionProfile,
    err: &dyn std::fmt::Display,
    rejection: &HostKeyRejection,
) -> SessionError {
    match rejection.take() {
        Some(reason) => SessionError::Connect(format!(
            "Failed to connect to {}:{}: {}",
            profile.host, profile.port, reason
        )),
        None => SessionError::Connect(format!(
            "Failed to connect to {}:{}: {}",
            profile.host, profile.port, err
        )),
    }
}

/// Connect and authenticate, with at most one password-prompt retry.
///
/// The retry happens only when the first attempt failed because every method
/// was refused *and* no password was part of the attempt. Any other error,
/// and any error of the retry, is returned as is.
pub async fn negotiate<C: Connector>(
    connector: &C,
    profile: &ConnectionProfile,
    methods: AuthChain,
    prompter: &dyn Prompter,
) -> Result<C::Transport, SessionError> {
    let err = match connector.connect(profile, &methods).await {
        Ok(transport) => return Ok(transport),
        Err(e) => e,
    };

    if !err.is_auth_exhausted() || methods.has_password() {
        error!("Negotiation with {} failed: {}", profile.destination(), err);
        return Err(err);
    }

    warn!(
        "No method accepted by {}, asking for a password: {}",
        profile.destination(),
        err
    );

    let password = prompter
        .read_secret(&format!("{}@{}'s password:", profile.username, profile.host))
        .await?;

    // An empty answer still gets its retry, with the same methods.
    let methods = if password.is_empty() {
        methods
    } else {
        methods.with_password(password)
    };

    connector.connect(profile, &methods).await.inspect_err(|e| {
        error!(
            "Negotiation with {} failed after password retry: {}",
            profile.destination(),
            e
        );
    })
}
