//! The interface every authentication method implements.

use async_trait::async_trait;
use russh::client;

use crate::ssh::error::SessionError;
use crate::ssh::handler::SshClientHandler;

/// What the server made of one authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    Rejected,
}

impl AuthOutcome {
    pub(crate) fn from_success(success: bool) -> Self {
        if success {
            AuthOutcome::Accepted
        } else {
            AuthOutcome::Rejected
        }
    }

    pub fn is_accepted(self) -> bool {
        self == AuthOutcome::Accepted
    }
}

/// One way of proving the user's identity to the server.
///
/// A chain may be tried twice (see the password fallback in negotiation), so
/// strategies are attempted through `&self` and must be `Send + Sync`.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Method name as it appears in failure messages.
    fn name(&self) -> &'static str;

    /// Try this method once.
    ///
    /// A refusal is `Ok(AuthOutcome::Rejected)`. `Err` means the attempt
    /// could not be carried out at all: [`SessionError::Prompt`] when the user
    /// input could not be read, [`SessionError::Connect`] when the transport
    /// failed.
    async fn attempt(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<AuthOutcome, SessionError>;
}

/// Map a russh failure during an attempt to a transport error.
pub(crate) fn transport_failure(method: &str, err: russh::Error) -> SessionError {
    SessionError::Connect(format!("{} authentication failed: {}", method, err))
}
