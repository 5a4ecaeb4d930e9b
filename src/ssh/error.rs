//! Error taxonomy for interactive sessions.
//!
//! Errors fall into the stages where they can occur:
//!
//! 1. **Key parsing** - malformed private key or wrong passphrase. Raised before
//!    any network I/O, so no connection is attempted.
//! 2. **Negotiation** - transport failure, timeout, host key rejection, or every
//!    configured authentication method being refused. The last one is the only
//!    error the negotiator may answer with a single password-prompt retry.
//! 3. **Setup** - failure allocating the remote PTY, starting the shell, or
//!    entering raw mode on the local terminal.
//!
//! Runtime failures of the resize and keepalive loops are not errors at this
//! level: the loop logs and stops while the session carries on.
//!
//! All fatal errors are turned into a short status string with
//! [`SessionError::status`] for display once the terminal has been restored.

use std::time::Duration;

use thiserror::Error;

/// Status shown after a session ended normally.
pub const STATUS_CONNECTED: &str = "connected";

#[derive(Debug, Error)]
pub enum SessionError {
    /// Private key material could not be decoded (bad key or bad passphrase).
    #[error("invalid private key: {0}")]
    KeyParse(String),

    /// The TCP connection or SSH handshake failed.
    #[error("{0}")]
    Connect(String),

    /// The SSH handshake did not finish within the negotiation timeout.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// No configured authentication method was accepted.
    ///
    /// Only genuine refusals end up here. A method that could not be carried
    /// out (prompt cancelled, transport dropped) surfaces its own error.
    #[error("unable to authenticate, attempted methods [{}], no supported methods remain", .attempted.join(" "))]
    AuthExhausted { attempted: Vec<&'static str> },

    /// Reading an answer from the user failed.
    #[error("failed to read user input: {0}")]
    Prompt(#[from] std::io::Error),

    /// PTY allocation, shell start, or local raw mode failed.
    #[error("{0}")]
    Setup(String),
}

impl SessionError {
    /// Whether every authentication method was refused.
    pub fn is_auth_exhausted(&self) -> bool {
        matches!(self, SessionError::AuthExhausted { .. })
    }

    /// Caller-facing status line.
    ///
    /// Key problems are reported as connection failures because they stop the
    /// session before anything is dialled; everything later is a login failure.
    pub fn status(&self) -> String {
        match self {
            SessionError::KeyParse(_) => format!("connection failed: {}", self),
            _ => format!("login failed: {}", self),
        }
    }
}
