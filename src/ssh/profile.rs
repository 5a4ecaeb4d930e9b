//! Connection profile consumed by a single interactive session.

use std::time::Duration;

/// Default SSH port used when a profile does not specify one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A command typed into the remote shell right after it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    /// Command text, sent without its trailing carriage return
    pub command: String,
    /// Pause before the command is written
    pub delay: Duration,
}

impl ScriptStep {
    pub fn new(command: impl Into<String>, delay: Duration) -> Self {
        Self {
            command: command.into(),
            delay,
        }
    }
}

/// Everything needed to reach and log into one remote host.
///
/// Secret fields are kept as the caller supplied them. Empty strings are
/// treated the same as absent values by the credential resolver.
#[derive(Clone, Default)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Raw private key text (OpenSSH or PEM)
    pub private_key: Option<String>,
    pub passphrase: Option<String>,
    pub password: Option<String>,
    pub script: Vec<ScriptStep>,
}

impl ConnectionProfile {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(key.into());
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_script_step(mut self, command: impl Into<String>, delay: Duration) -> Self {
        self.script.push(ScriptStep::new(command, delay));
        self
    }

    /// Key material, if any non-empty text was configured.
    pub fn key_material(&self) -> Option<&str> {
        non_empty(self.private_key.as_deref())
    }

    pub fn key_passphrase(&self) -> Option<&str> {
        non_empty(self.passphrase.as_deref())
    }

    pub fn plain_password(&self) -> Option<&str> {
        non_empty(self.password.as_deref())
    }

    /// `user@host:port`, for logs and prompts.
    pub fn destination(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

// Secrets must never end up in logs, so Debug only shows which ones are set.
impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("private_key", &self.key_material().map(|_| "<set>"))
            .field("passphrase", &self.key_passphrase().map(|_| "<set>"))
            .field("password", &self.plain_password().map(|_| "<set>"))
            .field("script", &self.script)
            .finish()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
