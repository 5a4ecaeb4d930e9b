//! Password authentication.

use async_trait::async_trait;
use russh::client;

use crate::ssh::error::SessionError;
use crate::ssh::handler::SshClientHandler;

use super::traits::{AuthOutcome, AuthStrategy, transport_failure};

/// Strategy name reported by [`PasswordAuth`].
pub const PASSWORD_METHOD: &str = "password";

/// Sends a fixed password, taken from the profile or typed at the fallback prompt.
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for PasswordAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordAuth(<hidden>)")
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    fn name(&self) -> &'static str {
        PASSWORD_METHOD
    }

    async fn attempt(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<AuthOutcome, SessionError> {
        handle
            .authenticate_password(username, &self.password)
            .await
            .map(|result| AuthOutcome::from_success(result.success()))
            .map_err(|e| transport_failure(PASSWORD_METHOD, e))
    }
}
