//! Ordered authentication attempts for one login.

use std::sync::Arc;

use russh::client;
use tracing::debug;

use crate::ssh::error::SessionError;
use crate::ssh::handler::SshClientHandler;
use crate::ssh::prompt::Prompter;

use super::password::PASSWORD_METHOD;
use super::traits::{AuthOutcome, AuthStrategy};
use super::{InteractiveAuth, KeyAuth, PasswordAuth};

/// The methods one login will try, first to last.
///
/// The first method the server accepts ends the login.
pub struct AuthChain {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self { strategies: vec![] }
    }

    /// Add a decoded private key to the chain.
    pub fn with_key(mut self, key: KeyAuth) -> Self {
        self.strategies.push(Box::new(key));
        self
    }

    /// Append a password attempt.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.strategies.push(Box::new(PasswordAuth::new(password)));
        self
    }

    /// Add keyboard-interactive authentication to the chain.
    pub fn with_interactive(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.strategies.push(Box::new(InteractiveAuth::new(prompter)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Strategy names in the order they will be tried.
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Whether a password strategy is part of the chain.
    pub fn has_password(&self) -> bool {
        self.strategies.iter().any(|s| s.name() == PASSWORD_METHOD)
    }

    /// Try each strategy in turn until one is accepted.
    ///
    /// When every strategy was refused the result is
    /// [`SessionError::AuthExhausted`]. A strategy that could not be carried
    /// out stops the chain and its error is returned unchanged.
    pub async fn run(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<(), SessionError> {
        for strategy in &self.strategies {
            let method = strategy.name();
            match strategy.attempt(handle, username).await {
                Ok(AuthOutcome::Accepted) => {
                    debug!("Authenticated {} via {}", username, method);
                    return Ok(());
                }
                Ok(AuthOutcome::Rejected) => {
                    debug!("Server rejected {} for {}", method, username);
                }
                Err(e) => {
                    debug!("{} could not complete: {}", method, e);
                    return Err(e);
                }
            }
        }

        Err(SessionError::AuthExhausted {
            attempted: self.names(),
        })
    }
}

impl Default for AuthChain {
    fn default() -> Self {
        Self::new()
    }
}
