//! Authentication strategies for SSH connections.
//!
//! This module provides a trait-based authentication system that follows
//! the Strategy pattern, and the credential resolver that turns a
//! [`ConnectionProfile`] into an ordered [`AuthChain`].
//!
//! # Available Strategies
//!
//! - [`KeyAuth`]: Private key material stored in the profile
//! - [`PasswordAuth`]: Password-based authentication
//! - [`InteractiveAuth`]: Keyboard-interactive challenges answered by the user
//!
//! # Resolution order
//!
//! 1. Key, when key material is present (decoded up front, with the passphrase if any)
//! 2. Password, when a password is present
//! 3. Keyboard-interactive, always, as the method of last resort

use std::sync::Arc;

use tracing::debug;

use super::error::SessionError;
use super::profile::ConnectionProfile;
use super::prompt::Prompter;

mod chain;
mod interactive;
mod key;
mod password;
mod traits;

pub use chain::AuthChain;
pub use interactive::{Challenge, INTERACTIVE_METHOD, InteractiveAuth};
pub use key::{KEY_METHOD, KeyAuth};
pub use password::{PASSWORD_METHOD, PasswordAuth};
pub use traits::{AuthOutcome, AuthStrategy};

/// Build the authentication chain for `profile`.
///
/// The result is never empty. A key that fails to decode is a fatal
/// [`SessionError::KeyParse`]; nothing is dialled in that case.
pub fn resolve_auth_methods(
    profile: &ConnectionProfile,
    prompter: Arc<dyn Prompter>,
) -> Result<AuthChain, SessionError> {
    let mut chain = AuthChain::new();

    if let Some(material) = profile.key_material() {
        chain = chain.with_key(KeyAuth::from_material(material, profile.key_passphrase())?);
    }

    if let Some(password) = profile.plain_password() {
        chain = chain.with_password(password);
    }

    chain = chain.with_interactive(prompter);

    debug!(
        "Resolved authentication methods for {}: {:?}",
        profile.destination(),
        chain.names()
    );

    Ok(chain)
}
