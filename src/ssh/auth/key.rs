//! Private key SSH authentication.

use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::ssh::error::SessionError;
use crate::ssh::handler::SshClientHandler;

use super::traits::{AuthOutcome, AuthStrategy, transport_failure};

/// Strategy name reported by [`KeyAuth`].
pub const KEY_METHOD: &str = "key";

/// Public key authentication with an already decoded private key.
///
/// The key is decoded once, when the authentication chain is built, so that a
/// bad key or passphrase is reported before any connection is attempted.
pub struct KeyAuth {
    key: Arc<keys::PrivateKey>,
}

impl KeyAuth {
    /// Decode `material` (OpenSSH or PEM text), using `passphrase` if the key is encrypted.
    pub fn from_material(material: &str, passphrase: Option<&str>) -> Result<Self, SessionError> {
        let key = keys::decode_secret_key(material, passphrase)
            .map_err(|e| SessionError::KeyParse(e.to_string()))?;
        Ok(Self { key: Arc::new(key) })
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    fn name(&self) -> &'static str {
        KEY_METHOD
    }

    async fn attempt(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<AuthOutcome, SessionError> {
        // None unless the key is RSA and the server advertised rsa-sha2.
        let rsa_hash = match handle.best_supported_rsa_hash().await {
            Ok(Some(hash)) => hash,
            _ => None,
        };
        debug!("Public key attempt with RSA hash {:?}", rsa_hash);

        let signed = keys::PrivateKeyWithHashAlg::new(Arc::clone(&self.key), rsa_hash);
        let result = handle
            .authenticate_publickey(username, signed)
            .await
            .map_err(|e| transport_failure(KEY_METHOD, e))?;

        Ok(AuthOutcome::from_success(result.success()))
    }
}
