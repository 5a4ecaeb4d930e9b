//! Session tunables.
//!
//! A value passed in by the caller (usually a CLI flag) wins over the
//! environment, which wins over the built-in default.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `TTM_CONNECT_TIMEOUT` | 10s | Negotiation timeout in seconds |
//! | `TTM_KEEPALIVE_INTERVAL` | 10s | Keepalive probe period in seconds |
//! | `TTM_RESIZE_INTERVAL_MS` | 1000ms | Terminal size poll period in milliseconds |
//! | `TTM_TERM` | xterm | Remote PTY terminal type |
//! | `TTM_HOST_KEY_POLICY` | known-hosts | `known-hosts` or `accept-any` |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use super::host_keys::HostKeyPolicy;

/// Default negotiation timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default keepalive probe interval in seconds
pub(crate) const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 10;

/// Default terminal size poll interval in milliseconds
pub(crate) const DEFAULT_RESIZE_INTERVAL_MS: u64 = 1000;

/// Default remote terminal type
pub(crate) const DEFAULT_TERM: &str = "xterm";

/// Input and output baud-rate hint sent with the PTY request
pub(crate) const PTY_BAUD_RATE: u32 = 14400;

/// Environment variable name for the negotiation timeout
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "TTM_CONNECT_TIMEOUT";

/// Environment variable name for the keepalive interval
pub(crate) const KEEPALIVE_INTERVAL_ENV_VAR: &str = "TTM_KEEPALIVE_INTERVAL";

/// Environment variable name for the resize poll interval
pub(crate) const RESIZE_INTERVAL_MS_ENV_VAR: &str = "TTM_RESIZE_INTERVAL_MS";

/// Environment variable name for the remote terminal type
pub(crate) const TERM_ENV_VAR: &str = "TTM_TERM";

/// Environment variable name for the host key policy
pub(crate) const HOST_KEY_POLICY_ENV_VAR: &str = "TTM_HOST_KEY_POLICY";

/// Settings shared by the negotiator and the orchestrator for one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub connect_timeout: Duration,
    pub keepalive_interval: Duration,
    pub resize_interval: Duration,
    pub term: String,
    pub baud_rate: u32,
    pub host_keys: HostKeyPolicy,
}

// Used by tests and embedders that verify host keys elsewhere; `resolve` picks known-hosts.
impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            keepalive_interval: Duration::from_secs(DEFAULT_KEEPALIVE_INTERVAL_SECS),
            resize_interval: Duration::from_millis(DEFAULT_RESIZE_INTERVAL_MS),
            term: DEFAULT_TERM.to_string(),
            baud_rate: PTY_BAUD_RATE,
            host_keys: HostKeyPolicy::AcceptAny,
        }
    }
}

impl SessionSettings {
    /// Resolve all settings from optional overrides, the environment and defaults.
    ///
    /// `known_hosts` is the file used when the policy resolves to `known-hosts`.
    pub fn resolve(
        connect_timeout: Option<u64>,
        accept_any_host_key: bool,
        known_hosts: PathBuf,
    ) -> Self {
        let host_keys = if accept_any_host_key {
            HostKeyPolicy::AcceptAny
        } else {
            resolve_host_key_policy(known_hosts)
        };

        Self {
            connect_timeout: Duration::from_secs(resolve_connect_timeout(connect_timeout)),
            keepalive_interval: Duration::from_secs(resolve_keepalive_interval(None)),
            resize_interval: Duration::from_millis(resolve_resize_interval_ms(None)),
            term: resolve_term(None),
            baud_rate: PTY_BAUD_RATE,
            host_keys,
        }
    }
}

/// Resolve the negotiation timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_connect_timeout(secs: Option<u64>) -> u64 {
    resolve_u64(secs, CONNECT_TIMEOUT_ENV_VAR, DEFAULT_CONNECT_TIMEOUT_SECS)
}

/// Resolve the keepalive interval with priority: parameter -> env var -> default
pub(crate) fn resolve_keepalive_interval(interval_param: Option<u64>) -> u64 {
    resolve_u64(
        interval_param,
        KEEPALIVE_INTERVAL_ENV_VAR,
        DEFAULT_KEEPALIVE_INTERVAL_SECS,
    )
}

/// Resolve the resize poll interval with priority: parameter -> env var -> default
pub(crate) fn resolve_resize_interval_ms(interval_param: Option<u64>) -> u64 {
    resolve_u64(
        interval_param,
        RESIZE_INTERVAL_MS_ENV_VAR,
        DEFAULT_RESIZE_INTERVAL_MS,
    )
}

/// Resolve the remote terminal type with priority: parameter -> env var -> default
pub(crate) fn resolve_term(term_param: Option<String>) -> String {
    if let Some(term) = term_param {
        return term;
    }

    if let Ok(term) = env::var(TERM_ENV_VAR)
        && !term.trim().is_empty()
    {
        return term.trim().to_string();
    }

    DEFAULT_TERM.to_string()
}

/// Resolve the host key policy: env var -> default (known-hosts)
pub(crate) fn resolve_host_key_policy(known_hosts: PathBuf) -> HostKeyPolicy {
    match env::var(HOST_KEY_POLICY_ENV_VAR) {
        Ok(value) if value.eq_ignore_ascii_case("accept-any") => HostKeyPolicy::AcceptAny,
        _ => HostKeyPolicy::KnownHosts(known_hosts),
    }
}

// Zero intervals would turn the loops into busy spins, so they fall back to the default.
fn resolve_u64(param: Option<u64>, env_var: &str, default: u64) -> u64 {
    param
        .filter(|v| *v > 0)
        .or_else(|| {
            env::var(env_var)
                .ok()
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
        })
        .unwrap_or(default)
}
