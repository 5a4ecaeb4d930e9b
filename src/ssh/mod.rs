//! Interactive SSH sessions.
//!
//! This module is organized into the following submodules:
//!
//! - `profile`: What the session needs to know about a host
//! - `auth`: Authentication strategies and the credential resolver
//! - `prompt`: Reading answers from the user during negotiation
//! - `host_keys`: Server key trust policy
//! - `client`: russh configuration and the connection negotiator
//! - `transport`: Transport and shell channel traits with their russh implementations
//! - `terminal`: Local terminal control (size, raw mode)
//! - `script`: Login script injection
//! - `io`: Forwarding, resize and keepalive loops
//! - `session`: The session state machine
//! - `config`: Settings resolution with environment variable support
//! - `error`: Error taxonomy and status strings

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub(crate) mod handler;
pub mod host_keys;
pub mod io;
pub mod profile;
pub mod prompt;
pub mod script;
pub mod session;
pub mod terminal;
pub mod transport;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

pub use config::SessionSettings;
pub use error::{STATUS_CONNECTED, SessionError};
pub use profile::{ConnectionProfile, ScriptStep};
pub use session::{SessionEnd, SessionOrchestrator, SessionReport};

use auth::resolve_auth_methods;
use client::{Connector, RusshConnector, negotiate};
use prompt::Prompter;
use terminal::LocalTerminal;

/// Resolve credentials, negotiate, and run an interactive shell on the
/// process' standard streams.
pub async fn open_interactive_session(
    profile: &ConnectionProfile,
    settings: SessionSettings,
    prompter: Arc<dyn Prompter>,
    terminal: Arc<dyn LocalTerminal>,
    shutdown: CancellationToken,
) -> Result<SessionReport, SessionError> {
    let methods = resolve_auth_methods(profile, prompter.clone())?;
    let connector = RusshConnector::new(settings.clone());

    let transport =
        negotiate_until_shutdown(&connector, profile, methods, prompter.as_ref(), &shutdown)
            .await?;

    let mut session = SessionOrchestrator::new(Arc::new(transport), terminal, settings);
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();

    let report = session
        .run(
            tokio::io::stdin(),
            &mut stdout,
            &mut stderr,
            &profile.script,
            shutdown,
        )
        .await?;

    info!(
        "Session with {} finished ({:?}, exit status {:?})",
        profile.destination(),
        report.end,
        report.exit_status
    );
    Ok(report)
}

/// [`negotiate`], abandoned as soon as `shutdown` fires, even mid-prompt.
async fn negotiate_until_shutdown<C: Connector>(
    connector: &C,
    profile: &ConnectionProfile,
    methods: auth::AuthChain,
    prompter: &dyn Prompter,
    shutdown: &CancellationToken,
) -> Result<C::Transport, SessionError> {
    tokio::select! {
        result = negotiate(connector, profile, methods, prompter) => result,
        _ = shutdown.cancelled() => {
            Err(SessionError::Connect("negotiation interrupted".to_string()))
        }
    }
}
