//! Interactive session lifecycle.
//!
//! A session moves through a fixed sequence of states and never goes back:
//!
//! ```text
//! Idle -> Connected -> ShellAllocated -> Interactive -> Closed
//! ```
//!
//! A failure during setup jumps straight to `Closed`, releasing only what was
//! acquired so far. Whatever the exit path, the local terminal is out of raw
//! mode and the transport is closed once [`SessionOrchestrator::run`] returns.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::SessionSettings;
use super::error::SessionError;
use super::io::{forward_input, keepalive_loop, pump_output, watch_resize};
use super::profile::ScriptStep;
use super::script::inject_script;
use super::terminal::{CLEAR_SCREEN, LocalTerminal, RawModeGuard, TermSize};
use super::transport::{ShellChannel, ShellWriter, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    ShellAllocated,
    Interactive,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connected => "connected",
            SessionState::ShellAllocated => "shell-allocated",
            SessionState::Interactive => "interactive",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why the interactive state ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The remote shell closed its channel.
    RemoteExit,
    /// Local input was exhausted.
    InputClosed,
    /// The process was asked to terminate.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub end: SessionEnd,
    /// Exit status of the remote shell, when the server reported one.
    pub exit_status: Option<u32>,
}

/// Drives one interactive shell over an authenticated transport.
pub struct SessionOrchestrator<T: Transport> {
    transport: Arc<T>,
    terminal: Arc<dyn LocalTerminal>,
    settings: SessionSettings,
    state: SessionState,
}

impl<T: Transport> SessionOrchestrator<T> {
    /// Take ownership of a transport that negotiation just produced.
    pub fn new(
        transport: Arc<T>,
        terminal: Arc<dyn LocalTerminal>,
        settings: SessionSettings,
    ) -> Self {
        let mut orchestrator = Self {
            transport,
            terminal,
            settings,
            state: SessionState::Idle,
        };
        orchestrator.transition(SessionState::Connected);
        orchestrator
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run the session until the remote shell ends, input runs out, or
    /// `shutdown` fires.
    ///
    /// `input` is forwarded to the remote shell; remote stdout and stderr are
    /// written to `output` and `errors`. The login `script` is sent before any
    /// input is forwarded.
    pub async fn run<I, O, E>(
        &mut self,
        input: I,
        output: &mut O,
        errors: &mut E,
        script: &[ScriptStep],
        shutdown: CancellationToken,
    ) -> Result<SessionReport, SessionError>
    where
        I: AsyncRead + Unpin + Send + 'static,
        O: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        if self.state != SessionState::Connected {
            return Err(SessionError::Setup(format!(
                "session cannot start from state {}",
                self.state
            )));
        }

        let (channel, size, guard) = match self.allocate().await {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Session setup failed: {}", e);
                self.transport.close().await;
                self.transition(SessionState::Closed);
                return Err(e);
            }
        };
        self.transition(SessionState::ShellAllocated);

        write_best_effort(output, CLEAR_SCREEN).await;

        let (mut reader, writer) = channel.split();
        let cancel = shutdown.child_token();

        // Remote output is shown from here on, login script included.
        let report = {
            let pump = pump_output(&mut reader, &mut *output, &mut *errors);
            tokio::pin!(pump);

            let ended_during_script = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Some((SessionEnd::Shutdown, None)),
                status = &mut pump => Some((SessionEnd::RemoteExit, status)),
                _ = inject_script(&writer, script) => None,
            };

            let (end, exit_status) = match ended_during_script {
                Some(ended) => ended,
                None => {
                    self.transition(SessionState::Interactive);

                    let mut forward =
                        tokio::spawn(forward_input(input, writer.clone(), cancel.clone()));
                    tokio::spawn(watch_resize(
                        self.terminal.clone(),
                        writer.clone(),
                        size,
                        self.settings.resize_interval,
                        cancel.clone(),
                    ));
                    tokio::spawn(keepalive_loop(
                        self.transport.clone(),
                        self.settings.keepalive_interval,
                        cancel.clone(),
                    ));

                    tokio::select! {
                        biased;
                        status = &mut pump => (SessionEnd::RemoteExit, status),
                        _ = &mut forward => (SessionEnd::InputClosed, None),
                        _ = shutdown.cancelled() => (SessionEnd::Shutdown, None),
                    }
                }
            };
            SessionReport { end, exit_status }
        };

        info!("Interactive session ended: {:?}", report.end);

        cancel.cancel();
        write_best_effort(output, CLEAR_SCREEN).await;
        drop(guard);
        if let Err(e) = writer.close().await {
            debug!("Channel already closed: {}", e);
        }
        self.transport.close().await;
        self.transition(SessionState::Closed);

        Ok(report)
    }

    /// Open the channel and prepare both terminals.
    ///
    /// On failure everything acquired here is released again: raw mode is
    /// left first, then the channel is closed.
    async fn allocate(&self) -> Result<(T::Channel, TermSize, RawModeGuard), SessionError> {
        let mut channel = self.transport.open_channel().await?;

        let acquired: Result<(TermSize, RawModeGuard), SessionError> = async {
            let size = self.terminal.size().map_err(|e| {
                SessionError::Setup(format!("Failed to query terminal size: {}", e))
            })?;
            let guard = RawModeGuard::enter(self.terminal.clone())
                .map_err(|e| SessionError::Setup(format!("Failed to enter raw mode: {}", e)))?;

            channel
                .request_pty(&self.settings.term, size, self.settings.baud_rate)
                .await?;
            channel.request_shell().await?;

            Ok((size, guard))
        }
        .await;

        match acquired {
            Ok((size, guard)) => {
                debug!("Shell started with a {} {} PTY", size, self.settings.term);
                Ok((channel, size, guard))
            }
            Err(e) => {
                channel.close().await;
                Err(e)
            }
        }
    }
}

async fn write_best_effort<W: AsyncWrite + Unpin>(sink: &mut W, data: &[u8]) {
    let result = async {
        sink.write_all(data).await?;
        sink.flush().await
    }
    .await;

    if let Err(e) = result {
        debug!("Local output not writable: {}", e);
    }
}
