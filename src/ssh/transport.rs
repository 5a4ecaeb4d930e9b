//! Transport and shell channel abstractions.
//!
//! The orchestrator talks to the remote side only through these traits:
//!
//! - [`Transport`]: the authenticated connection (open channel, keepalive, close)
//! - [`ShellChannel`]: a session channel before the shell starts (PTY, shell, split)
//! - [`ShellWriter`]: cloneable write handle shared by the injector and the loops
//! - [`ShellReader`]: stream of remote output and termination events
//!
//! The russh-backed implementations live here too. Tests drive the
//! orchestrator with in-memory fakes instead.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{ChannelMsg, ChannelReadHalf, ChannelWriteHalf, Disconnect, Pty, client};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::SessionError;
use super::handler::SshClientHandler;
use super::terminal::TermSize;

/// Something that happened on the remote shell channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    ExitStatus(u32),
    Eof,
    Closed,
}

/// An authenticated connection to the remote host.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Channel: ShellChannel;

    /// Open a new session channel.
    async fn open_channel(&self) -> Result<Self::Channel, SessionError>;

    /// Send a liveness probe that expects no reply.
    async fn keepalive(&self) -> Result<(), String>;

    /// Close the connection. Best-effort and safe to call more than once.
    async fn close(&self);
}

/// A session channel that has not started its shell yet.
#[async_trait]
pub trait ShellChannel: Send + 'static {
    type Reader: ShellReader;
    type Writer: ShellWriter;

    /// Request a remote pseudo-terminal.
    async fn request_pty(
        &mut self,
        term: &str,
        size: TermSize,
        baud_rate: u32,
    ) -> Result<(), SessionError>;

    /// Start the user's login shell.
    async fn request_shell(&mut self) -> Result<(), SessionError>;

    /// Close the channel without starting anything on it.
    async fn close(&mut self);

    /// Separate the output stream from the input handle.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Write side of a running shell.
#[async_trait]
pub trait ShellWriter: Clone + Send + Sync + 'static {
    /// Write bytes to the remote shell's standard input.
    async fn write(&self, data: &[u8]) -> Result<(), String>;

    /// Tell the remote PTY the window changed size.
    async fn window_change(&self, size: TermSize) -> Result<(), String>;

    /// Close the channel.
    async fn close(&self) -> Result<(), String>;
}

/// Read side of a running shell.
#[async_trait]
pub trait ShellReader: Send + 'static {
    /// Next event, or `None` once the channel is gone.
    async fn next_event(&mut self) -> Option<ShellEvent>;
}

/// [`Transport`] over a russh client handle.
pub struct RusshTransport {
    handle: client::Handle<SshClientHandler>,
}

impl RusshTransport {
    pub fn new(handle: client::Handle<SshClientHandler>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Transport for RusshTransport {
    type Channel = RusshChannel;

    async fn open_channel(&self) -> Result<RusshChannel, SessionError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Setup(format!("Failed to open channel: {}", e)))?;

        Ok(RusshChannel {
            channel,
            pending: VecDeque::new(),
        })
    }

    async fn keepalive(&self) -> Result<(), String> {
        self.handle
            .send_keepalive(false)
            .await
            .map_err(|e| format!("Failed to send keepalive: {}", e))
    }

    async fn close(&self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!("Disconnect failed (connection already gone?): {}", e);
        }
    }
}

/// [`ShellChannel`] over a russh session channel.
pub struct RusshChannel {
    channel: russh::Channel<client::Msg>,
    // Messages that arrived while waiting for a request reply, replayed by the reader.
    pending: VecDeque<ChannelMsg>,
}

impl RusshChannel {
    async fn await_reply(&mut self, request: &str) -> Result<(), SessionError> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => {
                    return Err(SessionError::Setup(format!(
                        "{} request refused by server",
                        request
                    )));
                }
                Some(other) => self.pending.push_back(other),
                None => {
                    return Err(SessionError::Setup(format!(
                        "Channel closed while waiting for {} reply",
                        request
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl ShellChannel for RusshChannel {
    type Reader = RusshReader;
    type Writer = RusshWriter;

    async fn request_pty(
        &mut self,
        term: &str,
        size: TermSize,
        baud_rate: u32,
    ) -> Result<(), SessionError> {
        let modes = [
            (Pty::ECHO, 1),
            (Pty::TTY_OP_ISPEED, baud_rate),
            (Pty::TTY_OP_OSPEED, baud_rate),
        ];

        self.channel
            .request_pty(
                true,
                term,
                u32::from(size.cols),
                u32::from(size.rows),
                0,
                0,
                &modes,
            )
            .await
            .map_err(|e| SessionError::Setup(format!("Failed to request PTY: {}", e)))?;

        self.await_reply("PTY").await
    }

    async fn request_shell(&mut self) -> Result<(), SessionError> {
        self.channel
            .request_shell(true)
            .await
            .map_err(|e| SessionError::Setup(format!("Failed to start shell: {}", e)))?;

        self.await_reply("shell").await
    }

    async fn close(&mut self) {
        if let Err(e) = self.channel.close().await {
            debug!("Channel close failed: {}", e);
        }
    }

    fn split(self) -> (RusshReader, RusshWriter) {
        let (read_half, write_half) = self.channel.split();
        (
            RusshReader {
                pending: self.pending,
                read_half,
            },
            RusshWriter {
                write_half: Arc::new(Mutex::new(write_half)),
            },
        )
    }
}

/// Output side of a running russh shell.
pub struct RusshReader {
    pending: VecDeque<ChannelMsg>,
    read_half: ChannelReadHalf,
}

#[async_trait]
impl ShellReader for RusshReader {
    async fn next_event(&mut self) -> Option<ShellEvent> {
        loop {
            let msg = match self.pending.pop_front() {
                Some(msg) => msg,
                None => self.read_half.wait().await?,
            };

            match msg {
                ChannelMsg::Data { data } => return Some(ShellEvent::Stdout(data.to_vec())),
                // ext == 1 is stderr in SSH protocol
                ChannelMsg::ExtendedData { data, ext: 1 } => {
                    return Some(ShellEvent::Stderr(data.to_vec()));
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    return Some(ShellEvent::ExitStatus(exit_status));
                }
                ChannelMsg::Eof => return Some(ShellEvent::Eof),
                ChannelMsg::Close => return Some(ShellEvent::Closed),
                _ => {
                    // Ignore other message types
                }
            }
        }
    }
}

/// Input side of a running russh shell.
///
/// Wraps `russh::ChannelWriteHalf` so the injector and every loop can hold
/// a clone of the same handle.
#[derive(Clone)]
pub struct RusshWriter {
    write_half: Arc<Mutex<ChannelWriteHalf<client::Msg>>>,
}

#[async_trait]
impl ShellWriter for RusshWriter {
    async fn write(&self, data: &[u8]) -> Result<(), String> {
        self.write_half
            .lock()
            .await
            .data(data)
            .await
            .map_err(|e| format!("Failed to write to shell: {}", e))
    }

    async fn window_change(&self, size: TermSize) -> Result<(), String> {
        self.write_half
            .lock()
            .await
            .window_change(u32::from(size.cols), u32::from(size.rows), 0, 0)
            .await
            .map_err(|e| format!("Failed to send window change: {}", e))
    }

    async fn close(&self) -> Result<(), String> {
        self.write_half
            .lock()
            .await
            .close()
            .await
            .map_err(|e| format!("Failed to close shell channel: {}", e))
    }
}
