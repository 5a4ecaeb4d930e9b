//! I/O multiplexing between the local terminal and the remote shell.
//!
//! Three loops run while the session is interactive:
//!
//! - [`forward_input`]: local input to remote input, until input is exhausted
//! - [`watch_resize`]: polls the local size and reports changes to the remote PTY
//! - [`keepalive_loop`]: periodic no-reply liveness probe
//!
//! Each loop takes a [`CancellationToken`] owned by the session, so leaving
//! the interactive state stops them without waiting for their I/O to fail.
//! Remote output goes straight to the local streams through [`pump_output`].

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::terminal::{LocalTerminal, TermSize};
use super::transport::{ShellEvent, ShellReader, ShellWriter, Transport};

const INPUT_BUFFER_SIZE: usize = 1024;

/// Copy local input to the remote shell until input ends or an error occurs.
///
/// Returning is the signal that input is exhausted; the caller closes the
/// channel.
pub async fn forward_input<R, W>(mut input: R, writer: W, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
    W: ShellWriter,
{
    let mut buf = [0u8; INPUT_BUFFER_SIZE];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Input forwarding cancelled");
                return;
            }
            read = input.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!("Local input exhausted");
                return;
            }
            Ok(n) => {
                if let Err(e) = writer.write(&buf[..n]).await {
                    debug!("Input forwarding stopped: {}", e);
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to read local input: {}", e);
                return;
            }
        }
    }
}

/// Report local terminal size changes to the remote PTY.
///
/// Polls every `interval`; a notification is sent only when the size differs
/// from the last one reported. A failed size query means the terminal is gone
/// and ends the loop.
pub async fn watch_resize<W: ShellWriter>(
    terminal: Arc<dyn LocalTerminal>,
    writer: W,
    initial: TermSize,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut last = initial;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }

        let size = match terminal.size() {
            Ok(size) => size,
            Err(e) => {
                debug!("Terminal size unavailable, stopping resize watch: {}", e);
                return;
            }
        };

        if size == last {
            continue;
        }

        debug!("Terminal resized from {} to {}", last, size);
        if let Err(e) = writer.window_change(size).await {
            warn!("Resize watch stopped: {}", e);
            return;
        }
        last = size;
    }
}

/// Send a liveness probe every `interval` until cancelled or a send fails.
pub async fn keepalive_loop<T: Transport>(
    transport: Arc<T>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }

        if let Err(e) = transport.keepalive().await {
            warn!("Keepalive stopped: {}", e);
            return;
        }
    }
}

/// Write remote output to the local streams until the channel closes.
///
/// Returns the remote exit status, if the server sent one.
pub async fn pump_output<R, O, E>(reader: &mut R, out: &mut O, err: &mut E) -> Option<u32>
where
    R: ShellReader,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut exit_status = None;

    while let Some(event) = reader.next_event().await {
        match event {
            ShellEvent::Stdout(data) => write_through(out, &data).await,
            ShellEvent::Stderr(data) => write_through(err, &data).await,
            ShellEvent::ExitStatus(code) => {
                debug!("Remote shell exited with status {}", code);
                exit_status = Some(code);
            }
            ShellEvent::Eof => debug!("Remote shell sent EOF"),
            ShellEvent::Closed => break,
        }
    }

    exit_status
}

async fn write_through<W: AsyncWrite + Unpin>(sink: &mut W, data: &[u8]) {
    let result = async {
        sink.write_all(data).await?;
        sink.flush().await
    }
    .await;

    if let Err(e) = result {
        debug!("Dropping remote output, local sink failed: {}", e);
    }
}
