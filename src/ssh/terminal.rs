//! Local terminal control.
//!
//! The orchestrator needs three things from the local terminal: its size, raw
//! mode, and a way to put it back the way it was. [`LocalTerminal`] abstracts
//! them so session lifecycles can be tested with a fake terminal.

use std::io;
use std::sync::Arc;

use crossterm::terminal;
use tracing::warn;

/// Escape sequence that clears the screen and homes the cursor.
pub const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[0;0H\n";

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSize {
    pub cols: u16,
    pub rows: u16,
}

impl TermSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl std::fmt::Display for TermSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Operations the session needs from the local terminal.
pub trait LocalTerminal: Send + Sync {
    /// Current size of the terminal.
    fn size(&self) -> io::Result<TermSize>;

    /// Switch to raw mode.
    fn enable_raw_mode(&self) -> io::Result<()>;

    /// Leave raw mode. Calling it when raw mode is off must be harmless.
    fn disable_raw_mode(&self) -> io::Result<()>;
}

/// The process' real terminal, driven through crossterm.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermTerminal;

impl LocalTerminal for CrosstermTerminal {
    fn size(&self) -> io::Result<TermSize> {
        let (cols, rows) = terminal::size()?;
        Ok(TermSize::new(cols, rows))
    }

    fn enable_raw_mode(&self) -> io::Result<()> {
        terminal::enable_raw_mode()
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        terminal::disable_raw_mode()
    }
}

/// Keeps the terminal in raw mode for as long as it lives.
///
/// Dropping the guard restores cooked mode, which covers early returns and
/// panics as well as the normal session end.
pub struct RawModeGuard {
    terminal: Arc<dyn LocalTerminal>,
}

impl RawModeGuard {
    pub fn enter(terminal: Arc<dyn LocalTerminal>) -> io::Result<Self> {
        terminal.enable_raw_mode()?;
        Ok(Self { terminal })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}
