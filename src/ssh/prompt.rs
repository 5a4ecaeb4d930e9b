//! Reading answers from the user during negotiation.
//!
//! Authentication may need input that is not stored in the profile: server
//! challenges (keyboard-interactive) and the fallback password prompt. Both go
//! through the [`Prompter`] trait so negotiation can be driven without a real
//! terminal.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;

/// Source of user answers.
///
/// Reads are async so a caller waiting on the user can still be cancelled.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Show `prompt` and read one visible line (without the line terminator).
    async fn read_line(&self, prompt: &str) -> io::Result<String>;

    /// Show `prompt` and read one line without echoing it.
    async fn read_secret(&self, prompt: &str) -> io::Result<String>;
}

/// Prompter bound to the process' controlling terminal.
///
/// The blocking reads run on tokio's blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn read_line(&self, prompt: &str) -> io::Result<String> {
        let prompt = prompt.to_string();
        run_blocking(move || read_visible_line(&prompt)).await
    }

    async fn read_secret(&self, prompt: &str) -> io::Result<String> {
        let prompt = prompt.to_string();
        run_blocking(move || rpassword::prompt_password(prompt)).await
    }
}

async fn run_blocking<F>(read: F) -> io::Result<String>
where
    F: FnOnce() -> io::Result<String> + Send + 'static,
{
    tokio::task::spawn_blocking(read)
        .await
        .map_err(|e| io::Error::other(format!("prompt task failed: {}", e)))?
}

fn read_visible_line(prompt: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed while waiting for an answer",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
