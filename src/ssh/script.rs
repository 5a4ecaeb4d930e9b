//! Login script injection.

use tracing::{debug, warn};

use super::profile::ScriptStep;
use super::transport::ShellWriter;

/// Write each step's command, terminated by a carriage return, after its delay.
///
/// Runs to completion before user input is forwarded, so scripted commands
/// always reach the shell ahead of any keystroke. A failed write ends the
/// script; the session itself carries on.
pub async fn inject_script<W: ShellWriter>(writer: &W, steps: &[ScriptStep]) {
    for (index, step) in steps.iter().enumerate() {
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }

        let mut line = Vec::with_capacity(step.command.len() + 1);
        line.extend_from_slice(step.command.as_bytes());
        line.push(b'\r');

        if let Err(e) = writer.write(&line).await {
            warn!("Login script stopped at step {}: {}", index + 1, e);
            return;
        }
        debug!("Login script step {} of {} sent", index + 1, steps.len());
    }
}
