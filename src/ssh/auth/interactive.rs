//! Keyboard-interactive (challenge-response) authentication.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, KeyboardInteractiveAuthResponse};
use tracing::debug;

use crate::ssh::error::SessionError;
use crate::ssh::handler::SshClientHandler;
use crate::ssh::prompt::Prompter;

use super::traits::{AuthOutcome, AuthStrategy, transport_failure};

/// Strategy name reported by [`InteractiveAuth`].
pub const INTERACTIVE_METHOD: &str = "keyboard-interactive";

/// Upper bound on challenge rounds, so a misbehaving server cannot loop forever.
const MAX_ROUNDS: usize = 16;

/// One question from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub prompt: String,
    /// Whether the answer may be shown on screen
    pub echo: bool,
}

/// Keyboard-interactive authentication strategy.
///
/// Every prompt the server sends is shown to the user through the
/// [`Prompter`]: echoing prompts read a visible line, the others read a hidden one.
pub struct InteractiveAuth {
    prompter: Arc<dyn Prompter>,
}

impl InteractiveAuth {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self { prompter }
    }
}

/// Ask the user every challenge of one round, in order.
pub(crate) async fn answer_challenges(
    prompter: &dyn Prompter,
    instructions: &str,
    challenges: &[Challenge],
) -> std::io::Result<Vec<String>> {
    if !instructions.is_empty() {
        println!("{}", instructions);
    }

    let mut answers = Vec::with_capacity(challenges.len());
    for challenge in challenges {
        let answer = if challenge.echo {
            prompter.read_line(&challenge.prompt).await?
        } else {
            prompter.read_secret(&challenge.prompt).await?
        };
        answers.push(answer);
    }
    Ok(answers)
}

#[async_trait]
impl AuthStrategy for InteractiveAuth {
    fn name(&self) -> &'static str {
        INTERACTIVE_METHOD
    }

    async fn attempt(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<AuthOutcome, SessionError> {
        let mut response = handle
            .authenticate_keyboard_interactive_start(username, None::<String>)
            .await
            .map_err(|e| transport_failure(INTERACTIVE_METHOD, e))?;

        for round in 0..MAX_ROUNDS {
            match response {
                KeyboardInteractiveAuthResponse::Success => {
                    return Ok(AuthOutcome::Accepted);
                }
                KeyboardInteractiveAuthResponse::Failure { .. } => {
                    return Ok(AuthOutcome::Rejected);
                }
                KeyboardInteractiveAuthResponse::InfoRequest {
                    instructions,
                    prompts,
                    ..
                } => {
                    debug!(
                        "Keyboard-interactive round {} with {} prompt(s)",
                        round + 1,
                        prompts.len()
                    );

                    let challenges: Vec<Challenge> = prompts
                        .into_iter()
                        .map(|p| Challenge {
                            prompt: p.prompt,
                            echo: p.echo,
                        })
                        .collect();

                    // A cancelled or unreadable answer ends negotiation as a prompt error.
                    let answers =
                        answer_challenges(self.prompter.as_ref(), &instructions, &challenges)
                            .await?;

                    response = handle
                        .authenticate_keyboard_interactive_respond(answers)
                        .await
                        .map_err(|e| transport_failure(INTERACTIVE_METHOD, e))?;
                }
            }
        }

        Err(SessionError::Connect(format!(
            "server sent more than {} keyboard-interactive rounds",
            MAX_ROUNDS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedPrompter;

    fn challenge(prompt: &str, echo: bool) -> Challenge {
        Challenge {
            prompt: prompt.to_string(),
            echo,
        }
    }

    #[tokio::test]
    async fn test_echo_prompts_read_visible_lines() {
        let prompter = ScriptedPrompter::new(["alice"]);
        let answers = answer_challenges(&prompter, "", &[challenge("Username: ", true)])
            .await
            .unwrap();
        assert_eq!(answers, vec!["alice"]);
        assert_eq!(prompter.calls(), vec!["line:Username: "]);
    }

    #[tokio::test]
    async fn test_no_echo_prompts_read_hidden() {
        let prompter = ScriptedPrompter::new(["123456"]);
        let answers = answer_challenges(&prompter, "", &[challenge("Verification code: ", false)])
            .await
            .unwrap();
        assert_eq!(answers, vec!["123456"]);
        assert_eq!(prompter.calls(), vec!["secret:Verification code: "]);
    }

    #[tokio::test]
    async fn test_mixed_prompts_keep_order() {
        let prompter = ScriptedPrompter::new(["bob", "pw", "42"]);
        let answers = answer_challenges(
            &prompter,
            "Two-factor login",
            &[
                challenge("User: ", true),
                challenge("Password: ", false),
                challenge("Token: ", true),
            ],
        )
        .await
        .unwrap();
        assert_eq!(answers, vec!["bob", "pw", "42"]);
        assert_eq!(
            prompter.calls(),
            vec!["line:User: ", "secret:Password: ", "line:Token: "]
        );
    }

    #[tokio::test]
    async fn test_empty_round_asks_nothing() {
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let answers = answer_challenges(&prompter, "", &[]).await.unwrap();
        assert!(answers.is_empty());
        assert!(prompter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_failure_propagates() {
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        let err = answer_challenges(&prompter, "", &[challenge("Code: ", false)])
            .await
            .unwrap_err();
        let err: SessionError = err.into();
        assert!(matches!(err, SessionError::Prompt(_)));
    }

    #[test]
    fn test_interactive_auth_name() {
        let auth = InteractiveAuth::new(Arc::new(ScriptedPrompter::new(Vec::<String>::new())));
        assert_eq!(auth.name(), "keyboard-interactive");
    }
}
