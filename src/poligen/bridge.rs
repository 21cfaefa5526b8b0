//! Participant bridge: makes a blocking conversation visible to, and drivable
//! by, a human operator behind the asynchronous [`UiHandle`] channel.
//!
//! - [`BridgedParticipant`] mirrors every outbound message to the UI before the
//!   underlying send happens.
//! - [`UiHumanInput`] turns each human-input request of a
//!   [`UserProxyAgent`](crate::agent::UserProxyAgent) into UI round-trips,
//!   including the continue / feedback / exit choice offered when the proxy
//!   may skip its turn.
//!
//! Both must be used from the blocking worker thread that runs the group chat.

use std::time::Duration;

use crate::agent::{
    ChatMessage, ConversationError, HumanInput, Participant, EXIT_SENTINEL, SKIP_PROMPT_PREFIX,
};
use crate::human_io::{AskActionResponse, AskUserResponse, UiAction, UiHandle};

/// Free-text prompt issued after the operator picks "feedback".
pub const FEEDBACK_PROMPT: &str = "Please provide your feedback:";

/// Content of the continue / feedback / exit choice prompt.
pub const CHOICE_PROMPT: &str = "Continue or provide feedback?";

/// Default timeout of free-text prompts.
pub const HUMAN_INPUT_TIMEOUT: Duration = Duration::from_secs(60);

/// The three options of the choice prompt, in display order.
pub fn feedback_actions() -> Vec<UiAction> {
    vec![
        UiAction::new("continue", "continue", "✅ Continue"),
        UiAction::new("feedback", "feedback", "💬 Provide feedback"),
        UiAction::new("exit", "exit", "🔚 Exit Conversation"),
    ]
}

/// Markdown shown to the operator for a message on its way to `recipient`.
pub fn render_relay(recipient: &str, message: &str) -> String {
    format!("*Sending message to \"{}\":*\n\n{}", recipient, message)
}

/// Wraps a participant so its sends are mirrored to the UI.
pub struct BridgedParticipant<P> {
    inner: P,
    ui: UiHandle,
}

impl<P: Participant> BridgedParticipant<P> {
    pub fn new(inner: P, ui: UiHandle) -> Self {
        Self { inner, ui }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Publish the message to the UI, wait for it to be shown, then hand the
    /// original send to the wrapped participant with every flag preserved.
    pub fn relay_send(
        &self,
        message: &str,
        recipient: &dyn Participant,
        request_reply: bool,
        silent: bool,
    ) -> Result<(), ConversationError> {
        log::debug!(
            "{} -> {} (request_reply={}, silent={})",
            self.inner.name(),
            recipient.name(),
            request_reply,
            silent
        );
        self.ui
            .blocking_publish(self.inner.name(), &render_relay(recipient.name(), message))?;
        self.inner.send(message, recipient, request_reply, silent)
    }
}

impl<P: Participant> Participant for BridgedParticipant<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn receive(
        &self,
        message: &ChatMessage,
        sender: &str,
        request_reply: bool,
        silent: bool,
    ) -> Result<(), ConversationError> {
        self.inner.receive(message, sender, request_reply, silent)
    }

    fn generate_reply(&self, sender: &str) -> Result<Option<String>, ConversationError> {
        self.inner.generate_reply(sender)
    }

    fn send(
        &self,
        message: &str,
        recipient: &dyn Participant,
        request_reply: bool,
        silent: bool,
    ) -> Result<(), ConversationError> {
        self.relay_send(message, recipient, request_reply, silent)
    }

    fn reset(&self) {
        self.inner.reset()
    }
}

/// Progress of one human-input request.
#[derive(Debug, PartialEq, Eq)]
enum InputState {
    AwaitingChoice,
    FeedbackRequested,
    AwaitingFreeText(String),
    Continue,
    Exit,
    Resolved(String),
}

/// [`HumanInput`] backed by UI prompts.
pub struct UiHumanInput {
    ui: UiHandle,
    timeout: Duration,
}

impl UiHumanInput {
    pub fn new(ui: UiHandle) -> Self {
        Self {
            ui,
            timeout: HUMAN_INPUT_TIMEOUT,
        }
    }

    /// Override the free-text timeout (builder pattern).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `prompt` into the human's reply. See the module docs.
    pub fn acquire_human_input(&self, prompt: &str) -> Result<String, ConversationError> {
        let mut state = if prompt.starts_with(SKIP_PROMPT_PREFIX) {
            InputState::AwaitingChoice
        } else {
            InputState::AwaitingFreeText(prompt.to_string())
        };

        loop {
            state = match state {
                InputState::AwaitingChoice => match self.ask_choice()?.value.as_deref() {
                    Some("continue") => InputState::Continue,
                    Some("feedback") => InputState::FeedbackRequested,
                    Some("exit") => InputState::Exit,
                    _ => InputState::Resolved(String::new()),
                },
                InputState::FeedbackRequested => {
                    InputState::AwaitingFreeText(FEEDBACK_PROMPT.to_string())
                }
                InputState::AwaitingFreeText(text) => {
                    let reply = self.ask_text(&text)?;
                    InputState::Resolved(
                        reply.content.map(|c| c.trim().to_string()).unwrap_or_default(),
                    )
                }
                InputState::Continue => return Ok(String::new()),
                InputState::Exit => return Ok(EXIT_SENTINEL.to_string()),
                InputState::Resolved(reply) => return Ok(reply),
            }
        }
    }

    fn ask_choice(&self) -> Result<AskActionResponse, ConversationError> {
        let actions = feedback_actions();
        let mut attempt = 1;
        loop {
            if let Some(response) = self.ui.blocking_ask_action(CHOICE_PROMPT, &actions)? {
                return Ok(response);
            }
            log::debug!("choice prompt returned no result (attempt {}), re-asking", attempt);
            attempt += 1;
        }
    }

    fn ask_text(&self, content: &str) -> Result<AskUserResponse, ConversationError> {
        let mut attempt = 1;
        loop {
            if let Some(response) = self.ui.blocking_ask_user(content, self.timeout)? {
                return Ok(response);
            }
            log::debug!("text prompt returned no result (attempt {}), re-asking", attempt);
            attempt += 1;
        }
    }
}

impl HumanInput for UiHumanInput {
    fn get_human_input(&self, prompt: &str) -> Result<String, ConversationError> {
        self.acquire_human_input(prompt)
    }
}
