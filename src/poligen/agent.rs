//! Conversation participants.
//!
//! A [`Participant`] is a named role in a group chat. Two behaviours exist:
//!
//! - [`AssistantAgent`]: replies autonomously through its own [`LLMSession`].
//! - [`UserProxyAgent`]: replies with whatever a [`HumanInput`] source returns,
//!   falling back to an automatic reply when the operator skips the turn.
//!
//! The protocol is synchronous. Participants are driven from a blocking worker
//! thread (see [`GroupChatManager`](crate::group_chat::GroupChatManager)) and
//! reach the async LLM clients by blocking on the current tokio runtime handle.
//!
//! # Example
//!
//! ```rust,no_run
//! use poligen::agent::{AssistantAgent, Participant};
//! use poligen::clients::openai::OpenAIClient;
//! use std::sync::Arc;
//!
//! # fn build() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let reviewer = AssistantAgent::new(
//!     "Reviewer",
//!     "Reviewer. Only provides suggestions for improvement.",
//!     Arc::new(OpenAIClient::new_with_model_string("key", "gpt-4o")?),
//! );
//! assert_eq!(reviewer.name(), "Reviewer");
//! # Ok(())
//! # }
//! ```

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client_wrapper::{ClientWrapper, Role};
use crate::human_io::UiError;
use crate::llm_session::LLMSession;

/// Prefix of the prompt a user proxy issues when it may skip its turn.
///
/// The full prompt is built by [`UserProxyAgent::feedback_prompt`].
pub const SKIP_PROMPT_PREFIX: &str =
    "Provide feedback to chat_manager. Press enter to skip and use auto-reply";

/// Reserved human reply that ends the conversation immediately.
pub const EXIT_SENTINEL: &str = "exit";

/// Messages whose trimmed content ends with this marker terminate a group chat.
pub const TERMINATION_MARKER: &str = "TERMINATE";

/// One entry of a conversation transcript. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the sender.
    pub name: String,
    /// Display name of the participant the message was sent to.
    #[serde(default)]
    pub recipient: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            recipient: String::new(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Address the message (builder pattern).
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    /// `true` when this message asks the group chat to stop.
    pub fn is_termination(&self) -> bool {
        self.content.trim_end().ends_with(TERMINATION_MARKER)
    }
}

/// Errors raised while a conversation is running. Any of them aborts the turn.
#[derive(Debug)]
pub enum ConversationError {
    /// The UI host stopped serving requests.
    Ui(UiError),
    /// The LLM call of the named participant failed.
    Llm { participant: String, error: String },
    /// A participant needed the tokio runtime but was driven from outside it.
    NoRuntime,
    /// A message came from a participant the group chat does not know.
    UnknownParticipant(String),
    /// The blocking worker panicked or was cancelled.
    Worker(String),
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationError::Ui(e) => write!(f, "{}", e),
            ConversationError::Llm { participant, error } => {
                write!(f, "LLM call for '{}' failed: {}", participant, error)
            }
            ConversationError::NoRuntime => write!(f, "No tokio runtime available"),
            ConversationError::UnknownParticipant(name) => {
                write!(f, "Unknown participant: {}", name)
            }
            ConversationError::Worker(msg) => write!(f, "Conversation worker failed: {}", msg),
        }
    }
}

impl Error for ConversationError {}

impl From<UiError> for ConversationError {
    fn from(e: UiError) -> Self {
        ConversationError::Ui(e)
    }
}

/// A named role in a group chat.
pub trait Participant: Send + Sync {
    /// Display name, unique within a conversation.
    fn name(&self) -> &str;

    /// Role description used when an LLM picks the next speaker.
    fn description(&self) -> &str {
        ""
    }

    /// Deliver `message` from `sender` into this participant's view.
    ///
    /// `request_reply` asks the recipient to answer; plain participants leave
    /// that to the chat manager that routes their turns.
    fn receive(
        &self,
        message: &ChatMessage,
        sender: &str,
        request_reply: bool,
        silent: bool,
    ) -> Result<(), ConversationError>;

    /// Produce the next contribution, or `None` to end the conversation.
    fn generate_reply(&self, sender: &str) -> Result<Option<String>, ConversationError>;

    /// Send `message` to `recipient`.
    fn send(
        &self,
        message: &str,
        recipient: &dyn Participant,
        request_reply: bool,
        silent: bool,
    ) -> Result<(), ConversationError> {
        let message = ChatMessage::new(self.name(), message).to(recipient.name());
        recipient.receive(&message, self.name(), request_reply, silent)
    }

    /// Forget the conversation so far.
    fn reset(&self) {}
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

/// How another participant's message is presented to the LLM.
fn render_for_llm(message: &ChatMessage) -> String {
    format!("[{}]: {}", message.name, message.content)
}

/// Run one LLM round over `session` from the blocking worker thread.
fn complete_blocking(
    participant: &str,
    session: &Mutex<LLMSession>,
) -> Result<String, ConversationError> {
    let handle =
        tokio::runtime::Handle::try_current().map_err(|_| ConversationError::NoRuntime)?;
    let mut session = lock(session);
    log::debug!("{} calling {}...", participant, session.client().model_name());
    handle
        .block_on(session.complete())
        .map(|message| message.content)
        .map_err(|e| {
            log::error!("{} LLM call failed: {}", participant, e);
            ConversationError::Llm {
                participant: participant.to_string(),
                error: e.to_string(),
            }
        })
}

/// A participant that replies autonomously with its LLM.
pub struct AssistantAgent {
    name: String,
    system_message: String,
    session: Mutex<LLMSession>,
}

impl AssistantAgent {
    /// Create an agent with an 8 192-token history budget.
    pub fn new(
        name: impl Into<String>,
        system_message: impl Into<String>,
        client: Arc<dyn ClientWrapper>,
    ) -> Self {
        let system_message = system_message.into();
        let session = LLMSession::new(client, system_message.clone(), 8_192);
        Self {
            name: name.into(),
            system_message,
            session: Mutex::new(session),
        }
    }

    /// Override the token budget (builder pattern). History is reset.
    pub fn with_max_tokens(self, max_tokens: usize) -> Self {
        let client = lock(&self.session).client().clone();
        let session = LLMSession::new(client, self.system_message.clone(), max_tokens);
        Self {
            session: Mutex::new(session),
            ..self
        }
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    /// Number of messages this agent would send to its LLM (system prompt excluded).
    pub fn history_len(&self) -> usize {
        lock(&self.session).get_conversation_history().len()
    }
}

impl Participant for AssistantAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.system_message
    }

    fn receive(
        &self,
        message: &ChatMessage,
        _sender: &str,
        _request_reply: bool,
        _silent: bool,
    ) -> Result<(), ConversationError> {
        // Own replies are recorded by the session when they are generated.
        if message.name != self.name {
            lock(&self.session).inject_message(Role::User, render_for_llm(message));
        }
        Ok(())
    }

    fn generate_reply(&self, _sender: &str) -> Result<Option<String>, ConversationError> {
        complete_blocking(&self.name, &self.session).map(Some)
    }

    fn reset(&self) {
        lock(&self.session).clear_history();
    }
}

/// When a user proxy asks its [`HumanInput`] for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumanInputMode {
    /// Ask on every turn.
    Always,
    /// Ask only when the incoming message is a termination message.
    Terminate,
    /// Never ask; always auto-reply.
    Never,
}

/// Source of human replies for a [`UserProxyAgent`].
pub trait HumanInput: Send + Sync {
    /// Obtain the human's reply to `prompt`. [`EXIT_SENTINEL`] ends the conversation.
    fn get_human_input(&self, prompt: &str) -> Result<String, ConversationError>;
}

/// A participant whose turns are driven by a human operator.
///
/// Code execution is not supported; the auto-reply is the proxy's own LLM
/// reply when a client is configured, otherwise the default auto-reply text.
pub struct UserProxyAgent {
    name: String,
    system_message: String,
    human_input_mode: HumanInputMode,
    human_input: Arc<dyn HumanInput>,
    session: Option<Mutex<LLMSession>>,
    default_auto_reply: String,
    history: Mutex<Vec<ChatMessage>>,
}

impl UserProxyAgent {
    pub fn new(
        name: impl Into<String>,
        system_message: impl Into<String>,
        human_input: Arc<dyn HumanInput>,
    ) -> Self {
        Self {
            name: name.into(),
            system_message: system_message.into(),
            human_input_mode: HumanInputMode::Always,
            human_input,
            session: None,
            default_auto_reply: String::new(),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn with_human_input_mode(mut self, mode: HumanInputMode) -> Self {
        self.human_input_mode = mode;
        self
    }

    /// Let the proxy answer skipped turns with its own LLM (builder pattern).
    pub fn with_llm(mut self, client: Arc<dyn ClientWrapper>, max_tokens: usize) -> Self {
        self.session = Some(Mutex::new(LLMSession::new(
            client,
            self.system_message.clone(),
            max_tokens,
        )));
        self
    }

    pub fn with_default_auto_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_auto_reply = reply.into();
        self
    }

    pub fn human_input_mode(&self) -> HumanInputMode {
        self.human_input_mode
    }

    /// Prompt shown when the proxy's turn comes up in a conversation led by `sender`.
    pub fn feedback_prompt(sender: &str) -> String {
        format!(
            "Provide feedback to {}. Press enter to skip and use auto-reply, or type '{}' to end the conversation: ",
            sender, EXIT_SENTINEL
        )
    }

    /// Messages received so far.
    pub fn history(&self) -> Vec<ChatMessage> {
        lock(&self.history).clone()
    }

    /// Append `message` to the history and, when the proxy has an LLM, to its
    /// session. An LLM auto-reply is already the session's last entry.
    fn record(&self, message: &ChatMessage) {
        if let Some(session) = &self.session {
            let mut session = lock(session);
            if message.name == self.name {
                let already_there = session
                    .get_conversation_history()
                    .last()
                    .map(|m| m.role == Role::Assistant && m.content == message.content)
                    .unwrap_or(false);
                if !already_there {
                    session.inject_message(Role::Assistant, message.content.clone());
                }
            } else {
                session.inject_message(Role::User, render_for_llm(message));
            }
        }
        lock(&self.history).push(message.clone());
    }

    fn auto_reply(&self) -> Result<Option<String>, ConversationError> {
        match &self.session {
            Some(session) => complete_blocking(&self.name, session).map(Some),
            None => Ok(Some(self.default_auto_reply.clone())),
        }
    }
}

impl Participant for UserProxyAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.system_message
    }

    fn receive(
        &self,
        message: &ChatMessage,
        _sender: &str,
        _request_reply: bool,
        _silent: bool,
    ) -> Result<(), ConversationError> {
        self.record(message);
        Ok(())
    }

    /// Outgoing messages are recorded too: the broadcast never echoes a
    /// speaker's own message back to it.
    fn send(
        &self,
        message: &str,
        recipient: &dyn Participant,
        request_reply: bool,
        silent: bool,
    ) -> Result<(), ConversationError> {
        let message = ChatMessage::new(self.name.clone(), message).to(recipient.name());
        self.record(&message);
        recipient.receive(&message, &self.name, request_reply, silent)
    }

    fn generate_reply(&self, sender: &str) -> Result<Option<String>, ConversationError> {
        let last_is_termination = lock(&self.history)
            .last()
            .map(ChatMessage::is_termination)
            .unwrap_or(false);
        let ask = match self.human_input_mode {
            HumanInputMode::Always => true,
            HumanInputMode::Terminate => last_is_termination,
            HumanInputMode::Never => false,
        };
        if !ask {
            return self.auto_reply();
        }

        let reply = self
            .human_input
            .get_human_input(&Self::feedback_prompt(sender))?;
        if reply == EXIT_SENTINEL {
            log::info!("{} ended the conversation", self.name);
            return Ok(None);
        }
        if reply.is_empty() {
            return self.auto_reply();
        }
        Ok(Some(reply))
    }

    fn reset(&self) {
        lock(&self.history).clear();
        if let Some(session) = &self.session {
            lock(session).clear_history();
        }
    }
}
