//! Session entry points.
//!
//! A host calls [`on_session_start`] once per operator session and keeps the
//! returned [`SessionContext`]; every human message is then handed to
//! [`on_human_message`]. The first message names a cybersecurity domain and
//! starts the team on the policy task; later messages continue the same
//! conversation.
//!
//! ```rust,no_run
//! use poligen::{human_io, on_human_message, on_session_start, PoliGenConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let (ui, mut requests) = human_io::channel();
//! tokio::spawn(async move {
//!     while let Some(_request) = requests.recv().await {
//!         // render / answer the request
//!     }
//! });
//!
//! let mut session = on_session_start(PoliGenConfig::from_env()?, ui).await?;
//! let outcome = on_human_message(&mut session, "Remote Access").await?;
//! println!("stopped after {} rounds", outcome.rounds);
//! # Ok(())
//! # }
//! ```

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::agent::{
    AssistantAgent, ChatMessage, ConversationError, HumanInputMode, Participant, UserProxyAgent,
};
use crate::bridge::{BridgedParticipant, UiHumanInput};
use crate::client_wrapper::ClientWrapper;
use crate::clients::openai::OpenAIClient;
use crate::config::{ConfigError, PoliGenConfig};
use crate::event::LoggingEventHandler;
use crate::group_chat::{continue_chat, initiate_chat, ChatOutcome, GroupChat, GroupChatManager};
use crate::human_io::{UiError, UiHandle};
use crate::prompts::{
    compose_task, GREETING, REVIEWER_NAME, REVIEWER_SYSTEM_MESSAGE, STARTING_NOTICE,
    SYSTEM_AUTHOR, USER_PROXY_NAME, USER_PROXY_SYSTEM_MESSAGE, WRITER_NAME,
    WRITER_SYSTEM_MESSAGE,
};

/// Author label of error messages shown to the operator.
pub const ERROR_AUTHOR: &str = "Error";

#[derive(Debug)]
pub enum SessionError {
    Config(ConfigError),
    /// The LLM client could not be built.
    Client(String),
    Conversation(ConversationError),
    Ui(UiError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Config(e) => write!(f, "Configuration error: {}", e),
            SessionError::Client(e) => write!(f, "Failed to create LLM client: {}", e),
            SessionError::Conversation(e) => write!(f, "Conversation failed: {}", e),
            SessionError::Ui(e) => write!(f, "{}", e),
        }
    }
}

impl Error for SessionError {}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        SessionError::Config(e)
    }
}

impl From<ConversationError> for SessionError {
    fn from(e: ConversationError) -> Self {
        SessionError::Conversation(e)
    }
}

impl From<UiError> for SessionError {
    fn from(e: UiError) -> Self {
        SessionError::Ui(e)
    }
}

/// Per-session state: the team, the UI handle and the conversation so far.
pub struct SessionContext {
    id: String,
    config: PoliGenConfig,
    ui: UiHandle,
    user_proxy: Arc<BridgedParticipant<UserProxyAgent>>,
    reviewer: Arc<BridgedParticipant<AssistantAgent>>,
    writer: Arc<BridgedParticipant<AssistantAgent>>,
    selector: Arc<dyn ClientWrapper>,
    transcript: Vec<ChatMessage>,
}

impl SessionContext {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &PoliGenConfig {
        &self.config
    }

    pub fn ui(&self) -> &UiHandle {
        &self.ui
    }

    pub fn user_proxy(&self) -> &Arc<BridgedParticipant<UserProxyAgent>> {
        &self.user_proxy
    }

    pub fn reviewer(&self) -> &Arc<BridgedParticipant<AssistantAgent>> {
        &self.reviewer
    }

    pub fn writer(&self) -> &Arc<BridgedParticipant<AssistantAgent>> {
        &self.writer
    }

    /// Participants in speaking order: user proxy, reviewer, writer.
    pub fn participants(&self) -> Vec<Arc<dyn Participant>> {
        vec![
            self.user_proxy.clone() as Arc<dyn Participant>,
            self.reviewer.clone() as Arc<dyn Participant>,
            self.writer.clone() as Arc<dyn Participant>,
        ]
    }

    /// Every message of the conversation so far, oldest first.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }
}

fn build_client(config: &PoliGenConfig) -> Result<Arc<dyn ClientWrapper>, SessionError> {
    let api_key = config.resolve_api_key()?;
    let llm = &config.llm;
    let client = match &llm.base_url {
        Some(base_url) => {
            OpenAIClient::new_with_base_url(&api_key, &llm.model, base_url, llm.request_timeout)
        }
        None => OpenAIClient::new_with_timeout(&api_key, &llm.model, llm.request_timeout),
    }
    .map_err(|e| SessionError::Client(e.to_string()))?;
    Ok(Arc::new(client.with_retry(2, llm.retry_wait_time)))
}

/// Start a session backed by OpenAI.
///
/// On failure the error is logged, shown to the operator and returned.
pub async fn on_session_start(
    config: PoliGenConfig,
    ui: UiHandle,
) -> Result<SessionContext, SessionError> {
    match build_client(&config) {
        Ok(client) => on_session_start_with_client(config, ui, client).await,
        Err(e) => Err(report_start_failure(&ui, e).await),
    }
}

/// Start a session whose participants all talk to `client`.
pub async fn on_session_start_with_client(
    config: PoliGenConfig,
    ui: UiHandle,
    client: Arc<dyn ClientWrapper>,
) -> Result<SessionContext, SessionError> {
    let id = Uuid::new_v4().to_string();
    log::info!(
        "[{}] starting session with model {}",
        id,
        client.model_name()
    );

    let human_input = UiHumanInput::new(ui.clone()).with_timeout(config.human_input_timeout);
    let user_proxy = UserProxyAgent::new(
        USER_PROXY_NAME,
        USER_PROXY_SYSTEM_MESSAGE,
        Arc::new(human_input),
    )
    .with_human_input_mode(HumanInputMode::Always)
    .with_llm(client.clone(), config.max_tokens);
    let reviewer = AssistantAgent::new(REVIEWER_NAME, REVIEWER_SYSTEM_MESSAGE, client.clone())
        .with_max_tokens(config.max_tokens);
    let writer = AssistantAgent::new(WRITER_NAME, WRITER_SYSTEM_MESSAGE, client.clone())
        .with_max_tokens(config.max_tokens);

    let ctx = SessionContext {
        id,
        user_proxy: Arc::new(BridgedParticipant::new(user_proxy, ui.clone())),
        reviewer: Arc::new(BridgedParticipant::new(reviewer, ui.clone())),
        writer: Arc::new(BridgedParticipant::new(writer, ui.clone())),
        selector: client,
        transcript: Vec::new(),
        config,
        ui,
    };

    if let Err(e) = ctx.ui.publish(USER_PROXY_NAME, GREETING).await {
        return Err(report_start_failure(&ctx.ui, e.into()).await);
    }
    Ok(ctx)
}

async fn report_start_failure(ui: &UiHandle, error: SessionError) -> SessionError {
    log::error!("Session start failed: {}", error);
    if let Err(e) = ui.publish(ERROR_AUTHOR, &error.to_string()).await {
        log::error!("Could not show the error to the operator: {}", e);
    }
    error
}

/// Handle one human message.
///
/// The first message of a session is the policy domain and opens the
/// conversation with the full task. Later messages are forwarded as they are
/// and continue the stored conversation.
pub async fn on_human_message(
    ctx: &mut SessionContext,
    text: &str,
) -> Result<ChatOutcome, SessionError> {
    log::info!("[{}] Task: {}", ctx.id, text);

    let groupchat = GroupChat::new(ctx.participants(), ctx.config.max_round)
        .with_messages(ctx.transcript.clone())
        .with_speaker_selection(ctx.config.speaker_selection);
    let first_turn = groupchat.messages().is_empty();
    log::debug!(
        "[{}] group chat has {} messages",
        ctx.id,
        groupchat.messages().len()
    );
    let manager = GroupChatManager::new(groupchat)
        .with_id(ctx.id.clone())
        .with_selector(ctx.selector.clone())
        .with_event_handler(Arc::new(LoggingEventHandler));

    let message = if first_turn {
        ctx.ui.publish(SYSTEM_AUTHOR, STARTING_NOTICE).await?;
        compose_task(text)
    } else {
        text.to_string()
    };

    let user_proxy = ctx.user_proxy.clone();
    let worker = tokio::task::spawn_blocking(move || {
        let result = if first_turn {
            initiate_chat(user_proxy.as_ref(), &manager, &message)
        } else {
            continue_chat(user_proxy.as_ref(), &manager, &message)
        };
        (manager.into_groupchat().into_messages(), result)
    });

    let (transcript, result) = worker
        .await
        .map_err(|e| ConversationError::Worker(e.to_string()))?;
    ctx.transcript = transcript;

    match result {
        Ok(outcome) => {
            log::info!(
                "[{}] run finished: {} new messages, {:?}",
                ctx.id,
                outcome.messages_added,
                outcome.termination
            );
            Ok(outcome)
        }
        Err(e) => {
            log::error!("[{}] conversation failed: {}", ctx.id, e);
            Err(e.into())
        }
    }
}
