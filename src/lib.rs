//! # PoliGen
//!
//! PoliGen drafts cybersecurity policy documents with a small team of LLM-backed
//! participants and one human operator.
//!
//! * **Reviewer** and **Technical Writer**: [`agent::AssistantAgent`]s that reply
//!   autonomously through their own [`LLMSession`].
//! * **User Proxy**: a [`agent::UserProxyAgent`] that speaks for the operator. On
//!   each of its turns the operator may continue, give feedback or end the
//!   conversation.
//!
//! The team talks in a turn-based [`group_chat::GroupChat`] bounded to ten rounds.
//! The conversation protocol is blocking and runs on a `tokio::task::spawn_blocking`
//! worker. Everything the operator sees or answers travels over the
//! [`human_io`] channel: the [`bridge`] mirrors outbound messages onto it and
//! turns human-input requests into prompts.
//!
//! ## Hosting a session
//!
//! ```rust,no_run
//! use poligen::human_io::{self, UiRequest};
//! use poligen::{on_human_message, on_session_start, PoliGenConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     poligen::init_logger();
//!     let (ui, mut requests) = human_io::channel();
//!
//!     // A UI host: show every message, continue whenever asked.
//!     tokio::spawn(async move {
//!         while let Some(request) = requests.recv().await {
//!             match request {
//!                 UiRequest::Publish { message, reply } => {
//!                     println!("{}: {}", message.author, message.content);
//!                     let _ = reply.send(());
//!                 }
//!                 UiRequest::AskAction { reply, .. } => {
//!                     let _ = reply.send(Some(human_io::AskActionResponse {
//!                         value: Some("continue".into()),
//!                     }));
//!                 }
//!                 UiRequest::AskUser { reply, .. } => {
//!                     let _ = reply.send(Some(human_io::AskUserResponse::default()));
//!                 }
//!             }
//!         }
//!     });
//!
//!     let mut session = on_session_start(PoliGenConfig::from_env()?, ui).await?;
//!     let outcome = on_human_message(&mut session, "Data Classification").await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```
//!
//! The `poligen` binary is a complete console host built the same way.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// ```rust
/// poligen::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `poligen` module.
pub mod poligen;

// Re-exporting key items for easier external access.
pub use poligen::agent;
pub use poligen::agent::{AssistantAgent, ChatMessage, Participant, UserProxyAgent};
pub use poligen::bridge;
pub use poligen::client_wrapper;
pub use poligen::client_wrapper::{ClientWrapper, Message, Role};
pub use poligen::clients;
pub use poligen::config;
pub use poligen::config::{LlmConfig, PoliGenConfig};
pub use poligen::event;
pub use poligen::event::{ChatEvent, EventHandler};
pub use poligen::group_chat;
pub use poligen::group_chat::{ChatOutcome, GroupChat, GroupChatManager, TerminationReason};
pub use poligen::human_io;
pub use poligen::llm_session;
pub use poligen::llm_session::LLMSession;
pub use poligen::prompts;
pub use poligen::session;
pub use poligen::session::{
    on_human_message, on_session_start, on_session_start_with_client, SessionContext,
    SessionError,
};
