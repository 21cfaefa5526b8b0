//! Group chat event system.
//!
//! Implement [`EventHandler`] to follow a conversation as it runs: run
//! start/end, speaker selection and each reply. The handler is wrapped in
//! `Arc<dyn EventHandler>` and attached with
//! [`GroupChatManager::with_event_handler`](crate::group_chat::GroupChatManager::with_event_handler).
//!
//! # Event Flow (three participants, operator exits on the third turn)
//!
//! ```text
//! RunStarted { participants: 3, max_round: 10 }
//!   ├─ SpeakerSelected { speaker: "Reviewer", round: 2 }
//!   ├─ SpeakerReplied  { speaker: "Reviewer", round: 2 }
//!   ├─ SpeakerSelected { speaker: "Technical Writer", round: 3 }
//!   ├─ SpeakerReplied  { speaker: "Technical Writer", round: 3 }
//!   └─ SpeakerSelected { speaker: "User Proxy", round: 4 }
//! RunCompleted { rounds: 3, termination: NoReply }
//! ```
//!
//! # Example
//!
//! ```rust
//! use poligen::event::{ChatEvent, EventHandler};
//! use async_trait::async_trait;
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl EventHandler for Printer {
//!     async fn on_chat_event(&self, event: &ChatEvent) {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::group_chat::TerminationReason;

/// Events emitted by a [`GroupChatManager`](crate::group_chat::GroupChatManager)
/// while it runs a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Fired once when the manager starts (or resumes) a run.
    RunStarted {
        chat_id: String,
        participants: usize,
        max_round: usize,
    },

    /// The manager picked the participant that speaks next.
    SpeakerSelected {
        chat_id: String,
        speaker: String,
        /// 1-based round within this run.
        round: usize,
    },

    /// The selected participant produced a reply.
    SpeakerReplied {
        chat_id: String,
        speaker: String,
        round: usize,
        response_length: usize,
    },

    /// Fired once when the run stops, for whatever reason.
    RunCompleted {
        chat_id: String,
        rounds: usize,
        termination: TerminationReason,
    },
}

/// Trait for receiving group chat events.
///
/// The default implementation is a no-op. Events are delivered in order from
/// the conversation worker thread, which waits for each handler call.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_chat_event(&self, _event: &ChatEvent) {}
}

/// Writes every event to the `log` facade.
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn on_chat_event(&self, event: &ChatEvent) {
        match event {
            ChatEvent::RunStarted {
                chat_id,
                participants,
                max_round,
            } => log::info!(
                "[{}] group chat started: {} participants, max {} rounds",
                chat_id,
                participants,
                max_round
            ),
            ChatEvent::SpeakerSelected {
                chat_id,
                speaker,
                round,
            } => log::debug!("[{}] round {}: {} speaks", chat_id, round, speaker),
            ChatEvent::SpeakerReplied {
                chat_id,
                speaker,
                round,
                response_length,
            } => log::debug!(
                "[{}] round {}: {} replied ({} chars)",
                chat_id,
                round,
                speaker,
                response_length
            ),
            ChatEvent::RunCompleted {
                chat_id,
                rounds,
                termination,
            } => log::info!(
                "[{}] group chat finished after {} rounds: {:?}",
                chat_id,
                rounds,
                termination
            ),
        }
    }
}
