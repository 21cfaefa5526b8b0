//! Turn-based group chat.
//!
//! A [`GroupChat`] holds the participants, the ordered transcript and the round
//! limit. A [`GroupChatManager`] is itself a [`Participant`] named
//! `chat_manager`: when a participant sends it a message with
//! `request_reply = true`, it runs the conversation loop.
//!
//! ```text
//! for round in 1..=max_round
//!   append message, broadcast it silently to everyone but its speaker
//!   stop if it ends with TERMINATE, or if this was the last round
//!   select next speaker (round-robin, or Auto via the manager's LLM)
//!   reply = speaker.generate_reply()       None → stop
//!   speaker.send(reply, manager)           (bridged speakers publish to the UI)
//! ```
//!
//! The loop is blocking and is meant to run on a dedicated worker thread such
//! as `tokio::task::spawn_blocking`.
//!
//! # Example
//!
//! ```rust,no_run
//! use poligen::agent::{AssistantAgent, Participant};
//! use poligen::clients::openai::OpenAIClient;
//! use poligen::group_chat::{initiate_chat, GroupChat, GroupChatManager};
//! use std::sync::Arc;
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let client = Arc::new(OpenAIClient::new_with_model_string("key", "gpt-4o")?);
//! let writer: Arc<dyn Participant> = Arc::new(AssistantAgent::new("Writer", "Writes.", client.clone()));
//! let reviewer: Arc<dyn Participant> = Arc::new(AssistantAgent::new("Reviewer", "Reviews.", client));
//!
//! let manager = GroupChatManager::new(GroupChat::new(vec![writer.clone(), reviewer], 4));
//! let outcome = initiate_chat(writer.as_ref(), &manager, "Draft a password policy.")?;
//! println!("{} rounds, stopped because {:?}", outcome.rounds, outcome.termination);
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::agent::{lock, ChatMessage, ConversationError, Participant};
use crate::client_wrapper::{ClientWrapper, Message, Role};
use crate::event::{ChatEvent, EventHandler};

/// Name of the manager participant. Part of the user proxy's skip prompt.
pub const MANAGER_NAME: &str = "chat_manager";

/// Round limit used by the policy team.
pub const DEFAULT_MAX_ROUND: usize = 10;

/// How the manager picks the next speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerSelection {
    /// The participant after the previous speaker, in insertion order.
    RoundRobin,
    /// The manager's LLM names the next role; unknown answers fall back to round-robin.
    Auto,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    MaxRoundReached,
    /// The last message ended with `TERMINATE`.
    TerminationMessage,
    /// The selected speaker declined to reply (e.g. the operator chose exit).
    NoReply,
}

/// Summary of one manager run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    /// Transcript entries appended by this run, incoming message included.
    pub messages_added: usize,
    /// Rounds processed, never more than the group chat's `max_round`.
    pub rounds: usize,
    pub termination: TerminationReason,
}

/// Participants, transcript and round limit of one conversation.
pub struct GroupChat {
    agents: Vec<Arc<dyn Participant>>,
    messages: Vec<ChatMessage>,
    max_round: usize,
    speaker_selection: SpeakerSelection,
}

impl GroupChat {
    /// Empty conversation over `agents`, with round-robin speaker selection.
    ///
    /// `max_round` is at least 1, the round that records the initiating message.
    pub fn new(agents: Vec<Arc<dyn Participant>>, max_round: usize) -> Self {
        Self {
            agents,
            messages: Vec::new(),
            max_round: max_round.max(1),
            speaker_selection: SpeakerSelection::RoundRobin,
        }
    }

    /// Resume from an earlier transcript (builder pattern).
    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_speaker_selection(mut self, selection: SpeakerSelection) -> Self {
        self.speaker_selection = selection;
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    pub fn max_round(&self) -> usize {
        self.max_round
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    pub fn agent_by_name(&self, name: &str) -> Option<&Arc<dyn Participant>> {
        self.agents.iter().find(|a| a.name() == name)
    }

    /// The participant following `name` in insertion order, wrapping around.
    pub fn next_agent(&self, name: &str) -> Option<&Arc<dyn Participant>> {
        let position = self.agents.iter().position(|a| a.name() == name);
        let next = position.map(|i| (i + 1) % self.agents.len()).unwrap_or(0);
        self.agents.get(next)
    }

    fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Prompt asking an LLM which role should speak next.
    fn selection_messages(&self) -> Vec<Message> {
        let roles = self
            .agents
            .iter()
            .map(|a| format!("{}: {}", a.name(), a.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let names = self.agent_names().join(", ");

        let mut messages = vec![Message {
            role: Role::System,
            content: format!(
                "You are in a role play game. The following roles are available:\n{}.\n\nRead the following conversation.\nThen select the next role from [{}] to play. Only return the role.",
                roles, names
            ),
        }];
        for m in &self.messages {
            messages.push(Message {
                role: Role::User,
                content: format!("[{}]: {}", m.name, m.content),
            });
        }
        messages.push(Message {
            role: Role::User,
            content: format!(
                "Read the above conversation. Then select the next role from [{}] to play. Only return the role.",
                names
            ),
        });
        messages
    }

    /// Match an LLM answer against the participant names.
    fn agent_from_selection(&self, answer: &str) -> Option<&Arc<dyn Participant>> {
        let answer = answer.trim();
        self.agent_by_name(answer).or_else(|| {
            let mentioned: Vec<_> = self
                .agents
                .iter()
                .filter(|a| answer.contains(a.name()))
                .collect();
            if mentioned.len() == 1 {
                Some(mentioned[0])
            } else {
                None
            }
        })
    }
}

/// Runs a [`GroupChat`] when a participant requests a reply from it.
pub struct GroupChatManager {
    /// Identifier used in events and logs.
    pub id: String,
    groupchat: Mutex<GroupChat>,
    selector: Option<Arc<dyn ClientWrapper>>,
    event_handler: Option<Arc<dyn EventHandler>>,
    last_outcome: Mutex<Option<ChatOutcome>>,
}

impl GroupChatManager {
    pub fn new(groupchat: GroupChat) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            groupchat: Mutex::new(groupchat),
            selector: None,
            event_handler: None,
            last_outcome: Mutex::new(None),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// LLM used by [`SpeakerSelection::Auto`].
    pub fn with_selector(mut self, client: Arc<dyn ClientWrapper>) -> Self {
        self.selector = Some(client);
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Outcome of the most recent run, cleared on read.
    pub fn take_outcome(&self) -> Option<ChatOutcome> {
        lock(&self.last_outcome).take()
    }

    /// Copy of the transcript so far.
    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.groupchat).messages().to_vec()
    }

    /// Give the group chat back, transcript included.
    pub fn into_groupchat(self) -> GroupChat {
        self.groupchat.into_inner().unwrap_or_else(|p| p.into_inner())
    }

    /// Deliver events in order, waiting for the handler from the worker thread.
    fn emit(&self, event: ChatEvent) {
        if let Some(handler) = &self.event_handler {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => handle.block_on(handler.on_chat_event(&event)),
                Err(_) => log::debug!("no runtime, dropping event {:?}", event),
            }
        }
    }

    fn select_speaker(
        &self,
        groupchat: &GroupChat,
        last_speaker: &str,
    ) -> Result<Arc<dyn Participant>, ConversationError> {
        let fallback = || {
            groupchat
                .next_agent(last_speaker)
                .cloned()
                .ok_or_else(|| ConversationError::UnknownParticipant(last_speaker.to_string()))
        };

        let client = match (groupchat.speaker_selection, &self.selector) {
            (SpeakerSelection::Auto, Some(client)) => client,
            _ => return fallback(),
        };
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| ConversationError::NoRuntime)?;
        match handle.block_on(client.send_message(&groupchat.selection_messages())) {
            Ok(answer) => match groupchat.agent_from_selection(&answer.content) {
                Some(agent) => Ok(agent.clone()),
                None => {
                    log::warn!(
                        "[{}] speaker selection answered '{}', using round-robin",
                        self.id,
                        answer.content
                    );
                    fallback()
                }
            },
            Err(e) => {
                log::warn!("[{}] speaker selection failed ({}), using round-robin", self.id, e);
                fallback()
            }
        }
    }

    /// Run the conversation loop starting from `message`, sent by `sender`.
    pub fn run_chat(
        &self,
        message: &ChatMessage,
        sender: &str,
    ) -> Result<ChatOutcome, ConversationError> {
        let mut groupchat = lock(&self.groupchat);
        let start_len = groupchat.messages().len();
        let max_round = groupchat.max_round();

        self.emit(ChatEvent::RunStarted {
            chat_id: self.id.clone(),
            participants: groupchat.agents.len(),
            max_round,
        });

        let mut speaker = groupchat
            .agent_by_name(sender)
            .cloned()
            .ok_or_else(|| ConversationError::UnknownParticipant(sender.to_string()))?;
        let mut message = message.clone();
        let mut termination = TerminationReason::MaxRoundReached;
        let mut rounds = 0;

        for round in 1..=max_round {
            rounds = round;
            groupchat.append(message.clone());
            for agent in &groupchat.agents {
                if agent.name() != speaker.name() {
                    agent.receive(&message, MANAGER_NAME, false, true)?;
                }
            }

            if message.is_termination() {
                termination = TerminationReason::TerminationMessage;
                break;
            }
            if round == max_round {
                break;
            }

            let next = self.select_speaker(&groupchat, speaker.name())?;
            self.emit(ChatEvent::SpeakerSelected {
                chat_id: self.id.clone(),
                speaker: next.name().to_string(),
                round: round + 1,
            });

            let reply = match next.generate_reply(MANAGER_NAME)? {
                Some(reply) => reply,
                None => {
                    termination = TerminationReason::NoReply;
                    break;
                }
            };
            self.emit(ChatEvent::SpeakerReplied {
                chat_id: self.id.clone(),
                speaker: next.name().to_string(),
                round: round + 1,
                response_length: reply.len(),
            });

            next.send(&reply, self, false, false)?;
            message = ChatMessage::new(next.name(), reply).to(MANAGER_NAME);
            speaker = next;
        }

        let outcome = ChatOutcome {
            messages_added: groupchat.messages().len() - start_len,
            rounds,
            termination,
        };
        self.emit(ChatEvent::RunCompleted {
            chat_id: self.id.clone(),
            rounds,
            termination,
        });
        Ok(outcome)
    }
}

impl Participant for GroupChatManager {
    fn name(&self) -> &str {
        MANAGER_NAME
    }

    fn receive(
        &self,
        message: &ChatMessage,
        sender: &str,
        request_reply: bool,
        _silent: bool,
    ) -> Result<(), ConversationError> {
        // Replies routed back by speakers are already in the transcript.
        if request_reply {
            let outcome = self.run_chat(message, sender)?;
            *lock(&self.last_outcome) = Some(outcome);
        }
        Ok(())
    }

    fn generate_reply(&self, _sender: &str) -> Result<Option<String>, ConversationError> {
        Ok(None)
    }
}

/// Start a conversation: `sender` forgets its history, then sends `message`
/// to `manager` asking for a reply, which runs the group chat.
pub fn initiate_chat(
    sender: &dyn Participant,
    manager: &GroupChatManager,
    message: &str,
) -> Result<ChatOutcome, ConversationError> {
    sender.reset();
    continue_chat(sender, manager, message)
}

/// Add `message` from `sender` to an existing conversation and run it further.
pub fn continue_chat(
    sender: &dyn Participant,
    manager: &GroupChatManager,
    message: &str,
) -> Result<ChatOutcome, ConversationError> {
    sender.send(message, manager, true, false)?;
    manager
        .take_outcome()
        .ok_or_else(|| ConversationError::Worker("group chat did not run".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    impl Participant for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn receive(
            &self,
            _: &ChatMessage,
            _: &str,
            _: bool,
            _: bool,
        ) -> Result<(), ConversationError> {
            Ok(())
        }

        fn generate_reply(&self, _: &str) -> Result<Option<String>, ConversationError> {
            Ok(Some(format!("{} speaking", self.0)))
        }
    }

    fn chat() -> GroupChat {
        let agents: Vec<Arc<dyn Participant>> =
            vec![Arc::new(Echo("a")), Arc::new(Echo("b")), Arc::new(Echo("c"))];
        GroupChat::new(agents, DEFAULT_MAX_ROUND)
    }

    #[test]
    fn round_robin_wraps_around() {
        let gc = chat();
        assert_eq!(gc.next_agent("a").unwrap().name(), "b");
        assert_eq!(gc.next_agent("c").unwrap().name(), "a");
        assert_eq!(gc.next_agent("nobody").unwrap().name(), "a");
    }

    #[test]
    fn selection_answer_matching() {
        let gc = chat();
        assert_eq!(gc.agent_from_selection(" b\n").unwrap().name(), "b");
        assert_eq!(gc.agent_from_selection("I pick c.").unwrap().name(), "c");
        assert!(gc.agent_from_selection("a or b").is_none());
    }

    #[test]
    fn run_without_runtime_stops_at_max_round() {
        let manager = GroupChatManager::new(chat());
        let outcome = manager.run_chat(&ChatMessage::new("a", "start"), "a").unwrap();
        assert_eq!(outcome.rounds, DEFAULT_MAX_ROUND);
        assert_eq!(outcome.messages_added, DEFAULT_MAX_ROUND);
        assert_eq!(outcome.termination, TerminationReason::MaxRoundReached);
        let names: Vec<_> = manager.messages().iter().map(|m| m.name.clone()).collect();
        assert_eq!(&names[..4], &["a", "b", "c", "a"]);
    }

    #[test]
    fn zero_max_round_still_records_the_initiating_message() {
        let agents: Vec<Arc<dyn Participant>> = vec![Arc::new(Echo("a")), Arc::new(Echo("b"))];
        let manager = GroupChatManager::new(GroupChat::new(agents, 0));
        let outcome = manager.run_chat(&ChatMessage::new("a", "start"), "a").unwrap();
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.messages_added, 1);
        assert_eq!(outcome.termination, TerminationReason::MaxRoundReached);
        assert_eq!(manager.messages()[0].content, "start");
    }

    #[test]
    fn unknown_sender_is_rejected() {
        let manager = GroupChatManager::new(chat());
        let err = manager.run_chat(&ChatMessage::new("z", "hi"), "z").unwrap_err();
        assert!(matches!(err, ConversationError::UnknownParticipant(name) if name == "z"));
    }
}
