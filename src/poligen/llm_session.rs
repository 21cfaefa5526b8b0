//! The `llm_session` module keeps the rolling history a single participant
//! sends to its LLM, together with real token accounting.
//!
//! **Key features:**
//! - **Automatic context trimming**: never exceed your `max_tokens` window.
//! - **History injection**: messages written by other participants are added
//!   with [`LLMSession::inject_message`] without calling the LLM.
//! - **Token tracking**: call `session.token_usage()` to get a `TokenUsage` struct.

use std::sync::Arc;

use crate::client_wrapper::{ClientError, ClientWrapper, Message, Role, TokenUsage};

/// A conversation session with an LLM, including:
///
/// - `client`: your `ClientWrapper` (e.g. `OpenAIClient`).
/// - `system_prompt`: the context-steering system message.
/// - `conversation_history`: all user & assistant messages (excluding system prompt).
/// - `max_tokens`: your configured context window size.
pub struct LLMSession {
    client: Arc<dyn ClientWrapper>,
    system_prompt: Message,
    conversation_history: Vec<Message>,
    max_tokens: usize,
    total_input_tokens: usize,
    total_output_tokens: usize,
    total_token_count: usize,
}

impl LLMSession {
    /// Creates a new `LLMSession` with the given client and system prompt.
    pub fn new(client: Arc<dyn ClientWrapper>, system_prompt: String, max_tokens: usize) -> Self {
        LLMSession {
            client,
            system_prompt: Message {
                role: Role::System,
                content: system_prompt,
            },
            conversation_history: Vec::new(),
            max_tokens,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_token_count: 0,
        }
    }

    /// Appends `content` and asks the LLM for a reply, see [`LLMSession::complete`].
    pub async fn send_message(
        &mut self,
        role: Role,
        content: String,
    ) -> Result<Message, ClientError> {
        self.conversation_history.push(Message { role, content });
        self.complete().await
    }

    /// Sends the system prompt plus the current history and records the reply.
    ///
    /// Pulls real token usage via `client.get_last_usage()` and prunes the oldest
    /// messages when the reported total exceeds `max_tokens`.
    pub async fn complete(&mut self) -> Result<Message, ClientError> {
        let mut request = Vec::with_capacity(self.conversation_history.len() + 1);
        request.push(self.system_prompt.clone());
        request.extend(self.conversation_history.iter().cloned());

        let response = self.client.send_message(&request).await?;

        if let Some(usage) = self.client.get_last_usage() {
            self.total_input_tokens += usage.input_tokens;
            self.total_output_tokens += usage.output_tokens;
            self.total_token_count = usage.total_tokens;

            if self.total_token_count > self.max_tokens {
                // How many tokens we're over by
                let mut excess = self.total_token_count - self.max_tokens;
                while excess > 0 && !self.conversation_history.is_empty() {
                    let msg = self.conversation_history.remove(0);
                    excess = excess.saturating_sub(estimate_message_token_count(&msg));
                }
            }
        }

        self.conversation_history.push(response.clone());
        Ok(response)
    }

    /// Add a message to the history without calling the LLM.
    pub fn inject_message(&mut self, role: Role, content: String) {
        self.conversation_history.push(Message { role, content });
    }

    /// Sets a new system prompt for the session.
    pub fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = Message {
            role: Role::System,
            content: prompt,
        };
    }

    pub fn system_prompt_text(&self) -> &str {
        &self.system_prompt.content
    }

    pub fn get_conversation_history(&self) -> &[Message] {
        &self.conversation_history
    }

    /// Forget every message but keep the system prompt and the token totals.
    pub fn clear_history(&mut self) {
        self.conversation_history.clear();
    }

    /// Returns the cumulative token usage statistics
    pub fn token_usage(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.total_input_tokens,
            output_tokens: self.total_output_tokens,
            total_tokens: self.total_input_tokens + self.total_output_tokens,
        }
    }

    pub fn client(&self) -> &Arc<dyn ClientWrapper> {
        &self.client
    }

    pub fn get_max_tokens(&self) -> usize {
        self.max_tokens
    }
}

/// Estimates the number of tokens in a string.
/// Uses an approximate formula: one token per 4 characters.
fn estimate_token_count(text: &str) -> usize {
    (text.len() / 4).max(1)
}

/// Estimates the number of tokens in a Message, including role annotations.
fn estimate_message_token_count(message: &Message) -> usize {
    1 + estimate_token_count(&message.content)
}
