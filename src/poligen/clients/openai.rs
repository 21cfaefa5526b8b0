//! The `OpenAIClient` struct implements `ClientWrapper` for OpenAI's Chat API,
//! capturing both the assistant response and the token usage of the last call.
//!
//! # Example
//!
//! ```rust,no_run
//! use poligen::clients::openai::{Model, OpenAIClient};
//! use poligen::client_wrapper::{ClientWrapper, Message, Role};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let key = std::env::var("OPENAI_API_KEY")?;
//!     let client = OpenAIClient::new_with_model_enum(&key, Model::GPT4TurboPreview)?;
//!
//!     let reply = client
//!         .send_message(&[
//!             Message { role: Role::System, content: "You are terse.".into() },
//!             Message { role: Role::User, content: "Name one access control model.".into() },
//!         ])
//!         .await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use openai_rust2 as openai_rust;

use crate::client_wrapper::{ClientError, ClientWrapper, Message, Role, TokenUsage};
use crate::clients::common::{get_shared_http_client, send_and_track, to_chat_messages};

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Model identifiers the policy team is known to work well with.
pub enum Model {
    /// `gpt-4-turbo-preview` – the model the agent team was tuned on.
    GPT4TurboPreview,
    /// `gpt-4o` – Omni model, cheaper and faster.
    GPT4o,
    /// `gpt-4o-mini` – cost effective GPT-4o derivative, useful for drafts.
    GPT4oMini,
    /// `gpt-4.1` – general availability GPT-4.1.
    GPT41,
}

/// Convert a [`Model`] variant into the string identifier expected by the REST API.
pub fn model_to_string(model: Model) -> String {
    match model {
        Model::GPT4TurboPreview => "gpt-4-turbo-preview".to_string(),
        Model::GPT4o => "gpt-4o".to_string(),
        Model::GPT4oMini => "gpt-4o-mini".to_string(),
        Model::GPT41 => "gpt-4.1".to_string(),
    }
}

/// Client wrapper for OpenAI's Chat Completions API.
///
/// Failed requests are retried `max_retries` times, waiting `retry_wait` between
/// attempts.
pub struct OpenAIClient {
    client: openai_rust::Client,
    model: String,
    max_retries: usize,
    retry_wait: Duration,
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
    /// Construct a new client using the provided API key and [`Model`] variant.
    pub fn new_with_model_enum(secret_key: &str, model: Model) -> Result<Self, ClientError> {
        Self::new_with_model_string(secret_key, &model_to_string(model))
    }

    /// Construct a new client using the provided API key and explicit model name,
    /// with a 120 second request timeout.
    pub fn new_with_model_string(secret_key: &str, model_name: &str) -> Result<Self, ClientError> {
        Self::new_with_timeout(secret_key, model_name, Duration::from_secs(120))
    }

    /// Construct a client whose HTTP requests give up after `request_timeout`.
    pub fn new_with_timeout(
        secret_key: &str,
        model_name: &str,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = get_shared_http_client(request_timeout)?;
        Ok(OpenAIClient {
            client: openai_rust::Client::new_with_client(secret_key, http),
            model: model_name.to_string(),
            max_retries: 2,
            retry_wait: Duration::from_secs(10),
            token_usage: Mutex::new(None),
        })
    }

    /// Construct a client targeting a custom OpenAI compatible base URL.
    pub fn new_with_base_url(
        secret_key: &str,
        model_name: &str,
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = get_shared_http_client(request_timeout)?;
        Ok(OpenAIClient {
            client: openai_rust::Client::new_with_client_and_base_url(secret_key, http, base_url),
            model: model_name.to_string(),
            max_retries: 2,
            retry_wait: Duration::from_secs(10),
            token_usage: Mutex::new(None),
        })
    }

    /// Override the retry policy (builder pattern).
    pub fn with_retry(mut self, max_retries: usize, retry_wait: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_wait = retry_wait;
        self
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    async fn send_message(&self, messages: &[Message]) -> Result<Message, ClientError> {
        let mut attempt = 0;
        loop {
            let result = send_and_track(
                &self.client,
                &self.model,
                to_chat_messages(messages),
                Some(CHAT_COMPLETIONS_PATH.to_string()),
                &self.token_usage,
            )
            .await;

            match result {
                Ok(content) => {
                    return Ok(Message {
                        role: Role::Assistant,
                        content,
                    })
                }
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "OpenAIClient::send_message(...): attempt {} failed ({}), retrying in {:?}",
                        attempt,
                        err,
                        self.retry_wait
                    );
                    tokio::time::sleep(self.retry_wait).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
