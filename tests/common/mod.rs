#![allow(dead_code)]

use async_trait::async_trait;
use poligen::client_wrapper::{ClientError, ClientWrapper, Message, Role, TokenUsage};
use poligen::human_io::{AskActionResponse, AskUserResponse, UiReceiver, UiRequest};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A request as the UI host saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Publish { author: String, content: String },
    AskUser { content: String, timeout: Duration },
    AskAction { content: String, actions: Vec<(String, String)> },
}

/// Answers for the scripted UI host, consumed in order.
///
/// Once a queue runs dry, choice prompts get `exit` and free-text prompts get
/// a result without content.
#[derive(Default)]
pub struct Script {
    actions: VecDeque<Option<AskActionResponse>>,
    texts: VecDeque<Option<AskUserResponse>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, value: &str) -> Self {
        self.actions.push_back(Some(AskActionResponse {
            value: Some(value.to_string()),
        }));
        self
    }

    /// A choice result that carries no selected value.
    pub fn action_none(mut self) -> Self {
        self.actions.push_back(Some(AskActionResponse { value: None }));
        self
    }

    /// "No result object" for the next choice prompt.
    pub fn action_gap(mut self) -> Self {
        self.actions.push_back(None);
        self
    }

    pub fn text(mut self, content: &str) -> Self {
        self.texts.push_back(Some(AskUserResponse {
            content: Some(content.to_string()),
        }));
        self
    }

    /// A result whose content is absent, as after a timeout.
    pub fn text_timeout(mut self) -> Self {
        self.texts.push_back(Some(AskUserResponse { content: None }));
        self
    }

    /// "No result object" for the next free-text prompt.
    pub fn text_gap(mut self) -> Self {
        self.texts.push_back(None);
        self
    }
}

/// Drain `requests`, record each one, then answer it from `script`.
pub fn spawn_ui(mut requests: UiReceiver, mut script: Script) -> Arc<Mutex<Vec<Seen>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            match request {
                UiRequest::Publish { message, reply } => {
                    log.lock().unwrap().push(Seen::Publish {
                        author: message.author,
                        content: message.content,
                    });
                    let _ = reply.send(());
                }
                UiRequest::AskUser {
                    content,
                    timeout,
                    reply,
                } => {
                    log.lock().unwrap().push(Seen::AskUser { content, timeout });
                    let answer = script
                        .texts
                        .pop_front()
                        .unwrap_or(Some(AskUserResponse { content: None }));
                    let _ = reply.send(answer);
                }
                UiRequest::AskAction {
                    content,
                    actions,
                    reply,
                } => {
                    let actions = actions.into_iter().map(|a| (a.value, a.label)).collect();
                    log.lock().unwrap().push(Seen::AskAction { content, actions });
                    let answer = script.actions.pop_front().unwrap_or(Some(AskActionResponse {
                        value: Some("exit".to_string()),
                    }));
                    let _ = reply.send(answer);
                }
            }
        }
    });
    seen
}

pub fn snapshot(seen: &Arc<Mutex<Vec<Seen>>>) -> Vec<Seen> {
    seen.lock().unwrap().clone()
}

pub fn publishes(seen: &[Seen]) -> Vec<(String, String)> {
    seen.iter()
        .filter_map(|s| match s {
            Seen::Publish { author, content } => Some((author.clone(), content.clone())),
            _ => None,
        })
        .collect()
}

/// Replies with a fixed text and counts its calls.
pub struct MockClient {
    pub reply: String,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<Vec<Message>>>,
    usage: Mutex<Option<TokenUsage>>,
}

impl MockClient {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            usage: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientWrapper for MockClient {
    async fn send_message(&self, messages: &[Message]) -> Result<Message, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(messages.to_vec());
        *self.usage.lock().unwrap() = Some(TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        });
        Ok(Message {
            role: Role::Assistant,
            content: self.reply.clone(),
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.usage)
    }
}

/// Signs each reply with the role named at the start of the system prompt,
/// e.g. `"Reviewer says hi"`.
pub struct RoleEchoClient;

#[async_trait]
impl ClientWrapper for RoleEchoClient {
    async fn send_message(&self, messages: &[Message]) -> Result<Message, ClientError> {
        let role = messages
            .first()
            .and_then(|m| m.content.split('.').next())
            .unwrap_or("")
            .to_string();
        Ok(Message {
            role: Role::Assistant,
            content: format!("{} says hi", role),
        })
    }

    fn model_name(&self) -> &str {
        "role-echo"
    }
}

/// Always fails.
pub struct FailingClient;

#[async_trait]
impl ClientWrapper for FailingClient {
    async fn send_message(&self, _messages: &[Message]) -> Result<Message, ClientError> {
        Err("service unavailable".into())
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}
