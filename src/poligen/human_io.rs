//! Human I/O channel between the conversation and the chat UI.
//!
//! The conversation runs on a blocking worker thread; the UI lives on the async
//! runtime. Every interaction is a [`UiRequest`] pushed onto an unbounded
//! channel, carrying a one-shot slot for its reply. The worker blocks on that
//! slot; the UI host (console binary, test script, web front-end) drains the
//! channel with [`UiReceiver::recv`] and answers each request.
//!
//! ```text
//! worker thread                      UI host task
//!   UiHandle::blocking_ask_user ──▶  UiRequest::AskUser { reply }
//!         (blocks)                    ... operator types ...
//!   ◀──────────────────────────────  reply.send(Some(AskUserResponse))
//! ```
//!
//! A host may answer `None` ("no result object", e.g. the prompt was dismissed
//! by a reconnect). That is distinct from an [`AskUserResponse`] whose
//! `content` is `None`, which means the operator did not answer in time.
//! A host that drops the reply slot without answering is treated as `None`.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

/// A rendered chat message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiMessage {
    /// Author label displayed next to the message.
    pub author: String,
    /// Markdown body.
    pub content: String,
}

/// One selectable option of a choice prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiAction {
    pub name: String,
    /// Value returned in [`AskActionResponse::value`] when this option is chosen.
    pub value: String,
    /// Human-readable label, icon included.
    pub label: String,
}

impl UiAction {
    pub fn new(name: &str, value: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// Result of a free-text prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskUserResponse {
    /// `None` when the prompt timed out or the operator sent nothing.
    pub content: Option<String>,
}

/// Result of a choice prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskActionResponse {
    pub value: Option<String>,
}

/// A request the UI host must serve.
#[derive(Debug)]
pub enum UiRequest {
    /// Display a message. The host acknowledges once it has been shown.
    Publish {
        message: UiMessage,
        reply: oneshot::Sender<()>,
    },
    /// Ask the operator for free text, giving up after `timeout`.
    AskUser {
        content: String,
        timeout: Duration,
        reply: oneshot::Sender<Option<AskUserResponse>>,
    },
    /// Ask the operator to pick one of `actions`. No timeout.
    AskAction {
        content: String,
        actions: Vec<UiAction>,
        reply: oneshot::Sender<Option<AskActionResponse>>,
    },
}

/// The UI side of the channel went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiError {
    Closed,
}

impl fmt::Display for UiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiError::Closed => write!(f, "UI channel closed"),
        }
    }
}

impl Error for UiError {}

/// Sending half, cloned into every bridged participant.
#[derive(Clone, Debug)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiRequest>,
}

/// Receiving half, owned by the UI host.
pub struct UiReceiver {
    rx: mpsc::UnboundedReceiver<UiRequest>,
}

/// Create a connected handle / receiver pair.
pub fn channel() -> (UiHandle, UiReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiHandle { tx }, UiReceiver { rx })
}

impl UiReceiver {
    /// Next pending request, or `None` once every handle is dropped.
    pub async fn recv(&mut self) -> Option<UiRequest> {
        self.rx.recv().await
    }

    /// Non-blocking variant used by hosts that poll.
    pub fn try_recv(&mut self) -> Option<UiRequest> {
        self.rx.try_recv().ok()
    }
}

impl UiHandle {
    fn submit(&self, request: UiRequest) -> Result<(), UiError> {
        self.tx.send(request).map_err(|_| UiError::Closed)
    }

    fn publish_request(author: &str, content: &str) -> (UiRequest, oneshot::Receiver<()>) {
        let (reply, rx) = oneshot::channel();
        let request = UiRequest::Publish {
            message: UiMessage {
                author: author.to_string(),
                content: content.to_string(),
            },
            reply,
        };
        (request, rx)
    }

    /// Publish a message from async code and wait for the host to show it.
    pub async fn publish(&self, author: &str, content: &str) -> Result<(), UiError> {
        let (request, rx) = Self::publish_request(author, content);
        self.submit(request)?;
        rx.await.map_err(|_| UiError::Closed)
    }

    /// Publish from a blocking worker thread.
    ///
    /// Must not be called from inside an async task.
    pub fn blocking_publish(&self, author: &str, content: &str) -> Result<(), UiError> {
        let (request, rx) = Self::publish_request(author, content);
        self.submit(request)?;
        rx.blocking_recv().map_err(|_| UiError::Closed)
    }

    /// Issue one free-text prompt from a blocking worker thread.
    ///
    /// `Ok(None)` is the "no result object" case.
    pub fn blocking_ask_user(
        &self,
        content: &str,
        timeout: Duration,
    ) -> Result<Option<AskUserResponse>, UiError> {
        let (reply, rx) = oneshot::channel();
        self.submit(UiRequest::AskUser {
            content: content.to_string(),
            timeout,
            reply,
        })?;
        Ok(rx.blocking_recv().unwrap_or(None))
    }

    /// Issue one choice prompt from a blocking worker thread.
    pub fn blocking_ask_action(
        &self,
        content: &str,
        actions: &[UiAction],
    ) -> Result<Option<AskActionResponse>, UiError> {
        let (reply, rx) = oneshot::channel();
        self.submit(UiRequest::AskAction {
            content: content.to_string(),
            actions: actions.to_vec(),
            reply,
        })?;
        Ok(rx.blocking_recv().unwrap_or(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_waits_for_acknowledgement() {
        let (ui, mut host) = channel();
        let host_task = tokio::spawn(async move {
            match host.recv().await {
                Some(UiRequest::Publish { message, reply }) => {
                    let _ = reply.send(());
                    message
                }
                other => panic!("unexpected request: {:?}", other),
            }
        });

        ui.publish("User Proxy", "hello").await.unwrap();
        let shown = host_task.await.unwrap();
        assert_eq!(shown.author, "User Proxy");
        assert_eq!(shown.content, "hello");
    }

    #[tokio::test]
    async fn publish_fails_once_the_host_is_gone() {
        let (ui, host) = channel();
        drop(host);
        assert_eq!(ui.publish("a", "b").await, Err(UiError::Closed));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_reply_slot_reads_as_no_result() {
        let (ui, mut host) = channel();
        tokio::spawn(async move {
            // Drop the request, reply slot included.
            let _ = host.recv().await;
            // Keep the receiver alive so the send itself succeeds.
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let result = tokio::task::spawn_blocking(move || {
            ui.blocking_ask_user("anything?", Duration::from_secs(60))
        })
        .await
        .unwrap();
        assert_eq!(result, Ok(None));
    }
}
