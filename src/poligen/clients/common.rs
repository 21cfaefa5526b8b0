use crate::client_wrapper::{ClientError, Message, TokenUsage};
use lazy_static::lazy_static;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

lazy_static! {
    /// One reqwest client per request timeout, so connections are reused across participants.
    static ref HTTP_CLIENTS: Mutex<HashMap<u64, reqwest::Client>> = Mutex::new(HashMap::new());
}

/// Get or create the shared HTTP client for the given request timeout.
///
/// The clients keep idle connections alive for 90 seconds and send TCP
/// keepalives every 60 seconds.
pub fn get_shared_http_client(request_timeout: Duration) -> Result<reqwest::Client, ClientError> {
    let mut pool = HTTP_CLIENTS.lock().unwrap_or_else(|p| p.into_inner());
    let key = request_timeout.as_secs();
    if let Some(client) = pool.get(&key) {
        return Ok(client.clone());
    }

    let client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(request_timeout)
        .build()?;

    pool.insert(key, client.clone());
    Ok(client)
}

/// Convert our messages into the shape expected by `openai_rust`.
pub fn to_chat_messages(messages: &[Message]) -> Vec<chat::Message> {
    let mut formatted = Vec::with_capacity(messages.len());
    for msg in messages {
        formatted.push(chat::Message {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        });
    }
    formatted
}

/// Send a chat request, record its usage, and return the assistant's content.
pub async fn send_and_track(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
    usage_slot: &Mutex<Option<TokenUsage>>,
) -> Result<String, ClientError> {
    let chat_arguments = chat::ChatArguments::new(model, formatted_msgs);

    match api.create_chat(chat_arguments, url_path).await {
        Ok(response) => {
            let usage = TokenUsage {
                input_tokens: response.usage.prompt_tokens as usize,
                output_tokens: response.usage.completion_tokens as usize,
                total_tokens: response.usage.total_tokens as usize,
            };
            *usage_slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(usage);

            match response.choices.first() {
                Some(choice) => Ok(choice.message.content.clone()),
                None => Err("OpenAI API returned no choices".into()),
            }
        }
        Err(err) => {
            log::error!(
                "poligen::clients::common::send_and_track(...): OpenAI API Error: {}",
                err
            );
            Err(format!("OpenAI API Error: {}", err).into())
        }
    }
}
