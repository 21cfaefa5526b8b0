use poligen::client_wrapper::ClientWrapper;
use poligen::clients::common::get_shared_http_client;
use poligen::clients::openai::{model_to_string, Model, OpenAIClient};
use std::time::Duration;

#[test]
fn test_shared_http_client_builds_per_timeout() {
    // Same timeout twice hits the cache, a new one builds a second client.
    assert!(get_shared_http_client(Duration::from_secs(120)).is_ok());
    assert!(get_shared_http_client(Duration::from_secs(120)).is_ok());
    assert!(get_shared_http_client(Duration::from_secs(30)).is_ok());
}

#[test]
fn test_model_strings() {
    assert_eq!(model_to_string(Model::GPT4TurboPreview), "gpt-4-turbo-preview");
    assert_eq!(model_to_string(Model::GPT4o), "gpt-4o");
    assert_eq!(model_to_string(Model::GPT4oMini), "gpt-4o-mini");
    assert_eq!(model_to_string(Model::GPT41), "gpt-4.1");
}

#[tokio::test]
async fn test_multiple_clients_share_connection_pool() {
    // Participants of one session each get a client; all of them reuse the pooled HTTP client.
    let reviewer =
        OpenAIClient::new_with_model_enum("dummy_key_1", Model::GPT4TurboPreview).unwrap();
    let writer = OpenAIClient::new_with_model_string("dummy_key_2", "gpt-4o").unwrap();
    let proxy =
        OpenAIClient::new_with_timeout("dummy_key_3", "gpt-4o-mini", Duration::from_secs(120))
            .unwrap()
            .with_retry(0, Duration::from_secs(1));

    assert_eq!(reviewer.model_name(), "gpt-4-turbo-preview");
    assert_eq!(writer.model_name(), "gpt-4o");
    assert_eq!(proxy.model_name(), "gpt-4o-mini");
    assert!(proxy.get_last_usage().is_none());
}

#[tokio::test]
async fn test_custom_base_url_client() {
    let client = OpenAIClient::new_with_base_url(
        "dummy_key",
        "llama3",
        "http://localhost:11434",
        Duration::from_secs(60),
    )
    .unwrap();
    assert_eq!(client.model_name(), "llama3");
}
