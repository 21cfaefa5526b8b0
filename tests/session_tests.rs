mod common;

use common::{
    publishes, snapshot, spawn_ui, FailingClient, MockClient, RoleEchoClient, Script, Seen,
};
use poligen::agent::{ConversationError, Participant};
use poligen::bridge::render_relay;
use poligen::config::ConfigError;
use poligen::group_chat::{TerminationReason, MANAGER_NAME};
use poligen::human_io;
use poligen::prompts::{GREETING, STARTING_NOTICE, SYSTEM_AUTHOR};
use poligen::session::ERROR_AUTHOR;
use poligen::{
    on_human_message, on_session_start, on_session_start_with_client, PoliGenConfig, SessionError,
};
use std::sync::Arc;

const TASK_START: &str =
    "Write a policy document for the following cybersecurity domain: Data Classification.";

fn config() -> PoliGenConfig {
    PoliGenConfig {
        api_key: Some("sk-test".to_string()),
        ..PoliGenConfig::default()
    }
}

fn choice_count(seen: &[Seen]) -> usize {
    seen.iter()
        .filter(|s| matches!(s, Seen::AskAction { .. }))
        .count()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_start_greets_as_user_proxy() {
    let (ui, requests) = human_io::channel();
    let seen = spawn_ui(requests, Script::new());
    let ctx = on_session_start_with_client(config(), ui, Arc::new(RoleEchoClient))
        .await
        .unwrap();

    let names: Vec<_> = ctx.participants().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["User Proxy", "Reviewer", "Technical Writer"]);
    assert!(ctx.transcript().is_empty());
    assert_eq!(
        publishes(&snapshot(&seen)),
        vec![("User Proxy".to_string(), GREETING.to_string())]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_first_message_starts_the_policy_task() {
    let (ui, requests) = human_io::channel();
    let seen = spawn_ui(requests, Script::new().action("exit"));
    let mut ctx = on_session_start_with_client(config(), ui, Arc::new(RoleEchoClient))
        .await
        .unwrap();

    let outcome = on_human_message(&mut ctx, "Data Classification").await.unwrap();
    assert_eq!(outcome.termination, TerminationReason::NoReply);
    assert_eq!(outcome.rounds, 3);

    let transcript = ctx.transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[0].name, "User Proxy");
    assert_eq!(transcript[0].recipient, MANAGER_NAME);
    assert!(transcript[0].content.starts_with(TASK_START));
    assert_eq!(transcript[1].content, "Reviewer says hi");
    assert_eq!(transcript[2].content, "Technical Writer says hi");

    let shown = publishes(&snapshot(&seen));
    assert_eq!(shown[1], (SYSTEM_AUTHOR.to_string(), STARTING_NOTICE.to_string()));
    assert_eq!(shown[2].0, "User Proxy");
    assert!(shown[2]
        .1
        .starts_with(&format!("*Sending message to \"{}\":*\n\n{}", MANAGER_NAME, TASK_START)));
    assert_eq!(
        shown[3],
        (
            "Reviewer".to_string(),
            render_relay(MANAGER_NAME, "Reviewer says hi")
        )
    );
    assert_eq!(shown[4].0, "Technical Writer");
    assert_eq!(choice_count(&snapshot(&seen)), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_message_continues_the_conversation() {
    let (ui, requests) = human_io::channel();
    let seen = spawn_ui(requests, Script::new().action("exit").action("exit"));
    let mut ctx = on_session_start_with_client(config(), ui, Arc::new(RoleEchoClient))
        .await
        .unwrap();

    on_human_message(&mut ctx, "Data Classification").await.unwrap();
    let outcome = on_human_message(&mut ctx, "Add a retention section").await.unwrap();
    assert_eq!(outcome.messages_added, 3);

    let transcript = ctx.transcript();
    assert_eq!(transcript.len(), 6);
    assert_eq!(transcript[3].name, "User Proxy");
    assert_eq!(transcript[3].content, "Add a retention section");

    let shown = publishes(&snapshot(&seen));
    let notices = shown.iter().filter(|(_, c)| c == STARTING_NOTICE).count();
    assert_eq!(notices, 1);
    let tasks = shown.iter().filter(|(_, c)| c.contains(TASK_START)).count();
    assert_eq!(tasks, 1);
    assert!(shown.contains(&(
        "User Proxy".to_string(),
        render_relay(MANAGER_NAME, "Add a retention section")
    )));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_continue_choice_uses_the_proxy_llm() {
    let (ui, requests) = human_io::channel();
    let seen = spawn_ui(requests, Script::new().action("continue").action("exit"));
    let mut ctx = on_session_start_with_client(config(), ui, Arc::new(RoleEchoClient))
        .await
        .unwrap();

    let outcome = on_human_message(&mut ctx, "Remote Access").await.unwrap();
    assert_eq!(outcome.rounds, 6);
    assert_eq!(ctx.transcript()[3].name, "User Proxy");
    assert_eq!(ctx.transcript()[3].content, "User Proxy says hi");
    assert_eq!(choice_count(&snapshot(&seen)), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_feedback_choice_steers_the_team() {
    let (ui, requests) = human_io::channel();
    let script = Script::new()
        .action("feedback")
        .text("  Cover cloud storage too.  ")
        .action("exit");
    let seen = spawn_ui(requests, script);
    let client = MockClient::new("noted");
    let mut ctx = on_session_start_with_client(config(), ui, client.clone())
        .await
        .unwrap();

    on_human_message(&mut ctx, "Data Classification").await.unwrap();
    assert_eq!(ctx.transcript()[3].content, "Cover cloud storage too.");
    // Reviewer, writer, then both again after the feedback.
    assert_eq!(client.calls(), 4);
    let asked_for_feedback = snapshot(&seen).iter().any(|s| {
        matches!(s, Seen::AskUser { content, .. } if content == "Please provide your feedback:")
    });
    assert!(asked_for_feedback);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_round_limit_holds_for_a_session() {
    let (ui, requests) = human_io::channel();
    let script = Script::new().action("continue").action("continue").action("continue");
    spawn_ui(requests, script);
    let mut ctx = on_session_start_with_client(config(), ui, Arc::new(RoleEchoClient))
        .await
        .unwrap();

    let outcome = on_human_message(&mut ctx, "Data Classification").await.unwrap();
    assert_eq!(outcome.rounds, 10);
    assert_eq!(outcome.termination, TerminationReason::MaxRoundReached);
    assert_eq!(ctx.transcript().len(), 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_credential_is_reported() {
    let (ui, requests) = human_io::channel();
    let seen = spawn_ui(requests, Script::new());
    let config = PoliGenConfig {
        api_key: Some("   ".to_string()),
        ..PoliGenConfig::default()
    };

    let err = on_session_start(config, ui).await.err().unwrap();
    assert!(matches!(err, SessionError::Config(ConfigError::MissingApiKey)));

    let shown = publishes(&snapshot(&seen));
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].0, ERROR_AUTHOR);
    assert!(shown[0].1.contains("API key"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_llm_failure_is_returned() {
    let (ui, requests) = human_io::channel();
    spawn_ui(requests, Script::new());
    let mut ctx = on_session_start_with_client(config(), ui, Arc::new(FailingClient))
        .await
        .unwrap();

    let err = on_human_message(&mut ctx, "Data Classification").await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Conversation(ConversationError::Llm { .. })
    ));
    // The task made it into the transcript before the reviewer failed.
    assert_eq!(ctx.transcript().len(), 1);
}
