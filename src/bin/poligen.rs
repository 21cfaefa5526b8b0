use std::error::Error;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use poligen::human_io::{
    self, AskActionResponse, AskUserResponse, UiAction, UiReceiver, UiRequest,
};
use poligen::{on_human_message, on_session_start, PoliGenConfig};

// Run from the root folder of the repo as follows:
// OPENAI_API_KEY=your-open-ai-key-here cargo run --bin poligen
//
// Optional: POLIGEN_MODEL=gpt-4o POLIGEN_SPEAKER_SELECTION=auto RUST_LOG=poligen=debug

type Lines = Arc<Mutex<mpsc::UnboundedReceiver<String>>>;

const QUIT_COMMAND: &str = "\\quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    poligen::init_logger();

    let config = PoliGenConfig::from_env()?;
    let lines = spawn_stdin_reader();
    let (ui, requests) = human_io::channel();
    tokio::spawn(serve_ui(requests, lines.clone()));

    let mut session = on_session_start(config, ui).await?;

    loop {
        prompt(&format!("\n\nYou [type '{}' to leave]:", QUIT_COMMAND));
        let text = match lines.lock().await.recv().await {
            Some(line) => line,
            None => break,
        };
        let text = text.trim();
        if text == QUIT_COMMAND {
            break;
        }
        if text.is_empty() {
            println!("Input is empty. Try again.");
            continue;
        }

        match on_human_message(&mut session, text).await {
            Ok(outcome) => println!(
                "\n-- conversation paused after {} rounds ({:?}), {} messages so far --",
                outcome.rounds,
                outcome.termination,
                session.transcript().len()
            ),
            Err(e) => eprintln!("\nError: {}", e),
        }
    }
    Ok(())
}

fn prompt(text: &str) {
    println!("{}", text);
    let _ = io::stdout().flush();
}

/// Forward stdin line by line. The receiver yields `None` once stdin closes.
fn spawn_stdin_reader() -> Lines {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    Arc::new(Mutex::new(rx))
}

/// Console implementation of the UI side of the human I/O channel.
async fn serve_ui(mut requests: UiReceiver, lines: Lines) {
    while let Some(request) = requests.recv().await {
        match request {
            UiRequest::Publish { message, reply } => {
                println!("\n{}:\n{}", message.author, message.content);
                let _ = reply.send(());
            }
            UiRequest::AskUser {
                content,
                timeout,
                reply,
            } => {
                prompt(&format!("\n{} ({}s)", content, timeout.as_secs()));
                let content = match tokio::time::timeout(timeout, lines.lock().await.recv()).await
                {
                    Ok(line) => line,
                    Err(_) => {
                        println!("(no answer)");
                        None
                    }
                };
                let _ = reply.send(Some(AskUserResponse { content }));
            }
            UiRequest::AskAction {
                content,
                actions,
                reply,
            } => {
                let value = ask_action(&content, &actions, &lines).await;
                let _ = reply.send(Some(AskActionResponse { value: Some(value) }));
            }
        }
    }
}

async fn ask_action(content: &str, actions: &[UiAction], lines: &Lines) -> String {
    loop {
        println!("\n{}", content);
        for (i, action) in actions.iter().enumerate() {
            println!("  {}. {}", i + 1, action.label);
        }
        prompt("Choose by number or name:");

        let line = match lines.lock().await.recv().await {
            Some(line) => line,
            // Nobody is left to answer: end the conversation.
            None => return "exit".to_string(),
        };
        if let Some(action) = pick_action(line.trim(), actions) {
            return action.value.clone();
        }
        println!("Unknown choice '{}'.", line.trim());
    }
}

fn pick_action<'a>(choice: &str, actions: &'a [UiAction]) -> Option<&'a UiAction> {
    match choice.parse::<usize>() {
        Ok(n) if n >= 1 => actions.get(n - 1),
        Ok(_) => None,
        Err(_) => actions
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(choice) || a.value.eq_ignore_ascii_case(choice)),
    }
}
