//! Interactive chat mode with readline support.

use ac_core::{ChatView, Controller, Key, TurnOutcome, UiEvent};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tracing::info;

use crate::terminal::TerminalView;

/// Chat commands
#[derive(Debug, PartialEq, Eq)]
enum ChatCommand {
    Quit,
    Help,
    History,
    Examples,
    Example(usize),
    Message(String),
    Invalid(String),
}

fn parse_command(input: &str) -> ChatCommand {
    let trimmed = input.trim();

    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        return ChatCommand::Quit;
    }

    if !trimmed.starts_with('/') {
        return ChatCommand::Message(input.to_string());
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or_default();

    match cmd.as_str() {
        "/quit" | "/exit" | "/q" => ChatCommand::Quit,
        "/help" | "/?" => ChatCommand::Help,
        "/history" | "/h" => ChatCommand::History,
        "/examples" | "/ex" => ChatCommand::Examples,
        "/example" | "/e" => match arg.parse::<usize>() {
            Ok(n) if n > 0 => ChatCommand::Example(n),
            _ => ChatCommand::Invalid(format!("Usage: /example <number>, got {:?}", arg)),
        },
        _ => ChatCommand::Invalid(format!(
            "Unknown command: {}. Type /help for available commands.",
            cmd
        )),
    }
}

fn print_help() {
    println!(
        r#"
Chat Commands:
  /help, /?         Show this help message
  /quit, /exit      Exit chat mode (bare `quit` or `exit` also works)
  /history, /h      Show message count
  /examples, /ex    List example prompts
  /example N, /e N  Put example N into the input line

Tips:
  - Press Enter to send, Ctrl+D to exit
  - Up/Down arrows navigate input history
"#
    );
}

fn print_examples(examples: &[String]) {
    if examples.is_empty() {
        println!("No examples configured. Add `examples = [...]` to your config.\n");
        return;
    }
    println!("\nExamples:");
    for (i, example) in examples.iter().enumerate() {
        println!("  {}. {}", i + 1, example.trim());
    }
    println!();
}

/// Run interactive chat mode
pub async fn run_chat(controller: &mut Controller<TerminalView>, examples: &[String]) -> Result<()> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)?
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    println!("Chat mode started. Type /help for commands, /quit to exit.\n");

    loop {
        let initial = controller.view_mut().take_input();

        match rl.readline_with_initial("you> ", (initial.as_str(), "")) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }

                match parse_command(&line) {
                    ChatCommand::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    ChatCommand::Help => print_help(),
                    ChatCommand::History => {
                        let turns = controller.history().len();
                        println!("Messages in conversation: {}\n", turns);
                    }
                    ChatCommand::Examples => print_examples(examples),
                    ChatCommand::Example(n) => match examples.get(n - 1) {
                        Some(example) => {
                            controller
                                .handle(UiEvent::ExampleClicked(example.clone()))
                                .await;
                        }
                        None => eprintln!("No example #{} ({} configured).\n", n, examples.len()),
                    },
                    ChatCommand::Invalid(message) => eprintln!("{}\n", message),
                    ChatCommand::Message(text) => {
                        controller.view_mut().set_input_text(&text);
                        let outcome = controller.handle(UiEvent::KeyPress(Key::Enter)).await;
                        if !matches!(outcome, Some(TurnOutcome::Skipped) | None) {
                            controller.view_mut().finish_turn();
                        }
                        info!("Turn outcome: {:?}", outcome);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }

    Ok(())
}
