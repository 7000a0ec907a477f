use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::knowledge::{render_ingest, render_status};
use super::{refusal, settle, Output};
use crate::backend::{Backend, ChatMessage, FilePayload, Role, Source};
use crate::session::{ErrorScope, OpClass, Outcome, SessionController};

pub async fn ask<B: Backend>(
    session: &mut SessionController<B>,
    question: &str,
    out: Output,
) -> Result<()> {
    if let Some(reason) = refusal(OpClass::Query, session.ask(question)) {
        bail!(reason);
    }
    settle(session, "Thinking...", out).await;

    let state = session.state();
    if let Some(err) = state.error(ErrorScope::Query) {
        bail!("{}", err);
    }

    if out.json {
        println!("{}", serde_json::to_string_pretty(&state.conversation.last())?);
    } else if !out.quiet {
        if let Some(answer) = state.conversation.last() {
            render_message(answer);
        }
    }
    Ok(())
}

/// Slash commands understood by the interactive loop.
#[derive(Debug, PartialEq)]
enum ChatCommand {
    Ask(String),
    Ingest(Vec<PathBuf>),
    Status,
    Clear,
    Help,
    Quit,
    Unknown(String),
}

fn parse_line(line: &str) -> Option<ChatCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(ChatCommand::Ask(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let command = parts.next().unwrap_or_default();
    Some(match command {
        "ingest" => ChatCommand::Ingest(parts.map(PathBuf::from).collect()),
        "status" => ChatCommand::Status,
        "clear" => ChatCommand::Clear,
        "help" => ChatCommand::Help,
        "quit" | "exit" => ChatCommand::Quit,
        other => ChatCommand::Unknown(other.to_string()),
    })
}

pub async fn interactive<B: Backend>(session: &mut SessionController<B>, out: Output) -> Result<()> {
    // The loop always renders styled text.
    let out = Output { json: false, ..out };

    println!();
    println!(
        "  {} Ask about your documents. {} for commands.",
        style("?").cyan().bold(),
        style("/help").dim()
    );

    session.refresh_status();
    settle(session, "Connecting...", out).await;
    match (&session.state().status, session.state().error(ErrorScope::Action)) {
        (Some(status), _) => println!(
            "  {} files, {} chunks indexed",
            style(status.num_files).bold(),
            style(status.num_chunks).bold()
        ),
        (None, Some(err)) => print_error(err),
        (None, None) => {}
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n{} ", style(">").green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = parse_line(&line) else {
            continue;
        };

        match command {
            ChatCommand::Ask(question) => {
                if let Some(reason) = refusal(OpClass::Query, session.ask(&question)) {
                    print_error(reason);
                    continue;
                }
                settle(session, "Thinking...", out).await;
                match session.state().error(ErrorScope::Query) {
                    Some(err) => print_error(err),
                    None => {
                        if let Some(answer) = session.state().conversation.last() {
                            render_message(answer);
                        }
                    }
                }
            }
            ChatCommand::Ingest(paths) => {
                if paths.is_empty() {
                    print_error("usage: /ingest <file>...");
                    continue;
                }
                let files = match FilePayload::read_all(&paths).await {
                    Ok(files) => files,
                    Err(e) => {
                        print_error(&e.to_string());
                        continue;
                    }
                };
                if let Some(reason) = refusal(OpClass::Ingest, session.ingest(files)) {
                    print_error(reason);
                    continue;
                }
                settle(session, "Uploading documents...", out).await;
                let state = session.state();
                if let Some(report) = state.current_ingest() {
                    render_ingest(report);
                }
                if let Some(err) = state.error(ErrorScope::Action) {
                    print_error(err);
                } else if let Some(status) = &state.status {
                    render_status(status);
                }
            }
            ChatCommand::Status => {
                if let Some(reason) = refusal(OpClass::Status, session.refresh_status()) {
                    print_error(reason);
                    continue;
                }
                settle(session, "Fetching status...", out).await;
                let state = session.state();
                match (state.error(ErrorScope::Action), &state.status) {
                    (Some(err), _) => print_error(err),
                    (None, Some(status)) => render_status(status),
                    (None, None) => {}
                }
            }
            ChatCommand::Clear => {
                if let Some(reason) = refusal(OpClass::Clear, session.clear()) {
                    print_error(reason);
                    continue;
                }
                settle(session, "Clearing index...", out).await;
                let state = session.state();
                if state.outcome(OpClass::Clear) == Some(Outcome::Succeeded) {
                    println!("  {} Index and conversation cleared", style("✓").green());
                }
                if let Some(err) = state.error(ErrorScope::Action) {
                    print_error(err);
                }
            }
            ChatCommand::Help => print_help(),
            ChatCommand::Quit => break,
            ChatCommand::Unknown(name) => print_error(&format!("unknown command /{}", name)),
        }
    }

    Ok(())
}

fn render_message(message: &ChatMessage) {
    let label = match message.role {
        Role::User => style("you").green().bold(),
        Role::Assistant => style("assistant").cyan().bold(),
    };
    println!();
    println!("  {}", label);
    for line in message.content.lines() {
        println!("  {}", line);
    }

    let sources = message.sources.as_deref().unwrap_or_default();
    if !sources.is_empty() {
        println!();
        println!("  {}", style("── Sources ──").dim());
        for (i, source) in sources.iter().enumerate() {
            println!("  [{}] {}", i + 1, describe_source(source));
        }
    }
}

fn describe_source(source: &Source) -> String {
    let mut text = source
        .source_file
        .clone()
        .unwrap_or_else(|| "unknown source".to_string());
    if let Some(file_type) = &source.file_type {
        text.push_str(&format!(" ({})", file_type));
    }
    if let Some(index) = source.chunk_index {
        text.push_str(&format!(", chunk {}", index));
    }
    if let Some(score) = source.score {
        text.push_str(&format!(", score {:.2}", score));
    }
    text
}

fn print_error(message: &str) {
    eprintln!("  {} {}", style("✗").red(), style(message).red());
}

fn print_help() {
    println!();
    println!("  /ingest <file>...  upload documents");
    println!("  /status            show index status");
    println!("  /clear             remove all documents and start over");
    println!("  /quit              leave");
}
