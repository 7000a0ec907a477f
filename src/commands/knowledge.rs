use std::path::PathBuf;

use anyhow::{bail, Result};
use console::style;

use super::{refusal, settle, Output};
use crate::backend::upload::is_accepted;
use crate::backend::{Backend, FilePayload, IngestResponse, StatusResponse};
use crate::session::{ErrorScope, OpClass, Outcome, SessionController};

pub async fn ingest<B: Backend>(
    session: &mut SessionController<B>,
    paths: &[PathBuf],
    any_extension: bool,
    out: Output,
) -> Result<()> {
    let (accepted, rejected): (Vec<PathBuf>, Vec<PathBuf>) = paths
        .iter()
        .cloned()
        .partition(|p| any_extension || is_accepted(p));

    for path in &rejected {
        if !out.quiet {
            eprintln!(
                "  {} skipping {} (unsupported extension)",
                style("!").yellow(),
                path.display()
            );
        }
    }
    if accepted.is_empty() {
        bail!("no files to upload");
    }

    let files = FilePayload::read_all(&accepted).await?;
    if let Some(reason) = refusal(OpClass::Ingest, session.ingest(files)) {
        bail!(reason);
    }
    settle(session, "Uploading documents...", out).await;

    let state = session.state();
    let Some(report) = state.current_ingest() else {
        bail!(
            "{}",
            state.error(ErrorScope::Action).unwrap_or("upload failed")
        );
    };

    if out.json {
        let json = serde_json::json!({
            "ingest": report,
            "status": state.status,
            "error": state.action_error,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if !out.quiet {
        render_ingest(report);
        if let Some(status) = &state.status {
            render_status(status);
        }
    }

    // Upload went through; only the follow-up refresh can have failed.
    if let Some(err) = state.error(ErrorScope::Action) {
        bail!("{}", err);
    }
    Ok(())
}

pub async fn clear<B: Backend>(session: &mut SessionController<B>, out: Output) -> Result<()> {
    if let Some(reason) = refusal(OpClass::Clear, session.clear()) {
        bail!(reason);
    }
    settle(session, "Clearing index...", out).await;

    let state = session.state();
    if state.outcome(OpClass::Clear) != Some(Outcome::Succeeded) {
        bail!(
            "{}",
            state.error(ErrorScope::Action).unwrap_or("clear failed")
        );
    }

    if out.json {
        println!("{}", serde_json::to_string_pretty(&state.status)?);
    } else if !out.quiet {
        println!();
        println!("  {} Index cleared", style("✓").green());
        if let Some(status) = &state.status {
            render_status(status);
        }
    }

    // Index is gone; only the follow-up refresh can have failed.
    if let Some(err) = state.error(ErrorScope::Action) {
        bail!("{}", err);
    }
    Ok(())
}

pub async fn status<B: Backend>(session: &mut SessionController<B>, out: Output) -> Result<()> {
    if let Some(reason) = refusal(OpClass::Status, session.refresh_status()) {
        bail!(reason);
    }
    settle(session, "Fetching status...", out).await;

    let state = session.state();
    if let Some(err) = state.error(ErrorScope::Action) {
        bail!("{}", err);
    }
    let Some(status) = &state.status else {
        bail!("backend returned no status");
    };

    if out.json {
        println!("{}", serde_json::to_string_pretty(status)?);
    } else if !out.quiet {
        render_status(status);
    }
    Ok(())
}

pub async fn health<B: Backend>(session: &SessionController<B>, out: Output) -> Result<()> {
    let snapshot = session.backend().health().await?;

    if out.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    if out.quiet {
        return Ok(());
    }

    println!();
    println!("  {}", style("── Backend health ──").dim());
    for (name, check) in &snapshot {
        let mark = if check.ok {
            style("✓").green()
        } else {
            style("✗").red()
        };
        match &check.message {
            Some(message) => println!("  {} {:<16} {}", mark, name, style(message).dim()),
            None => println!("  {} {}", mark, name),
        }
    }
    println!();
    Ok(())
}

pub(crate) fn render_ingest(report: &IngestResponse) {
    println!();
    println!("  {}", style("── Upload ──").dim());
    for result in &report.results {
        match &result.error {
            Some(err) => println!(
                "  {} {}  {}",
                style("✗").red(),
                result.filename,
                style(err).red()
            ),
            None => println!(
                "  {} {}  {} chunks{}",
                style("✓").green(),
                result.filename,
                result.chunks_added,
                result
                    .file_type
                    .as_deref()
                    .map(|t| format!(" ({})", t))
                    .unwrap_or_default()
            ),
        }
    }
    println!("  Added:    {} chunks", style(report.total_chunks).bold());
}

pub(crate) fn render_status(status: &StatusResponse) {
    println!();
    println!("  {}", style("── Index ──").dim());
    println!("  Files:    {}", style(status.num_files).bold());
    println!("  Chunks:   {}", style(status.num_chunks).bold());
    println!("  Store:    {}", status.db_path);
    println!(
        "  Model:    {} / {}",
        status.llm_provider,
        style(&status.llm_model).cyan()
    );
    println!(
        "  GPU:      {}",
        if status.gpu_available {
            style("available").green()
        } else {
            style("not available").yellow()
        }
    );
    println!();
}
