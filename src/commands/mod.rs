//! `kdesk` front-end. Each subcommand triggers controller entry points, waits
//! for them to settle and renders the resulting state.

pub mod chat;
pub mod knowledge;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::backend::{Backend, HttpBackend};
use crate::config::{ClientConfig, DEFAULT_BASE_URL};
use crate::session::{OpClass, SessionController, Trigger};

/// Ask questions about your documents.
#[derive(Parser)]
#[command(name = "kdesk", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base address of the document backend.
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    pub backend_url: String,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, default_value_t = 120)]
    pub timeout_secs: u64,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload documents to the index.
    Ingest {
        /// Files to upload (.txt .md .pdf .png .jpg .jpeg).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Upload files with other extensions too.
        #[arg(long)]
        any_extension: bool,
    },

    /// Ask a single question.
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Remove every indexed document.
    Clear,

    /// Show index status.
    Status,

    /// Show backend dependency checks.
    Health,

    /// Interactive question/answer session.
    Chat,
}

/// Output settings shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    fn spinner(&self, message: &'static str) -> ProgressBar {
        if self.json || self.quiet {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ClientConfig::new(&cli.backend_url)?
        .with_timeout(Duration::from_secs(cli.timeout_secs));
    let backend = HttpBackend::new(&config)?;
    let mut session = SessionController::new(backend);
    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Ingest {
            paths,
            any_extension,
        } => knowledge::ingest(&mut session, &paths, any_extension, out).await,
        Commands::Ask { question } => chat::ask(&mut session, &question.join(" "), out).await,
        Commands::Clear => knowledge::clear(&mut session, out).await,
        Commands::Status => knowledge::status(&mut session, out).await,
        Commands::Health => knowledge::health(&session, out).await,
        Commands::Chat => chat::interactive(&mut session, out).await,
    }
}

/// Wait for every in-flight call (and its follow-up refresh) with a spinner.
pub(crate) async fn settle<B: Backend>(
    session: &mut SessionController<B>,
    message: &'static str,
    out: Output,
) {
    let spinner = out.spinner(message);
    session.settle().await;
    spinner.finish_and_clear();
}

/// Message for a trigger that did not start a call.
pub(crate) fn refusal(class: OpClass, trigger: Trigger) -> Option<&'static str> {
    match (trigger, class) {
        (Trigger::Started, _) => None,
        (Trigger::AlreadyInFlight, OpClass::Ingest) => Some("an upload is already running"),
        (Trigger::AlreadyInFlight, OpClass::Clear) => Some("a clear is already running"),
        (Trigger::AlreadyInFlight, OpClass::Query) => Some("a question is already being answered"),
        (Trigger::AlreadyInFlight, OpClass::Status) => Some("a status refresh is already running"),
        (Trigger::Skipped, OpClass::Ingest) => Some("no files to upload"),
        (Trigger::Skipped, OpClass::Query) => Some("question is empty"),
        (Trigger::Skipped, _) => Some("nothing to do"),
    }
}
