pub mod conversation;
pub mod state;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::backend::{
    Backend, BackendError, ChatMessage, FilePayload, IngestResponse, QueryResponse,
    StatusResponse,
};

pub use conversation::Conversation;
pub use state::{ErrorScope, LoadingFlags, OpClass, Outcome, Outcomes, SessionState};

/// Result of a finished backend call, applied to whatever the state is when
/// it arrives.
#[derive(Debug)]
pub enum Completion {
    Ingest(Result<IngestResponse, BackendError>),
    Clear(Result<(), BackendError>),
    Query(Result<QueryResponse, BackendError>),
    Status(Result<StatusResponse, BackendError>),
}

impl Completion {
    pub fn class(&self) -> OpClass {
        match self {
            Completion::Ingest(_) => OpClass::Ingest,
            Completion::Clear(_) => OpClass::Clear,
            Completion::Query(_) => OpClass::Query,
            Completion::Status(_) => OpClass::Status,
        }
    }
}

/// What happened to a user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Started,
    /// The same operation class is still waiting on the backend.
    AlreadyInFlight,
    /// Nothing to send (no files, blank question).
    Skipped,
}

/// Turns user actions into backend calls and owns all session state.
///
/// Entry points only flip the class into its in-flight state and spawn the
/// call onto the tokio runtime; results come back as [`Completion`]s that the
/// owner drains with [`next_completion`](Self::next_completion),
/// [`settle`](Self::settle) or [`poll_completions`](Self::poll_completions).
/// Entry points must be called from within a tokio runtime.
pub struct SessionController<B: Backend> {
    backend: Arc<B>,
    state: SessionState,
    refresh_pending: bool,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    snapshots: watch::Sender<SessionState>,
}

impl<B: Backend> SessionController<B> {
    pub fn new(backend: B) -> Self {
        Self::with_shared(Arc::new(backend))
    }

    pub fn with_shared(backend: Arc<B>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(SessionState::default());
        Self {
            backend,
            state: SessionState::default(),
            refresh_pending: false,
            completions_tx,
            completions_rx,
            snapshots,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Receives a copy of the state after every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.snapshots.subscribe()
    }

    // ── Entry points ──

    pub fn ingest(&mut self, files: Vec<FilePayload>) -> Trigger {
        if files.is_empty() {
            tracing::debug!("ingest skipped: no files selected");
            return Trigger::Skipped;
        }
        if !self.begin(OpClass::Ingest) {
            return Trigger::AlreadyInFlight;
        }

        let backend = Arc::clone(&self.backend);
        self.spawn(async move { Completion::Ingest(backend.ingest(files).await) });
        Trigger::Started
    }

    /// Appends the question to the transcript right away; a failed answer
    /// leaves it there.
    pub fn ask(&mut self, question: &str) -> Trigger {
        let question = question.trim().to_string();
        if question.is_empty() {
            tracing::debug!("query skipped: blank question");
            return Trigger::Skipped;
        }
        if self.state.is_loading(OpClass::Query) {
            return Trigger::AlreadyInFlight;
        }

        // History is everything before this question.
        let history: Vec<ChatMessage> = self.state.conversation.messages().to_vec();
        self.state.begin(OpClass::Query);
        self.state.conversation.append(ChatMessage::user(question.clone()));
        self.publish();

        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            Completion::Query(backend.query(&question, &history).await)
        });
        Trigger::Started
    }

    pub fn clear(&mut self) -> Trigger {
        if !self.begin(OpClass::Clear) {
            return Trigger::AlreadyInFlight;
        }

        let backend = Arc::clone(&self.backend);
        self.spawn(async move { Completion::Clear(backend.clear().await) });
        Trigger::Started
    }

    pub fn refresh_status(&mut self) -> Trigger {
        if !self.begin(OpClass::Status) {
            return Trigger::AlreadyInFlight;
        }

        let backend = Arc::clone(&self.backend);
        self.spawn(async move { Completion::Status(backend.status().await) });
        Trigger::Started
    }

    // ── Completion handling ──

    /// Wait for the next in-flight call to resolve and apply it. Returns
    /// `None` straight away when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<OpClass> {
        if !self.state.loading.any() {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        let class = completion.class();
        self.apply(completion);
        Some(class)
    }

    /// Drive every in-flight call, including follow-up refreshes, to Idle.
    pub async fn settle(&mut self) {
        while self.next_completion().await.is_some() {}
    }

    /// Apply whatever has already resolved without waiting.
    pub fn poll_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, completion: Completion) {
        let class = completion.class();
        match completion {
            Completion::Ingest(Ok(resp)) => {
                tracing::info!(
                    files = resp.results.len(),
                    total_chunks = resp.total_chunks,
                    "ingest complete"
                );
                for failed in resp.failures() {
                    tracing::warn!(
                        filename = %failed.filename,
                        error = failed.error.as_deref().unwrap_or_default(),
                        "backend could not index file"
                    );
                }
                self.state.last_ingest = Some(resp);
                self.state.succeed(class);
                self.publish();
                self.schedule_refresh();
            }
            Completion::Clear(Ok(())) => {
                tracing::info!("index cleared");
                self.state.conversation.reset();
                self.state.last_ingest = None;
                self.state.succeed(class);
                self.publish();
                self.schedule_refresh();
            }
            Completion::Query(Ok(resp)) => {
                tracing::debug!(sources = resp.sources.len(), "answer received");
                self.state
                    .conversation
                    .append(ChatMessage::assistant(resp.answer, resp.sources));
                self.state.succeed(class);
                self.publish();
                self.schedule_refresh();
            }
            Completion::Status(Ok(status)) => {
                self.state.status = Some(status);
                self.state.succeed(class);
                self.publish();
                self.run_pending_refresh();
            }
            Completion::Ingest(Err(err))
            | Completion::Clear(Err(err))
            | Completion::Query(Err(err))
            | Completion::Status(Err(err)) => {
                tracing::warn!(op = %class, kind = ?err.kind(), error = %err, "backend call failed");
                self.state.fail(class, err.to_string());
                self.publish();
                if class == OpClass::Status {
                    self.run_pending_refresh();
                }
            }
        }
    }

    /// Follow-up refresh after a mutation. If one is already running its
    /// result may predate the mutation, so queue exactly one more.
    fn schedule_refresh(&mut self) {
        if self.refresh_status() == Trigger::AlreadyInFlight {
            self.refresh_pending = true;
        }
    }

    fn run_pending_refresh(&mut self) {
        if std::mem::take(&mut self.refresh_pending) {
            self.refresh_status();
        }
    }

    fn begin(&mut self, class: OpClass) -> bool {
        if self.state.is_loading(class) {
            tracing::debug!(op = %class, "ignored: already in flight");
            return false;
        }
        self.state.begin(class);
        self.publish();
        true
    }

    fn spawn<F>(&self, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            // Receiver is gone only once the controller is dropped.
            let _ = tx.send(call.await);
        });
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.state.clone());
    }
}
