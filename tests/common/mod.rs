#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use knowledge_desk_lib::backend::{
    Backend, BackendError, ChatMessage, FilePayload, HealthSnapshot, IngestFileResult,
    IngestResponse, QueryResponse, Source, StatusResponse,
};
use knowledge_desk_lib::session::OpClass;

/// In-memory stand-in for the document backend. Each non-empty line of an
/// uploaded file becomes one chunk.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    files: BTreeMap<String, u64>,
    answers: VecDeque<QueryResponse>,
    failures: HashMap<OpClass, VecDeque<BackendError>>,
    holds: HashMap<OpClass, oneshot::Receiver<()>>,
    calls: Vec<OpClass>,
    queries: Vec<(String, Vec<ChatMessage>)>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_answer(&self, answer: &str, sources: Vec<Source>) {
        self.inner.lock().unwrap().answers.push_back(QueryResponse {
            answer: answer.to_string(),
            sources,
        });
    }

    /// Make the next call of `class` fail with an HTTP error.
    pub fn fail_next(&self, class: OpClass, status: u16, detail: &str) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .entry(class)
            .or_default()
            .push_back(BackendError::Response {
                status,
                detail: Some(detail.to_string()),
            });
    }

    /// Park the next call of `class` until the returned sender fires.
    pub fn hold(&self, class: OpClass) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().unwrap().holds.insert(class, rx);
        tx
    }

    pub fn calls(&self) -> Vec<OpClass> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn queries(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.inner.lock().unwrap().queries.clone()
    }

    async fn enter(&self, class: OpClass) -> Result<(), BackendError> {
        let hold = {
            let mut store = self.inner.lock().unwrap();
            store.calls.push(class);
            store.holds.remove(&class)
        };
        if let Some(rx) = hold {
            let _ = rx.await;
        }

        let mut store = self.inner.lock().unwrap();
        match store.failures.get_mut(&class).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn ingest(&self, files: Vec<FilePayload>) -> Result<IngestResponse, BackendError> {
        self.enter(OpClass::Ingest).await?;

        let mut store = self.inner.lock().unwrap();
        let mut results = Vec::new();
        let mut total_chunks = 0;
        for file in files {
            let text = String::from_utf8_lossy(&file.bytes);
            let chunks = text.lines().filter(|l| !l.trim().is_empty()).count() as u64;
            *store.files.entry(file.filename.clone()).or_default() += chunks;
            total_chunks += chunks;
            results.push(IngestFileResult {
                filename: file.filename,
                file_type: None,
                chunks_added: chunks,
                error: None,
            });
        }
        Ok(IngestResponse {
            results,
            total_chunks,
        })
    }

    async fn query(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<QueryResponse, BackendError> {
        {
            let mut store = self.inner.lock().unwrap();
            store.queries.push((question.to_string(), history.to_vec()));
        }
        self.enter(OpClass::Query).await?;

        let mut store = self.inner.lock().unwrap();
        Ok(store.answers.pop_front().unwrap_or_else(|| QueryResponse {
            answer: format!("echo: {}", question),
            sources: Vec::new(),
        }))
    }

    async fn clear(&self) -> Result<(), BackendError> {
        self.enter(OpClass::Clear).await?;
        self.inner.lock().unwrap().files.clear();
        Ok(())
    }

    async fn status(&self) -> Result<StatusResponse, BackendError> {
        self.enter(OpClass::Status).await?;
        let store = self.inner.lock().unwrap();
        Ok(StatusResponse {
            num_files: store.files.len() as u64,
            num_chunks: store.files.values().sum(),
            db_path: "/tmp/chroma_db".to_string(),
            gpu_available: false,
            llm_provider: "ollama".to_string(),
            llm_model: "llama3.1:8b".to_string(),
        })
    }

    async fn health(&self) -> Result<HealthSnapshot, BackendError> {
        Ok(HealthSnapshot::new())
    }
}
