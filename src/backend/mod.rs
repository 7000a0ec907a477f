pub mod http;
pub mod upload;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpBackend;
pub use upload::FilePayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation. Only `role` and `content` are ever sent back
/// to the backend as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources: Some(sources),
        }
    }
}

/// Retrieval citation attached to an answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub chunk_index: Option<i64>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestFileResult {
    pub filename: String,
    #[serde(default)]
    pub file_type: Option<String>,
    pub chunks_added: u64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub results: Vec<IngestFileResult>,
    pub total_chunks: u64,
}

impl IngestResponse {
    /// Per-file results the backend could not index.
    pub fn failures(&self) -> impl Iterator<Item = &IngestFileResult> {
        self.results.iter().filter(|r| r.error.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Point-in-time snapshot of the backend index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub num_files: u64,
    pub num_chunks: u64,
    pub db_path: String,
    pub gpu_available: bool,
    pub llm_provider: String,
    pub llm_model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Dependency checks keyed by name (`ollama`, `llm_model`, `vector_db`, ...).
pub type HealthSnapshot = BTreeMap<String, HealthCheck>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Response,
    Decode,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to reach backend at {base_url}")]
    Transport {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend returned HTTP {status}{}", detail_suffix(.detail))]
    Response { status: u16, detail: Option<String> },
    #[error("malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {}", detail),
        None => String::new(),
    }
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Transport { .. } => ErrorKind::Transport,
            BackendError::Response { .. } => ErrorKind::Response,
            BackendError::Decode(_) => ErrorKind::Decode,
        }
    }
}

impl Serialize for BackendError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// The four index operations plus the health check, each a single-shot call.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn ingest(&self, files: Vec<FilePayload>) -> Result<IngestResponse, BackendError>;

    /// `history` is sent stripped to role and content.
    async fn query(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<QueryResponse, BackendError>;

    async fn clear(&self) -> Result<(), BackendError>;

    async fn status(&self) -> Result<StatusResponse, BackendError>;

    async fn health(&self) -> Result<HealthSnapshot, BackendError>;
}
