use super::{
    Backend, BackendError, ChatMessage, FilePayload, HealthSnapshot, IngestResponse,
    QueryResponse, Role, StatusResponse,
};
use crate::config::{ClientConfig, ConfigError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
    history: Vec<HistoryItem<'a>>,
}

#[derive(Serialize)]
struct HistoryItem<'a> {
    role: Role,
    content: &'a str,
}

/// FastAPI puts a string here for `HTTPException` and a list for validation errors.
#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Gateway to the document backend over its REST contract.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn transport(&self, source: reqwest::Error) -> BackendError {
        BackendError::Transport {
            base_url: self.config.base_url().to_string(),
            source,
        }
    }

    /// Send the request and return the raw body of a 2xx response.
    async fn send(&self, req: RequestBuilder) -> Result<Vec<u8>, BackendError> {
        let resp = req.send().await.map_err(|e| self.transport(e))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| self.transport(e))?;

        if !status.is_success() {
            return Err(BackendError::Response {
                status: status.as_u16(),
                detail: extract_detail(&body),
            });
        }

        Ok(body.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, BackendError> {
        let body = self.send(req).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn extract_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn ingest(&self, files: Vec<FilePayload>) -> Result<IngestResponse, BackendError> {
        let url = self.config.endpoint("ingest");
        tracing::debug!(%url, files = files.len(), "uploading documents");

        let form = files.into_iter().fold(Form::new(), |form, file| {
            form.part("files", Part::bytes(file.bytes).file_name(file.filename))
        });

        self.send_json(self.client.post(url).multipart(form)).await
    }

    async fn query(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<QueryResponse, BackendError> {
        let url = self.config.endpoint("query");
        tracing::debug!(%url, history = history.len(), "sending question");

        let body = QueryRequest {
            question,
            history: history
                .iter()
                .map(|m| HistoryItem {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
        };

        self.send_json(self.client.post(url).json(&body)).await
    }

    async fn clear(&self) -> Result<(), BackendError> {
        let url = self.config.endpoint("clear");
        tracing::debug!(%url, "clearing index");

        // Success body is not part of the contract.
        self.send(self.client.post(url)).await?;
        Ok(())
    }

    async fn status(&self) -> Result<StatusResponse, BackendError> {
        let url = self.config.endpoint("status");
        tracing::debug!(%url, "fetching status");
        self.send_json(self.client.get(url)).await
    }

    async fn health(&self) -> Result<HealthSnapshot, BackendError> {
        let url = self.config.endpoint("health");
        tracing::debug!(%url, "fetching health");
        self.send_json(self.client.get(url)).await
    }
}
