use anyhow::Result;
use clap::ValueEnum;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::panel::ContextChunk;

/// Response-generation strategy. The backend echoes the mode that actually
/// produced an answer, which may differ from the one requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Online,
    Offline,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Online => Mode::Offline,
            Mode::Offline => Mode::Online,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Online => "online",
            Mode::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub question: String,
    pub mode: Mode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub contexts: Option<Vec<ContextChunk>>,
}

impl ChatResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// One chat exchange. The body is decoded regardless of the HTTP status
    /// code: the backend reports failures through the `status` field of the
    /// JSON payload, and interpreting that field is the caller's job.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        Ok(response.json().await?)
    }

    /// Ask the backend to (re)build its document index.
    pub async fn ingest(&self) -> Result<IngestResponse> {
        let url = format!("{}/api/ingest", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Ok(response.json().await?)
    }
}
