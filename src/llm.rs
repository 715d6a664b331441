//! Chat-model backend abstraction.
//!
//! A [`ChatBackend`] is a synchronous-feeling, single-turn, text-in/text-out
//! completion call. Backends can fail (timeout, quota, connectivity); such
//! failures surface as [`Error::Generation`] and are always recoverable for
//! callers — the summarizer falls back to an offline document and the query
//! engine answers with a soft-error string. Every call runs under the
//! configured timeout, since the chat model is the only unbounded external
//! dependency in the pipeline.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Single-turn completion backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn model_name(&self) -> &str;

    /// One non-streaming completion call for one prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Instantiate the backend named in the configuration.
pub fn create_backend(config: &LlmConfig) -> Result<Box<dyn ChatBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledBackend)),
        "ollama" => Ok(Box::new(OllamaBackend::new(config)?)),
        "openai" => Ok(Box::new(OpenAiChatBackend::new(config)?)),
        other => Err(Error::Config(format!("unknown llm provider: {}", other))),
    }
}

// ============ Disabled backend ============

/// Backend that always fails; forces the deterministic degradation paths.
pub struct DisabledBackend;

#[async_trait]
impl ChatBackend for DisabledBackend {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(Error::Generation("chat backend is disabled".into()))
    }
}

// ============ Ollama backend ============

/// Local Ollama server, `POST {base_url}/api/chat`, non-streaming.
pub struct OllamaBackend {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, "ollama chat call");

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("ollama error {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| Error::Generation("malformed ollama response: missing message.content".into()))
    }
}

// ============ OpenAI chat backend ============

/// OpenAI chat completions API. Requires `OPENAI_API_KEY`.
pub struct OpenAiChatBackend {
    model: String,
    client: reqwest::Client,
}

impl OpenAiChatBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(Error::Config("OPENAI_API_KEY environment variable not set".into()));
        }
        Ok(Self {
            model: config.model.clone(),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Generation("OPENAI_API_KEY not set".into()))?;

        debug!(model = %self.model, "openai chat call");

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.2,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("openai error {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                Error::Generation("malformed openai response: missing message content".into())
            })
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::Generation(e.to_string()))
}
