//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and two concrete providers:
//! - **[`DisabledProvider`]** — returns errors; used when embeddings are
//!   not configured.
//! - **[`OpenAiProvider`]** — calls an OpenAI-compatible embeddings API.
//!
//! A batch call preserves input order and length. Over-long inputs are
//! truncated deterministically rather than failing the batch. Backend
//! errors are local to the call: there is no retry or backoff, callers
//! abort the build that triggered the call.
//!
//! Also exports [`cosine_similarity`], the scoring primitive the vector
//! index is built on.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// A backend that maps text batches to fixed-dimension vectors.
///
/// Deterministic for a fixed model version; one vector per input, in
/// input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality; constant for the provider's lifetime.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, preserving length and order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Instantiate the provider named in the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        other => Err(Error::Config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Truncate a text to `max_chars` characters, deterministically.
pub fn truncate_input(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// ============ Disabled provider ============

/// No-op provider that always errors; used when embeddings are not
/// configured. Keeps query paths honest: semantic retrieval cannot run
/// without a real backend.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Embedding("embedding provider is disabled".into()))
    }
}

// ============ OpenAI-compatible provider ============

/// Provider for the `POST /v1/embeddings` API shape.
///
/// Requires `OPENAI_API_KEY` in the environment. Each call is a single
/// attempt under the configured timeout.
pub struct OpenAiProvider {
    model: String,
    dims: usize,
    max_input_chars: usize,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::Config("embedding.model required for openai provider".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| Error::Config("embedding.dims required for openai provider".into()))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(Error::Config("OPENAI_API_KEY environment variable not set".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Embedding(e.to_string()))?;

        Ok(Self {
            model,
            dims,
            max_input_chars: config.max_input_chars,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Embedding("OPENAI_API_KEY not set".into()))?;

        let input: Vec<String> = texts
            .iter()
            .map(|t| truncate_input(t, self.max_input_chars))
            .collect();

        debug!(batch = input.len(), model = %self.model, "embedding batch");

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&serde_json::json!({ "model": self.model, "input": input }))
            .send()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("API error {}: {}", status, body)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let vectors = parse_embeddings_response(&json)?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        Ok(vectors)
    }
}

fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Embedding("malformed response: missing data array".into()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let vector = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::Embedding("malformed response: missing embedding".into()))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vector);
    }

    Ok(embeddings)
}

// ============ Vector math ============

/// Cosine similarity in `[-1, 1]`; 0 for empty or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn truncation_is_deterministic_and_char_safe() {
        let text = "αβγδε".repeat(100);
        let a = truncate_input(&text, 7);
        let b = truncate_input(&text, 7);
        assert_eq!(a, b);
        assert_eq!(a.chars().count(), 7);

        assert_eq!(truncate_input("short", 100), "short");
    }

    #[tokio::test]
    async fn disabled_provider_errors() {
        let provider = DisabledProvider;
        let result = provider.embed(&["hello".to_string()]).await;
        assert!(matches!(result, Err(Error::Embedding(_))));
    }

    #[test]
    fn parse_response_extracts_vectors_in_order() {
        let json = serde_json::json!({
            "data": [
                { "index": 0, "embedding": [0.1, 0.2] },
                { "index": 1, "embedding": [0.3, 0.4] }
            ]
        });
        let vectors = parse_embeddings_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn parse_response_rejects_malformed() {
        assert!(parse_embeddings_response(&serde_json::json!({})).is_err());
        assert!(
            parse_embeddings_response(&serde_json::json!({ "data": [{ "no": 1 }] })).is_err()
        );
    }
}
