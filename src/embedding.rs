//! OpenAI embeddings client.
//!
//! [`OpenAIEmbedder`] implements the core [`Embedder`] trait against
//! `POST {base_url}/embeddings`. Inputs are sent in requests of at most
//! `embedding.batch_size` values; vectors come back in input order and token
//! usage is summed over the requests.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5), up to `max_retries`

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use docsync_core::embedding::{EmbedResponse, Embedder};

use crate::config::EmbeddingConfig;

/// Build the embedder selected by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAIEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embedding client for the OpenAI API.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    user: String,
    endpoint: String,
    batch_size: usize,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

impl OpenAIEmbedder {
    /// Create a client using the `OPENAI_API_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not set or empty.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            dims: config.dims,
            user: config.user.clone(),
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Base delay for the exponential backoff.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn embed_request(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, u64)> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "dimensions": self.dims,
            "user": self.user,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_delay * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: EmbeddingsResponse = response
                            .json()
                            .await
                            .context("Invalid OpenAI response")?;
                        return into_ordered(parsed, texts.len());
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "OpenAI request failed, retrying");
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "OpenAI request failed, retrying");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
    }
}

/// Place each vector at its `index` and check that every input got one.
fn into_ordered(response: EmbeddingsResponse, expected: usize) -> Result<(Vec<Vec<f32>>, u64)> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for datum in response.data {
        let slot = slots
            .get_mut(datum.index)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: index {} out of range", datum.index))?;
        *slot = Some(datum.embedding);
    }

    let embeddings = slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding {}", i)))
        .collect::<Result<Vec<_>>>()?;

    let tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0);
    Ok((embeddings, tokens))
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_many(&self, values: &[String]) -> Result<EmbedResponse> {
        let mut out = EmbedResponse::default();
        for chunk in values.chunks(self.batch_size) {
            debug!(inputs = chunk.len(), model = %self.model, "embedding request");
            let (embeddings, tokens) = self.embed_request(chunk).await?;
            out.embeddings.extend(embeddings);
            out.tokens += tokens;
        }
        Ok(out)
    }
}
