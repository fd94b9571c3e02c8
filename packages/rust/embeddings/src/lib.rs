//! Embedding client for the embedding-cosine similarity strategy.
//!
//! Talks to OpenAI-compatible `/embeddings` endpoints: bearer auth, batched
//! requests, and retry with exponential backoff on 429/5xx and transient
//! transport errors. Vectors come back in input order.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use corpusmerge_shared::{CorpusMergeError, Document, EmbeddingConfig, Result};

/// User-Agent string for embedding requests.
const USER_AGENT: &str = concat!("corpusmerge/", env!("CARGO_PKG_VERSION"));

/// Async embeddings client.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    batch_size: usize,
    max_retries: usize,
    retry_base: Duration,
}

impl EmbeddingClient {
    /// Build a client from config and an API key.
    pub fn new(api_key: &str, config: &EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        if api_key.trim().is_empty() {
            return Err(CorpusMergeError::config("missing embedding API key"));
        }
        if config.model.trim().is_empty() {
            return Err(CorpusMergeError::config("missing embedding model name"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| CorpusMergeError::config(format!("invalid API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| CorpusMergeError::Embedding(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(500),
        })
    }

    /// Override the first retry delay (doubles per attempt).
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// Embed every document's text, in document order.
    #[instrument(skip_all, fields(documents = documents.len(), model = %self.model))]
    pub async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(documents.len());
        let batches = documents.len().div_ceil(self.batch_size);

        for (i, batch) in documents.chunks(self.batch_size).enumerate() {
            let inputs: Vec<&str> = batch.iter().map(|d| d.text.as_str()).collect();
            debug!(batch = i + 1, batches, size = inputs.len(), "embedding batch");
            vectors.extend(self.embed_batch(&inputs).await?);
        }

        info!(vectors = vectors.len(), "embeddings fetched");
        Ok(vectors)
    }

    /// Embed one batch (at most `batch_size` inputs).
    pub async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if inputs.len() > self.batch_size {
            return Err(CorpusMergeError::Embedding(format!(
                "batch of {} exceeds configured max {}",
                inputs.len(),
                self.batch_size
            )));
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
                            CorpusMergeError::Embedding(format!("failed to parse response: {e}"))
                        })?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != inputs.len() {
                            return Err(CorpusMergeError::Embedding(format!(
                                "service returned {} embeddings for {} inputs",
                                parsed.data.len(),
                                inputs.len()
                            )));
                        }
                        return Ok(parsed.data.into_iter().map(|e| e.embedding).collect());
                    }

                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(%status, attempt, "embedding request failed, retrying");
                        tokio::time::sleep(self.retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(CorpusMergeError::Embedding(format!(
                        "request failed ({status}): {body}"
                    )));
                }
                Err(err) => {
                    if is_retryable(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(error = %err, attempt, "embedding request error, retrying");
                        tokio::time::sleep(self.retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(CorpusMergeError::Embedding(format!("request error: {err}")));
                }
            }
        }
    }

    fn retry_backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.retry_base * (1 << capped)
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
