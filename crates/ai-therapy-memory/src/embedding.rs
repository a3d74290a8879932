//! Text embeddings via a remote provider, plus vector similarity.

use crate::error::RemoteError;
use crate::retry::{RetryConfig, retry_with_backoff};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default OpenAI embeddings endpoint root.
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
/// Inputs per request; the API accepts up to 2048.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Timeout for a single embedding request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
/// Remote embedding service: one request, one vector per input in order.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed every input string in a single request.
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f64>>, RemoteError>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
    #[serde(default)]
    index: usize,
}

/// OpenAI-compatible embeddings client.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbeddingProvider {
    /// Create a provider using the default model and endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
        })
    }

    /// Use a different embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a proxy or compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f64>>, RemoteError> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                input: &input,
                model: &self.model,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Request(format!(
                "embedding API error (status {}): {body}",
                status.as_u16()
            )));
        }

        let mut parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|err| RemoteError::Request(format!("invalid embedding response: {err}")))?;
        if parsed.data.is_empty() {
            return Err(RemoteError::Request(
                "no embedding data returned".to_string(),
            ));
        }
        parsed.data.sort_by_key(|data| data.index);
        Ok(parsed.data.into_iter().map(|data| data.embedding).collect())
    }
}

/// Embedding front-end: retries single calls and batches large inputs.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    retry: RetryConfig,
    batch_size: usize,
}

impl Embedder {
    /// Create an embedder with default retry settings and batch size.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Replace the retry settings.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the per-request chunk size (minimum 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed a single text.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f64>, RemoteError> {
        let input = vec![text.to_string()];
        let vectors = retry_with_backoff(
            || self.provider.embed(input.clone()),
            &self.retry,
            "embedding",
        )
        .await?;
        let embedding = vectors.into_iter().next().ok_or_else(|| {
            RemoteError::NonRetryable {
                operation: "embedding".to_string(),
                message: "no embedding data returned".to_string(),
            }
        })?;
        debug!("embedded text (chars={}, dims={})", text.chars().count(), embedding.len());
        Ok(embedding)
    }

    /// Embed many texts, one request per chunk, results in input order.
    ///
    /// Any failing chunk aborts the whole batch.
    pub async fn batch_embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, RemoteError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (chunk_index, chunk) in texts.chunks(self.batch_size).enumerate() {
            let input = chunk.to_vec();
            let vectors = retry_with_backoff(
                || self.provider.embed(input.clone()),
                &self.retry,
                "batch embedding",
            )
            .await?;
            if vectors.len() != chunk.len() {
                return Err(RemoteError::NonRetryable {
                    operation: "batch embedding".to_string(),
                    message: format!(
                        "chunk {chunk_index} returned {} vectors for {} inputs",
                        vectors.len(),
                        chunk.len()
                    ),
                });
            }
            embeddings.extend(vectors);
        }
        debug!(
            "embedded batch (inputs={}, batch_size={})",
            texts.len(),
            self.batch_size
        );
        Ok(embeddings)
    }
}

/// Cosine similarity in [-1, 1]; 0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::{EmbeddingProvider, Embedder, cosine_similarity};
    use crate::error::RemoteError;
    use crate::retry::RetryConfig;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    /// Encodes each input as `[len]` and records request sizes.
    #[derive(Default)]
    struct LengthProvider {
        requests: Mutex<Vec<usize>>,
        fail_on_request: Option<usize>,
    }

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f64>>, RemoteError> {
            let mut requests = self.requests.lock();
            if self.fail_on_request == Some(requests.len()) {
                return Err(RemoteError::request("status 400: bad input"));
            }
            requests.push(input.len());
            Ok(input.iter().map(|text| vec![text.len() as f64]).collect())
        }
    }

    fn embedder(provider: Arc<LengthProvider>) -> Embedder {
        Embedder::new(provider).with_retry(RetryConfig {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        })
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.3, -1.2, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_defaults_to_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_negative_one() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn batch_splits_into_chunks_and_keeps_order() {
        let provider = Arc::new(LengthProvider::default());
        let embedder = embedder(provider.clone()).with_batch_size(2);
        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|text| text.to_string())
            .collect();

        let vectors = embedder.batch_embed_texts(&texts).await.expect("batch");
        assert_eq!(
            vectors,
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]]
        );
        assert_eq!(*provider.requests.lock(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn batch_error_aborts_whole_batch() {
        let provider = Arc::new(LengthProvider {
            fail_on_request: Some(1),
            ..LengthProvider::default()
        });
        let embedder = embedder(provider).with_batch_size(1);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let err = embedder.batch_embed_texts(&texts).await.unwrap_err();
        assert!(matches!(err, RemoteError::NonRetryable { .. }));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let provider = Arc::new(LengthProvider::default());
        let vectors = embedder(provider.clone())
            .batch_embed_texts(&[])
            .await
            .expect("batch");
        assert!(vectors.is_empty());
        assert!(provider.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn embed_text_returns_first_vector() {
        let provider = Arc::new(LengthProvider::default());
        let vector = embedder(provider).embed_text("hello").await.expect("embed");
        assert_eq!(vector, vec![5.0]);
    }
}
