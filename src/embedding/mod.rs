//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`OpenAiEmbedder`]**: any OpenAI-compatible `POST {url}/embeddings`
//!   endpoint (api.openai.com, api.x.ai) with batching, retry, and backoff.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalEmbedder`**: in-process fastembed models (feature
//!   `local-embeddings-fastembed`); no network calls after model download.
//!
//! Also provides [`cosine_similarity`] for ranking chunks against a query.
//!
//! # Provider Selection
//!
//! [`create_embedder`] resolves the configured [`EmbeddingKind`] once at
//! startup into a concrete provider. Nothing downstream branches on the kind.

#[cfg(feature = "local-embeddings-fastembed")]
mod local;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{EmbeddingConfig, EmbeddingKind};
use crate::error::{RagError, RagResult};
use crate::retry::send_with_retry;

#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalEmbedder;

/// Converts text into fixed-dimension vectors.
///
/// Every vector returned by one provider has length [`dims`](Self::dims);
/// the index checks this and refuses to mix dimensionalities.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per text in input order.
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmbeddingProvider("empty embedding response".to_string()))
    }
}

// ============ OpenAI-compatible ============

/// Embedding provider for OpenAI-compatible HTTP APIs.
///
/// The API key is read once from the environment variable named by
/// `embedding.api_key_env`.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> RagResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RagError::EmbeddingProvider(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: format!("{}/embeddings", config.base_url()),
            api_key,
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingItem>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch = texts.len(), "POST {}", self.url);

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = send_with_retry("Embedding API", self.max_retries, Duration::from_secs(1), || {
            self.client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
        })
        .await
        .map_err(RagError::EmbeddingProvider)?;

        let parsed: OpenAiEmbeddingResponse = response.json().await.map_err(|e| {
            RagError::EmbeddingProvider(format!("invalid embeddings response: {}", e))
        })?;

        let mut items = parsed.data;
        items.sort_by_key(|item| item.index);
        let vectors: Vec<Vec<f32>> = items.into_iter().map(|item| item.embedding).collect();
        check_count(texts.len(), vectors)
    }
}

// ============ Ollama ============

/// Embedding provider using a local Ollama instance (`POST /api/embed`).
///
/// Requires an embedding model to be pulled (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> RagResult<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.base_url(),
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/embed", self.base_url);
        debug!(model = %self.model, batch = texts.len(), "POST {}", url);

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = send_with_retry("Ollama embed", self.max_retries, Duration::from_secs(1), || {
            self.client.post(&url).json(&body).send()
        })
        .await
        .map_err(|e| {
            RagError::EmbeddingProvider(format!("{} (is Ollama running at {}?)", e, self.base_url))
        })?;

        let parsed: OllamaEmbedResponse = response.json().await.map_err(|e| {
            RagError::EmbeddingProvider(format!("invalid Ollama embed response: {}", e))
        })?;

        check_count(texts.len(), parsed.embeddings)
    }
}

fn check_count(expected: usize, vectors: Vec<Vec<f32>>) -> RagResult<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(RagError::EmbeddingProvider(format!(
            "expected {} embeddings, provider returned {}",
            expected,
            vectors.len()
        )));
    }
    Ok(vectors)
}

fn build_client(timeout_secs: u64) -> RagResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::EmbeddingProvider(format!("failed to build HTTP client: {}", e)))
}

/// Create the configured [`EmbeddingProvider`].
///
/// | `embedding.provider` | Provider |
/// |----------------------|----------|
/// | `"openai"` | [`OpenAiEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (requires `local-embeddings-fastembed`) |
pub fn create_embedder(config: &EmbeddingConfig) -> RagResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingKind::OpenAi => Arc::new(OpenAiEmbedder::new(config)?),
        EmbeddingKind::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        #[cfg(feature = "local-embeddings-fastembed")]
        EmbeddingKind::Local => Arc::new(LocalEmbedder::new(config)?),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        EmbeddingKind::Local => {
            return Err(RagError::EmbeddingProvider(
                "local embedding provider requires --features local-embeddings-fastembed"
                    .to_string(),
            ))
        }
    };

    info!(
        provider = ?config.provider,
        model = provider.model_name(),
        dims = provider.dims(),
        "embedding provider ready"
    );
    Ok(provider)
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty, zero-norm, or
/// different-length vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
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
    use crate::config::EmbeddingKind;

    fn ollama_config(url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: EmbeddingKind::Ollama,
            model: "nomic-embed-text".to_string(),
            dims: 768,
            url: Some(url.to_string()),
            api_key_env: "SPACEX_RAG_TEST_UNSET_KEY".to_string(),
            batch_size: 8,
            max_retries: 0,
            timeout_secs: 2,
        }
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_openai_requires_api_key() {
        let mut config = ollama_config("https://api.x.ai/v1");
        config.provider = EmbeddingKind::OpenAi;
        let err = create_embedder(&config).err().unwrap();
        assert!(err.to_string().contains("SPACEX_RAG_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_check_count_mismatch() {
        let err = check_count(2, vec![vec![1.0]]).unwrap_err();
        assert!(matches!(err, RagError::EmbeddingProvider(_)));
    }

    #[tokio::test]
    async fn test_ollama_unreachable_is_provider_error() {
        let embedder = create_embedder(&ollama_config("http://127.0.0.1:1")).unwrap();
        assert_eq!(embedder.dims(), 768);
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingProvider(_)));
        assert!(err.to_string().contains("is Ollama running"));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        let embedder = create_embedder(&ollama_config("http://127.0.0.1:1")).unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
