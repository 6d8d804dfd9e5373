//! Embedding backends for Cinevec — local and remote sentence embeddings
//!
//! Provides an `EmbeddingBackend` trait with implementations for:
//! - **ONNX** — local embeddings via `all-MiniLM-L6-v2` (384-dim), see
//!   [`crate::onnx_embedder`]
//! - **HTTP** — an OpenAI-compatible `/v1/embeddings` endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Embedding dimensions of `all-MiniLM-L6-v2`.
pub const MINILM_DIMENSIONS: usize = 384;

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding producers.
///
/// For a fixed model the mapping from text to vector is deterministic, so
/// stored vectors and query vectors are comparable as long as they come
/// from the same backend.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single non-empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a search query. Defaults to `embed()`; backends with separate
    /// document/query modes can override.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(text).await
    }

    /// Returns the embedding dimension (e.g. 384).
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Reject empty or whitespace-only input before it reaches a model.
pub(crate) fn ensure_nonempty(text: &str) -> Result<(), EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    Ok(())
}

// ============================================================================
// Error types
// ============================================================================

/// Embedding generation errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Input text is empty")]
    EmptyInput,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Response contained no embedding")]
    MissingEmbedding,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },

    #[error("ONNX model not found at {path}")]
    ModelNotFound { path: String },

    #[error("ONNX inference error: {0}")]
    OnnxInference(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
}

// ============================================================================
// Config types
// ============================================================================

/// HTTP embedding client configuration.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl HttpEmbeddingConfig {
    pub fn new(base_url: String, api_key: Option<String>, model: String, dimensions: usize) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("CINEVEC_API_KEY").ok())
            .unwrap_or_default();

        Self {
            base_url,
            api_key,
            model,
            dimensions,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// ONNX backend configuration.
#[derive(Debug, Clone)]
pub struct OnnxConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub dimensions: usize,
}

/// Configuration union for the backend factory.
pub enum BackendConfig {
    Http(HttpEmbeddingConfig),
    Onnx(OnnxConfig),
}

/// Create the appropriate backend from configuration.
pub fn create_backend(config: BackendConfig) -> Result<Box<dyn EmbeddingBackend>, EmbeddingError> {
    match config {
        BackendConfig::Http(c) => Ok(Box::new(HttpEmbeddingClient::new(c)?)),
        BackendConfig::Onnx(c) => Ok(Box::new(crate::onnx_embedder::OnnxEmbeddingClient::new(c)?)),
    }
}

// ============================================================================
// OpenAI-compatible API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// HttpEmbeddingClient
// ============================================================================

/// Remote embedding client for OpenAI-compatible `/v1/embeddings` APIs.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    client: Client,
    config: HttpEmbeddingConfig,
}

impl HttpEmbeddingClient {
    pub fn new(config: HttpEmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a client against a custom base URL (for testing / integration).
    pub fn with_base_url(
        mut config: HttpEmbeddingConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        config.base_url = base_url;
        Self::new(config)
    }

    /// Generate an embedding, retrying with exponential backoff on failure.
    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || self.embed_once(text)).await;

        match result {
            Ok(vec) => Ok(vec),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All embedding retry attempts failed"
                );
                Err(EmbeddingError::RetryExhausted {
                    attempts: self.config.max_retries,
                })
            }
        }
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/v1/embeddings", self.config.base_url);

        let request = EmbeddingsRequest {
            model: &self.config.model,
            input: vec![text],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Embeddings API error");

            return Err(EmbeddingError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingsResponse = response.json().await?;

        let values = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(EmbeddingError::MissingEmbedding)?;

        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        ensure_nonempty(text)?;
        self.embed_with_retry(text).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_DIMENSIONS: usize = 8;

    fn test_config() -> HttpEmbeddingConfig {
        HttpEmbeddingConfig {
            base_url: String::new(),
            api_key: "test-api-key".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: TEST_DIMENSIONS,
            max_retries: 3,
            retry_delay_ms: 10,
        }
    }

    fn mock_embedding_response() -> serde_json::Value {
        let values: Vec<f32> = (0..TEST_DIMENSIONS).map(|i| (i as f32) / 8.0).collect();
        serde_json::json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": values }],
            "model": "text-embedding-3-small"
        })
    }

    #[tokio::test]
    async fn test_embed_calls_api_and_returns_vector() {
        let mock_server = MockServer::start().await;
        let client = HttpEmbeddingClient::with_base_url(test_config(), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": ["hello world"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .mount(&mock_server)
            .await;

        let result = client.embed("hello world").await;

        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert_eq!(result.unwrap().len(), TEST_DIMENSIONS);
    }

    #[tokio::test]
    async fn test_embed_returns_error_on_api_500() {
        let mock_server = MockServer::start().await;
        let client = HttpEmbeddingClient::with_base_url(test_config(), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "Internal server error" }
            })))
            .mount(&mock_server)
            .await;

        let result = client.embed("hello world").await;

        assert!(result.is_err(), "Expected error on 500 response");
        match result {
            Err(EmbeddingError::RetryExhausted { attempts }) => {
                assert_eq!(attempts, 3, "Expected 3 retry attempts");
            }
            _ => panic!("Expected RetryExhausted error"),
        }
    }

    #[tokio::test]
    async fn test_embed_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client = HttpEmbeddingClient::with_base_url(test_config(), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .mount(&mock_server)
            .await;

        let result = client.embed("hello world").await;

        assert!(result.is_ok(), "Expected success after retry");
        assert_eq!(result.unwrap().len(), TEST_DIMENSIONS);
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_input_without_calling_api() {
        let mock_server = MockServer::start().await;
        let client = HttpEmbeddingClient::with_base_url(test_config(), mock_server.uri())
            .expect("Failed to create client");

        // No mock mounted — an API call would fail loudly.
        let result = client.embed("   ").await;

        match result {
            Err(EmbeddingError::EmptyInput) => {}
            other => panic!("Expected EmptyInput, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_embed_returns_error_on_wrong_dimensions() {
        let mock_server = MockServer::start().await;
        let client = HttpEmbeddingClient::with_base_url(test_config(), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "embedding": [0.1, 0.2, 0.3] }]
            })))
            .mount(&mock_server)
            .await;

        let result = client.embed("hello world").await;

        assert!(result.is_err(), "Expected error on wrong dimensions");
        match result {
            Err(EmbeddingError::InvalidDimensions { .. })
            | Err(EmbeddingError::RetryExhausted { .. }) => {}
            other => panic!("Expected InvalidDimensions or RetryExhausted, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_embed_returns_error_on_empty_data_array() {
        let mock_server = MockServer::start().await;
        let client = HttpEmbeddingClient::with_base_url(test_config(), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })),
            )
            .mount(&mock_server)
            .await;

        let result = client.embed("hello world").await;
        assert!(result.is_err(), "Expected error on empty data array");
    }

    #[test]
    fn test_http_config_prefers_explicit_api_key() {
        let config = HttpEmbeddingConfig::new(
            "https://api.example.com".to_string(),
            Some("key-from-config".to_string()),
            "text-embedding-3-small".to_string(),
            TEST_DIMENSIONS,
        );

        assert_eq!(config.api_key, "key-from-config");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[tokio::test]
    async fn test_backend_trait_object() {
        let mock_server = MockServer::start().await;
        let backend: Box<dyn EmbeddingBackend> = Box::new(
            HttpEmbeddingClient::with_base_url(test_config(), mock_server.uri()).unwrap(),
        );

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .mount(&mock_server)
            .await;

        let result = backend.embed_query("hello").await.unwrap();
        assert_eq!(result.len(), TEST_DIMENSIONS);
        assert_eq!(backend.dimensions(), TEST_DIMENSIONS);
        assert_eq!(backend.name(), "http");
    }
}
