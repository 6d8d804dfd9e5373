use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Application configuration, loaded from an optional TOML file.
///
/// Every field carries a default so the binary runs with zero
/// configuration — the demo workflow is fully parameterized by literals.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CinevecConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the persistent store.
    pub path: String,
    /// Collection the movie entries live in.
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "./cinevec_db".to_string(),
            collection: "movies".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Backend selector: "onnx" (local) or "http" (remote API).
    pub backend: String,
    /// Path to the ONNX model file; empty means the default location.
    pub onnx_model_path: String,
    pub onnx_dimensions: u32,
    /// Base URL of an OpenAI-compatible embeddings API.
    pub http_base_url: String,
    /// API key for the HTTP backend; when empty, the `CINEVEC_API_KEY`
    /// environment variable is used instead.
    pub http_api_key: String,
    pub http_model: String,
    pub http_dimensions: u32,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: "onnx".to_string(),
            onnx_model_path: String::new(),
            onnx_dimensions: crate::embeddings::MINILM_DIMENSIONS as u32,
            http_base_url: "https://api.openai.com".to_string(),
            http_api_key: String::new(),
            http_model: "text-embedding-3-small".to_string(),
            http_dimensions: 1536,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl CinevecConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = CinevecConfig::load("/nonexistent/cinevec.toml").unwrap();
        assert_eq!(config.store.path, "./cinevec_db");
        assert_eq!(config.store.collection, "movies");
        assert_eq!(config.embedding.backend, "onnx");
        assert_eq!(config.embedding.onnx_dimensions, 384);
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cinevec.toml");
        std::fs::write(
            &path,
            "[store]\npath = \"/tmp/movies_db\"\ncollection = \"films\"\n",
        )
        .unwrap();

        let config = CinevecConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.store.path, "/tmp/movies_db");
        assert_eq!(config.store.collection, "films");
        // Untouched section keeps its defaults.
        assert_eq!(config.embedding.backend, "onnx");
    }

    #[test]
    fn test_http_api_key_parses_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cinevec.toml");
        std::fs::write(
            &path,
            "[embedding]\nbackend = \"http\"\nhttp_api_key = \"key-from-file\"\n",
        )
        .unwrap();

        let config = CinevecConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.embedding.backend, "http");
        assert_eq!(config.embedding.http_api_key, "key-from-file");
    }
}
