pub mod config;
pub mod embeddings;
pub mod error;
pub mod models;
pub mod onnx_embedder;
pub mod store;
pub mod workflow;

pub use config::CinevecConfig;
pub use embeddings::{
    create_backend, BackendConfig, EmbeddingBackend, EmbeddingError, HttpEmbeddingClient,
    HttpEmbeddingConfig, OnnxConfig, MINILM_DIMENSIONS,
};
pub use error::CinevecError;
pub use models::{
    sample_movies, Metadata, MetadataFilter, MetadataValue, MovieRecord, QueryMatch, StoredEntry,
};
pub use onnx_embedder::OnnxEmbeddingClient;
pub use store::{Collection, StoreError, VectorStore};
