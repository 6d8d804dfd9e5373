use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CinevecError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
