//! Persistent vector store — path-keyed collections over SQLite
//!
//! The store lives in a directory; inside it a single SQLite database holds
//! named collections of (id, metadata, embedding) entries. Embeddings are
//! persisted as little-endian f32 BLOBs and ranked in-process by cosine
//! similarity. Single-process access only; a mutex guards the connection.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, ErrorCode};
use thiserror::Error;

use crate::models::{Metadata, MetadataFilter, QueryMatch, StoredEntry};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS collections (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    dimensions  INTEGER,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    collection_id  INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    id             TEXT NOT NULL,
    metadata       TEXT NOT NULL,
    embedding      BLOB NOT NULL,
    created_at     TEXT NOT NULL,
    PRIMARY KEY (collection_id, id)
);
";

/// Errors for store lifecycle, insert, and query operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store unavailable at {path}: {reason}")]
    Unavailable { path: String, reason: String },

    #[error("duplicate id {id:?} in collection {collection:?}")]
    DuplicateId { id: String, collection: String },

    #[error("dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid embedding vector: {0}")]
    InvalidVector(String),

    #[error("invalid database value: {0}")]
    InvalidDbValue(String),

    #[error("store connection lock poisoned")]
    LockPoisoned,
}

/// Handle to a persistent store rooted at a filesystem directory.
#[derive(Debug, Clone)]
pub struct VectorStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl VectorStore {
    /// Open (or create) the store at `path`.
    ///
    /// The directory and database file are created if missing. Fails with
    /// `StoreError::Unavailable` when the path cannot be created or opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        std::fs::create_dir_all(&path).map_err(|e| StoreError::Unavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let db_file = path.join("cinevec.db");
        let conn = Connection::open(&db_file).map_err(|e| StoreError::Unavailable {
            path: db_file.display().to_string(),
            reason: e.to_string(),
        })?;

        conn.pragma_update(None, "foreign_keys", 1)?;
        conn.execute_batch(SCHEMA_SQL)?;

        tracing::debug!(path = %path.display(), "Opened vector store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Directory this store is rooted at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a collection by name, creating it if it does not exist.
    ///
    /// Idempotent: repeated calls with the same name address the same
    /// underlying collection.
    pub fn get_or_create_collection(&self, name: &str) -> Result<Collection, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;

        let created = conn.execute(
            "INSERT INTO collections (name, dimensions, created_at)
             VALUES (?1, NULL, ?2)
             ON CONFLICT(name) DO NOTHING",
            params![name, chrono::Utc::now().to_rfc3339()],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM collections WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if created > 0 {
            tracing::info!(collection = name, "Created collection");
        }

        Ok(Collection {
            conn: Arc::clone(&self.conn),
            id,
            name: name.to_string(),
        })
    }
}

/// Handle to a named collection within a [`VectorStore`].
#[derive(Debug, Clone)]
pub struct Collection {
    conn: Arc<Mutex<Connection>>,
    id: i64,
    name: String,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The collection's embedding dimensionality, fixed by the first add.
    /// `None` until something has been inserted.
    pub fn dimensions(&self) -> Result<Option<usize>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let dims: Option<i64> = conn.query_row(
            "SELECT dimensions FROM collections WHERE id = ?1",
            params![self.id],
            |row| row.get(0),
        )?;
        Ok(dims.map(|d| d as usize))
    }

    /// Number of entries stored in the collection.
    pub fn len(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection_id = ?1",
            params![self.id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Insert one or more entries in a single transaction.
    ///
    /// The first successful add fixes the collection's dimensionality;
    /// every later entry must match it. Re-inserting an existing id fails
    /// with `DuplicateId` and rolls back the whole batch.
    pub fn add(&self, entries: &[StoredEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        for entry in entries {
            validate_vector(&entry.embedding)?;
        }

        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let tx = conn.transaction()?;

        let mut dims: Option<usize> = tx
            .query_row(
                "SELECT dimensions FROM collections WHERE id = ?1",
                params![self.id],
                |row| row.get::<_, Option<i64>>(0),
            )?
            .map(|d| d as usize);

        let now = chrono::Utc::now().to_rfc3339();

        for entry in entries {
            match dims {
                Some(expected) if expected != entry.embedding.len() => {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        actual: entry.embedding.len(),
                    });
                }
                Some(_) => {}
                None => {
                    tx.execute(
                        "UPDATE collections SET dimensions = ?1 WHERE id = ?2",
                        params![entry.embedding.len() as i64, self.id],
                    )?;
                    dims = Some(entry.embedding.len());
                }
            }

            let metadata_json = serde_json::to_string(&entry.metadata)
                .map_err(|e| StoreError::InvalidDbValue(e.to_string()))?;

            let inserted = tx.execute(
                "INSERT INTO entries (collection_id, id, metadata, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    self.id,
                    entry.id,
                    metadata_json,
                    encode_embedding_blob(&entry.embedding),
                    now
                ],
            );

            if let Err(e) = inserted {
                if is_constraint_violation(&e) {
                    return Err(StoreError::DuplicateId {
                        id: entry.id.clone(),
                        collection: self.name.clone(),
                    });
                }
                return Err(e.into());
            }
        }

        tx.commit()?;
        tracing::info!(
            collection = %self.name,
            count = entries.len(),
            "Added entries to collection"
        );
        Ok(())
    }

    /// Top-k nearest entries by cosine similarity, nearest first.
    ///
    /// An optional filter restricts candidates to entries whose metadata
    /// equals every key/value pair of the predicate. Returns at most
    /// `n_results` matches; an empty collection yields an empty result.
    ///
    /// Ranking is a full scan: every row in the collection is decoded and
    /// scored per query, holding the connection lock throughout. No
    /// approximate index is maintained.
    pub fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        validate_vector(embedding)?;

        let Some(expected) = self.dimensions()? else {
            return Ok(Vec::new());
        };
        if embedding.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, metadata, embedding FROM entries WHERE collection_id = ?1",
        )?;

        let rows = stmt.query_map(params![self.id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut matches = Vec::new();
        for row in rows {
            let (id, metadata_json, blob) = row?;

            let metadata: Metadata = serde_json::from_str(&metadata_json)
                .map_err(|e| StoreError::InvalidDbValue(e.to_string()))?;

            if let Some(filter) = filter {
                if !filter.matches(&metadata) {
                    continue;
                }
            }

            let candidate = decode_embedding_blob(&blob, expected)?;
            let Some(score) = cosine_similarity(embedding, &candidate) else {
                continue;
            };

            matches.push(QueryMatch { id, metadata, score });
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(n_results);

        tracing::debug!(
            collection = %self.name,
            n_results,
            returned = matches.len(),
            filtered = filter.is_some(),
            "Similarity query"
        );

        Ok(matches)
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

fn validate_vector(vector: &[f32]) -> Result<(), StoreError> {
    if vector.is_empty() {
        return Err(StoreError::InvalidVector("vector is empty".to_string()));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(StoreError::InvalidVector(
            "vector contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

fn encode_embedding_blob(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding_blob(blob: &[u8], dimension: usize) -> Result<Vec<f32>, StoreError> {
    let expected_len = dimension * std::mem::size_of::<f32>();
    if blob.len() != expected_len {
        return Err(StoreError::InvalidDbValue(format!(
            "invalid embedding byte length: expected {expected_len}, got {}",
            blob.len()
        )));
    }

    let mut out = Vec::with_capacity(dimension);
    for chunk in blob.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            return Err(StoreError::InvalidDbValue(
                "embedding contains non-finite values".to_string(),
            ));
        }
        out.push(value);
    }
    Ok(out)
}

/// Cosine similarity in f64. `None` when either vector has zero norm.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += f64::from(x) * f64::from(y);
        norm_a += f64::from(x) * f64::from(x);
        norm_b += f64::from(y) * f64::from(y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

// ============================================================================
// TESTS
// ============================================================================
