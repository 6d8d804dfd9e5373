//! Workflow operations — the embed-store-query sequence
//!
//! `seed_movies` embeds each record's description and persists the entries;
//! `recommend` embeds a query and runs the similarity search. The CLI only
//! wires these to arguments and formats the output.

use crate::embeddings::EmbeddingBackend;
use crate::error::CinevecError;
use crate::models::{MetadataFilter, MovieRecord, QueryMatch, StoredEntry};
use crate::store::Collection;

/// Embed every movie description and add the entries to the collection.
///
/// Returns the number of entries inserted. Fails fast on the first
/// embedding or store error; a duplicate id rolls back the whole batch.
pub async fn seed_movies(
    collection: &Collection,
    backend: &dyn EmbeddingBackend,
    movies: &[MovieRecord],
) -> Result<usize, CinevecError> {
    let mut entries = Vec::with_capacity(movies.len());

    for movie in movies {
        let embedding = backend.embed(&movie.description).await?;
        tracing::debug!(id = %movie.id, title = %movie.title, "Embedded movie description");

        entries.push(StoredEntry {
            id: movie.id.clone(),
            metadata: movie.metadata(),
            embedding,
        });
    }

    collection.add(&entries)?;
    tracing::info!(
        collection = collection.name(),
        count = entries.len(),
        backend = backend.name(),
        "Seeded movie collection"
    );

    Ok(entries.len())
}

/// Embed `query` and return the top `n_results` nearest entries, optionally
/// restricted by a metadata equality filter.
pub async fn recommend(
    collection: &Collection,
    backend: &dyn EmbeddingBackend,
    query: &str,
    n_results: usize,
    filter: Option<&MetadataFilter>,
) -> Result<Vec<QueryMatch>, CinevecError> {
    let embedding = backend.embed_query(query).await?;
    let matches = collection.query(&embedding, n_results, filter)?;

    tracing::info!(
        collection = collection.name(),
        query,
        returned = matches.len(),
        "Recommendation query"
    );

    Ok(matches)
}
