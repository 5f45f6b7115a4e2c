//! Vector storage for transcript chunks.
//!
//! The [`VectorStore`] trait is everything the chatbot needs from a
//! persistence backend: add embedded chunks, find the nearest ones to a
//! query vector, and keep per-transcript bookkeeping so setup can skip
//! unchanged files.
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | SQLite | [`sqlite`] | Persistent store under `store.path` |
//! | In-memory | [`memory`] | Tests and throwaway sessions |
//!
//! Search is brute-force cosine similarity over every vector in the
//! collection; results are ordered by ascending cosine distance.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::models::{Chunk, SearchHit, StoreInfo};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract vector store scoped to a single collection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_model`](VectorStore::ensure_model) | Pin the collection to one embedding model |
/// | [`add`](VectorStore::add) | Insert chunks with their vectors |
/// | [`search`](VectorStore::search) | Nearest chunks to a query vector |
/// | [`count`](VectorStore::count) | Number of stored chunks |
/// | [`indexed_sources`](VectorStore::indexed_sources) | Title → fingerprint of indexed transcripts |
/// | [`record_source`](VectorStore::record_source) | Mark a transcript as fully indexed |
/// | [`remove_source`](VectorStore::remove_source) | Drop a transcript and its chunks |
/// | [`info`](VectorStore::info) | Collection statistics |
/// | [`clear`](VectorStore::clear) | Delete everything in the collection |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Record the embedding model for this collection.
    ///
    /// Fails if the collection already holds vectors from a different model
    /// or dimensionality; an empty collection is simply re-pinned.
    async fn ensure_model(&self, model: &str, dims: usize) -> Result<()>;

    /// Insert (or replace) chunks. `vectors[i]` belongs to `chunks[i]`.
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return up to `n` chunks closest to `query_vec`.
    async fn search(&self, query_vec: &[f32], n: usize) -> Result<Vec<SearchHit>>;

    async fn count(&self) -> Result<usize>;

    async fn indexed_sources(&self) -> Result<HashMap<String, String>>;

    async fn record_source(&self, title: &str, fingerprint: &str, chunk_count: usize)
        -> Result<()>;

    /// Remove a transcript's chunks and its source record, if any.
    async fn remove_source(&self, title: &str) -> Result<()>;

    async fn info(&self) -> Result<StoreInfo>;

    async fn clear(&self) -> Result<()>;
}

/// Order hits by ascending distance (ties by id) and keep the best `n`.
pub(crate) fn rank_hits(mut hits: Vec<SearchHit>, n: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(n);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn hit(id: &str, distance: f32) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            content: String::new(),
            metadata: ChunkMetadata {
                title: "t".to_string(),
                chunk_index: 0,
                total_chunks: 1,
                word_count: 0,
            },
            distance,
        }
    }

    #[test]
    fn test_rank_hits_orders_and_truncates() {
        let hits = vec![hit("c", 0.5), hit("a", 0.1), hit("b", 0.5), hit("d", 0.9)];
        let ranked = rank_hits(hits, 3);
        let ids: Vec<&str> = ranked.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
