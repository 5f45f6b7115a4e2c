//! In-memory [`VectorStore`] for tests and throwaway sessions.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`; nothing is persisted.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use super::{rank_hits, VectorStore};
use crate::embedding::cosine_similarity;
use crate::models::{Chunk, SearchHit, StoreInfo};

struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Default)]
struct Inner {
    model: Option<(String, usize)>,
    chunks: Vec<StoredChunk>,
    sources: HashMap<String, String>,
}

pub struct InMemoryStore {
    collection: String,
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            inner: RwLock::new(Inner::default()),
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_model(&self, model: &str, dims: usize) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if let Some((existing, existing_dims)) = &inner.model {
            if (existing != model || *existing_dims != dims) && !inner.chunks.is_empty() {
                bail!(
                    "Collection '{}' was built with embedding model '{}' ({} dims), not '{}' ({} dims). Rebuild the vector store.",
                    self.collection,
                    existing,
                    existing_dims,
                    model,
                    dims
                );
            }
        }
        inner.model = Some((model.to_string(), dims));
        Ok(())
    }

    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }
        let mut inner = self.inner.write().map_err(poisoned)?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            inner.chunks.retain(|sc| sc.chunk.id != chunk.id);
            inner.chunks.push(StoredChunk {
                chunk: chunk.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], n: usize) -> Result<Vec<SearchHit>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let hits = inner
            .chunks
            .iter()
            .filter(|sc| sc.vector.len() == query_vec.len())
            .map(|sc| SearchHit {
                id: sc.chunk.id.clone(),
                content: sc.chunk.text.clone(),
                metadata: sc.chunk.metadata.clone(),
                distance: 1.0 - cosine_similarity(query_vec, &sc.vector),
            })
            .collect();
        Ok(rank_hits(hits, n))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.inner.read().map_err(poisoned)?.chunks.len())
    }

    async fn indexed_sources(&self) -> Result<HashMap<String, String>> {
        Ok(self.inner.read().map_err(poisoned)?.sources.clone())
    }

    async fn record_source(
        &self,
        title: &str,
        fingerprint: &str,
        _chunk_count: usize,
    ) -> Result<()> {
        self.inner
            .write()
            .map_err(poisoned)?
            .sources
            .insert(title.to_string(), fingerprint.to_string());
        Ok(())
    }

    async fn remove_source(&self, title: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.chunks.retain(|sc| sc.chunk.metadata.title != title);
        inner.sources.remove(title);
        Ok(())
    }

    async fn info(&self) -> Result<StoreInfo> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(StoreInfo {
            total_chunks: inner.chunks.len(),
            total_transcripts: inner.sources.len(),
            collection_name: self.collection.clone(),
            persist_path: None,
            embedding_model: inner.model.as_ref().map(|(m, _)| m.clone()),
            embedding_dims: inner.model.as_ref().map(|(_, d)| *d),
        })
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.write().map_err(poisoned)? = Inner::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn chunk(title: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("{}_{}", title, index),
            text: text.to_string(),
            metadata: ChunkMetadata {
                title: title.to_string(),
                chunk_index: index,
                total_chunks: 2,
                word_count: text.split_whitespace().count(),
            },
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let store = InMemoryStore::new("test");
        store
            .add(
                &[chunk("a", 0, "north"), chunk("a", 1, "east"), chunk("b", 0, "north-east")],
                &[vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]],
            )
            .await
            .unwrap();

        let hits = store.search(&[0.0, 1.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a_0");
        assert!(hits[0].distance.abs() < 1e-6);
        assert_eq!(hits[1].id, "b_0");
    }

    #[tokio::test]
    async fn test_add_replaces_same_id() {
        let store = InMemoryStore::new("test");
        store.add(&[chunk("a", 0, "old")], &[vec![1.0]]).await.unwrap();
        store.add(&[chunk("a", 0, "new")], &[vec![1.0]]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.search(&[1.0], 5).await.unwrap();
        assert_eq!(hits[0].content, "new");
    }

    #[tokio::test]
    async fn test_remove_source() {
        let store = InMemoryStore::new("test");
        store
            .add(
                &[chunk("a", 0, "x"), chunk("b", 0, "y")],
                &[vec![1.0], vec![1.0]],
            )
            .await
            .unwrap();
        store.record_source("a", "h1", 1).await.unwrap();
        store.record_source("b", "h2", 1).await.unwrap();

        store.remove_source("a").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let sources = store.indexed_sources().await.unwrap();
        assert!(!sources.contains_key("a"));
        assert_eq!(sources.get("b").map(String::as_str), Some("h2"));
    }

    #[tokio::test]
    async fn test_model_mismatch() {
        let store = InMemoryStore::new("test");
        store.ensure_model("m1", 2).await.unwrap();
        // empty collection can be re-pinned
        store.ensure_model("m2", 3).await.unwrap();
        store.add(&[chunk("a", 0, "x")], &[vec![1.0, 0.0, 0.0]]).await.unwrap();
        let err = store.ensure_model("m1", 2).await.unwrap_err();
        assert!(err.to_string().contains("Rebuild"));
        store.ensure_model("m2", 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryStore::new("test");
        store.ensure_model("m", 1).await.unwrap();
        store.add(&[chunk("a", 0, "x")], &[vec![1.0]]).await.unwrap();
        store.record_source("a", "h", 1).await.unwrap();
        store.clear().await.unwrap();

        let info = store.info().await.unwrap();
        assert_eq!(info.total_chunks, 0);
        assert_eq!(info.total_transcripts, 0);
        assert_eq!(info.embedding_model, None);
        assert_eq!(info.collection_name, "test");
    }
}
