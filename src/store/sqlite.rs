//! SQLite-backed [`VectorStore`].
//!
//! Vectors are stored as little-endian `f32` BLOBs next to the chunk text
//! and metadata. All rows are scoped by collection name, so several
//! collections can share one database file.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::{rank_hits, VectorStore};
use crate::config::StoreConfig;
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::migrate;
use crate::models::{Chunk, ChunkMetadata, SearchHit, StoreInfo};

pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
    path: PathBuf,
}

impl SqliteStore {
    /// Open the database at `config.path`, creating the schema if needed.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = db::connect(&config.path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            collection: config.collection.clone(),
            path: config.path.clone(),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn collection_model(&self) -> Result<Option<(String, usize)>> {
        let row = sqlx::query("SELECT model, dims FROM collections WHERE name = ?")
            .bind(&self.collection)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.get("model"), r.get::<i64, _>("dims") as usize)))
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn ensure_model(&self, model: &str, dims: usize) -> Result<()> {
        if let Some((existing, existing_dims)) = self.collection_model().await? {
            if existing == model && existing_dims == dims {
                return Ok(());
            }
            if self.count().await? > 0 {
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

        sqlx::query(
            r#"
            INSERT INTO collections (name, model, dims, created_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET model = excluded.model, dims = excluded.dims
            "#,
        )
        .bind(&self.collection)
        .bind(model)
        .bind(dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

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

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO chunks (collection, id, title, chunk_index, total_chunks,
                                    word_count, text, embedding, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    title = excluded.title,
                    chunk_index = excluded.chunk_index,
                    total_chunks = excluded.total_chunks,
                    word_count = excluded.word_count,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    dims = excluded.dims,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&self.collection)
            .bind(&chunk.id)
            .bind(&chunk.metadata.title)
            .bind(chunk.metadata.chunk_index as i64)
            .bind(chunk.metadata.total_chunks as i64)
            .bind(chunk.metadata.word_count as i64)
            .bind(&chunk.text)
            .bind(vec_to_blob(vector))
            .bind(vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], n: usize) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, chunk_index, total_chunks, word_count, text, embedding
            FROM chunks
            WHERE collection = ? AND dims = ?
            "#,
        )
        .bind(&self.collection)
        .bind(query_vec.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(query_vec, &blob_to_vec(&blob));
                SearchHit {
                    id: row.get("id"),
                    content: row.get("text"),
                    metadata: ChunkMetadata {
                        title: row.get("title"),
                        chunk_index: row.get::<i64, _>("chunk_index") as usize,
                        total_chunks: row.get::<i64, _>("total_chunks") as usize,
                        word_count: row.get::<i64, _>("word_count") as usize,
                    },
                    distance: 1.0 - similarity,
                }
            })
            .collect();

        Ok(rank_hits(hits, n))
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn indexed_sources(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query("SELECT title, fingerprint FROM sources WHERE collection = ?")
            .bind(&self.collection)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get("title"), r.get("fingerprint")))
            .collect())
    }

    async fn record_source(
        &self,
        title: &str,
        fingerprint: &str,
        chunk_count: usize,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sources (collection, title, fingerprint, chunk_count, indexed_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(collection, title) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                chunk_count = excluded.chunk_count,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&self.collection)
        .bind(title)
        .bind(fingerprint)
        .bind(chunk_count as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_source(&self, title: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE collection = ? AND title = ?")
            .bind(&self.collection)
            .bind(title)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sources WHERE collection = ? AND title = ?")
            .bind(&self.collection)
            .bind(title)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn info(&self) -> Result<StoreInfo> {
        let total_chunks = self.count().await?;
        let total_transcripts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sources WHERE collection = ?")
                .bind(&self.collection)
                .fetch_one(&self.pool)
                .await?;
        let model = self.collection_model().await?;

        Ok(StoreInfo {
            total_chunks,
            total_transcripts: total_transcripts as usize,
            collection_name: self.collection.clone(),
            persist_path: Some(self.path.display().to_string()),
            embedding_model: model.as_ref().map(|(m, _)| m.clone()),
            embedding_dims: model.map(|(_, d)| d),
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["chunks", "sources"] {
            sqlx::query(&format!("DELETE FROM {} WHERE collection = ?", table))
                .bind(&self.collection)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(collection = %self.collection, "collection cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

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

    async fn open(tmp: &TempDir, collection: &str) -> SqliteStore {
        SqliteStore::open(&StoreConfig {
            path: tmp.path().join("db").join("rag.sqlite"),
            collection: collection.to_string(),
            batch_size: 100,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_search_persist() {
        let tmp = TempDir::new().unwrap();
        {
            let store = open(&tmp, "talks").await;
            store.ensure_model("m", 2).await.unwrap();
            store
                .add(
                    &[chunk("a", 0, "hiring advice"), chunk("a", 1, "fundraising")],
                    &[vec![1.0, 0.0], vec![0.0, 1.0]],
                )
                .await
                .unwrap();
            store.record_source("a", "hash-a", 2).await.unwrap();
            store.close().await;
        }

        let store = open(&tmp, "talks").await;
        assert_eq!(store.count().await.unwrap(), 2);

        let hits = store.search(&[0.9, 0.1], 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a_0");
        assert_eq!(hits[0].content, "hiring advice");
        assert_eq!(hits[0].metadata.total_chunks, 2);
        assert!(hits[0].distance < hits[1].distance);

        let info = store.info().await.unwrap();
        assert_eq!(info.total_transcripts, 1);
        assert_eq!(info.embedding_model.as_deref(), Some("m"));
        assert_eq!(info.embedding_dims, Some(2));
        assert!(info.persist_path.unwrap().ends_with("rag.sqlite"));
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let one = open(&tmp, "one").await;
        let two = open(&tmp, "two").await;
        one.add(&[chunk("a", 0, "x")], &[vec![1.0]]).await.unwrap();

        assert_eq!(one.count().await.unwrap(), 1);
        assert_eq!(two.count().await.unwrap(), 0);
        assert!(two.search(&[1.0], 5).await.unwrap().is_empty());

        two.clear().await.unwrap();
        assert_eq!(one.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_source_and_clear() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp, "talks").await;
        store
            .add(
                &[chunk("a", 0, "x"), chunk("b", 0, "y"), chunk("b", 1, "z")],
                &[vec![1.0], vec![1.0], vec![1.0]],
            )
            .await
            .unwrap();
        store.record_source("a", "ha", 1).await.unwrap();
        store.record_source("b", "hb", 2).await.unwrap();

        store.remove_source("b").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let sources = store.indexed_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources["a"], "ha");

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.indexed_sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_pinning() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp, "talks").await;
        store.ensure_model("small", 2).await.unwrap();
        store.add(&[chunk("a", 0, "x")], &[vec![1.0, 0.0]]).await.unwrap();

        let err = store.ensure_model("large", 4).await.unwrap_err();
        assert!(err.to_string().contains("'small'"));

        store.clear().await.unwrap();
        store.ensure_model("large", 4).await.unwrap();
        assert_eq!(store.info().await.unwrap().embedding_dims, Some(4));
    }

    #[tokio::test]
    async fn test_search_skips_other_dims() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp, "talks").await;
        store
            .add(
                &[chunk("a", 0, "two"), chunk("a", 1, "three")],
                &[vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
            )
            .await
            .unwrap();
        let hits = store.search(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a_0");
    }
}
