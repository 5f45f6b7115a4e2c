//! Core data models shared by the loader, chunker, store, and chatbot.

use serde::{Deserialize, Serialize};

/// A transcript file loaded from disk.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// File stem, used as the transcript's display title.
    pub title: String,
    /// Trimmed file contents.
    pub content: String,
    /// Length of `content` in characters.
    pub file_size: usize,
    pub word_count: usize,
    /// SHA-256 of `content`, used to detect changed files between setups.
    pub content_hash: String,
}

/// Per-chunk metadata persisted alongside the vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub title: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub word_count: usize,
}

/// A window of transcript text ready for embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// `"{title}_{chunk_index}"`, unique within a collection.
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance (`1 - similarity`); lower is closer.
    pub distance: f32,
}

/// Collection statistics reported by a vector store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub total_chunks: usize,
    pub total_transcripts: usize,
    pub collection_name: String,
    pub persist_path: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_dims: Option<usize>,
}

/// Corpus statistics computed by the transcript loader.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSummary {
    pub total_transcripts: usize,
    pub total_words: usize,
    pub total_size: usize,
    pub average_words_per_transcript: f64,
    pub transcript_titles: Vec<String>,
}

/// Result of a single chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub query: String,
    pub response: String,
    /// The formatted context block inserted into the prompt.
    pub context_used: String,
    /// Number of chunks requested from the store.
    pub context_chunks: usize,
    /// Titles of the transcripts the context was drawn from, in rank order.
    pub sources: Vec<String>,
}

/// Outcome of building or refreshing the vector store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SetupReport {
    pub rebuilt: bool,
    pub transcripts_found: usize,
    pub transcripts_indexed: usize,
    pub transcripts_unchanged: usize,
    pub transcripts_removed: usize,
    pub chunks_added: usize,
    pub total_chunks: usize,
}

impl SetupReport {
    /// True when the store already matched the transcript directory.
    pub fn is_noop(&self) -> bool {
        !self.rebuilt && self.transcripts_indexed == 0 && self.transcripts_removed == 0
    }
}
