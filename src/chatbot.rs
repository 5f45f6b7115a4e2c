//! Retrieval-augmented chat over the transcript corpus.
//!
//! [`RagChatbot`] ties the pieces together:
//!
//! ```text
//! transcripts/*.txt ─▶ loader ─▶ chunk ─▶ embed ─▶ VectorStore
//!                                                     │
//!          question ─▶ embed ─▶ nearest chunks ◀──────┘
//!                                   │
//!                         context + question ─▶ LLM ─▶ answer
//! ```

use anyhow::{bail, Context, Result};

use crate::chunk::chunk_transcript;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::llm::{CompletionProvider, OpenAIChat};
use crate::loader::{hash_content, summarize, TranscriptLoader};
use crate::models::{
    ChatResponse, SearchHit, SetupReport, StoreInfo, Transcript, TranscriptSummary,
};
use crate::openai::UpstreamError;
use crate::progress::{SetupProgressEvent, SetupProgressReporter};
use crate::store::{SqliteStore, VectorStore};

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant that answers questions based on a collection of transcripts.

Your knowledge comes from transcripts of talks and interviews in which speakers share their insights, experiences, and advice.

When answering questions:
1. Use specific examples and quotes from the transcripts when relevant
2. Cite the source transcript title when referencing specific content
3. Provide practical, actionable advice based on the speakers' experiences
4. Be conversational but professional
5. If you don't have relevant information in the transcripts, say so rather than making things up

Always base your responses on the provided context from the transcripts.";

pub const NO_CONTEXT: &str = "No relevant context found.";

pub struct RagChatbot {
    config: Config,
    loader: TranscriptLoader,
    store: Box<dyn VectorStore>,
    embedder: Box<dyn EmbeddingProvider>,
    llm: Option<Box<dyn CompletionProvider>>,
    system_prompt: String,
}

impl RagChatbot {
    pub fn new(
        config: Config,
        store: Box<dyn VectorStore>,
        embedder: Box<dyn EmbeddingProvider>,
        llm: Box<dyn CompletionProvider>,
    ) -> Result<Self> {
        Self::build(config, store, embedder, Some(llm))
    }

    /// A chatbot that can set up, search and report statistics but not
    /// answer questions. Used when no API key is available.
    pub fn without_llm(
        config: Config,
        store: Box<dyn VectorStore>,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        Self::build(config, store, embedder, None)
    }

    fn build(
        config: Config,
        store: Box<dyn VectorStore>,
        embedder: Box<dyn EmbeddingProvider>,
        llm: Option<Box<dyn CompletionProvider>>,
    ) -> Result<Self> {
        let loader = TranscriptLoader::new(&config.transcripts)?;
        let system_prompt = config
            .llm
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Ok(Self {
            config,
            loader,
            store,
            embedder,
            llm,
            system_prompt,
        })
    }

    /// Open the SQLite store and create the configured providers.
    ///
    /// Fails with "OPENAI_API_KEY environment variable is required" when
    /// no key is set.
    pub async fn from_config(config: Config) -> Result<Self> {
        let key = config.require_api_key()?.to_string();
        let llm = OpenAIChat::new(&config.llm, &key)?;
        let embedder = create_provider(&config)?;
        let store = SqliteStore::open(&config.store).await?;
        Self::new(config, Box::new(store), embedder, Box::new(llm))
    }

    /// Like [`from_config`](Self::from_config), but an API key is only
    /// required if the embedding provider needs one.
    pub async fn from_config_retrieval_only(config: Config) -> Result<Self> {
        let embedder = create_provider(&config)?;
        let store = SqliteStore::open(&config.store).await?;
        let llm = match config.require_api_key() {
            Ok(key) => Some(OpenAIChat::new(&config.llm, key)?),
            Err(_) => None,
        };
        match llm {
            Some(llm) => Self::new(config, Box::new(store), embedder, Box::new(llm)),
            None => Self::without_llm(config, Box::new(store), embedder),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn can_chat(&self) -> bool {
        self.llm.is_some()
    }

    /// Build or refresh the vector store from the transcripts directory.
    ///
    /// With `force_rebuild` the collection is cleared once the transcripts
    /// have loaded. Otherwise only new or changed transcripts are indexed
    /// and transcripts whose files were removed are dropped from the store.
    /// A transcript counts as changed when its content or the chunking
    /// parameters differ from the last run.
    pub async fn setup_vector_store(
        &self,
        force_rebuild: bool,
        progress: &dyn SetupProgressReporter,
    ) -> Result<SetupReport> {
        let transcripts = self.load_transcripts().await?;
        if transcripts.is_empty() {
            bail!("No transcripts found in {}", self.loader.dir().display());
        }

        if force_rebuild {
            tracing::info!("clearing vector store for rebuild");
            self.store.clear().await?;
        }

        self.store
            .ensure_model(self.embedder.model_name(), self.embedder.dims())
            .await?;

        let indexed = self.store.indexed_sources().await?;
        let mut report = SetupReport {
            rebuilt: force_rebuild,
            transcripts_found: transcripts.len(),
            ..Default::default()
        };

        for title in indexed.keys() {
            if !transcripts.iter().any(|t| &t.title == title) {
                tracing::info!(%title, "transcript removed, dropping its chunks");
                self.store.remove_source(title).await?;
                report.transcripts_removed += 1;
            }
        }

        let pending: Vec<&Transcript> = transcripts
            .iter()
            .filter(|t| indexed.get(&t.title) != Some(&self.fingerprint(t)))
            .collect();
        report.transcripts_unchanged = transcripts.len() - pending.len();

        progress.report(SetupProgressEvent::Loading {
            found: transcripts.len() as u64,
            total: pending.len() as u64,
        });

        for (i, transcript) in pending.iter().enumerate() {
            progress.report(SetupProgressEvent::Chunking {
                title: transcript.title.clone(),
                n: i as u64 + 1,
                total: pending.len() as u64,
            });
            report.chunks_added += self.index_transcript(transcript, progress).await?;
            report.transcripts_indexed += 1;
        }

        report.total_chunks = self.store.count().await?;

        if report.is_noop() {
            tracing::info!(
                "Vector store already contains {} chunks",
                report.total_chunks
            );
        } else {
            tracing::info!(
                indexed = report.transcripts_indexed,
                removed = report.transcripts_removed,
                chunks = report.chunks_added,
                "vector store updated"
            );
        }

        Ok(report)
    }

    async fn index_transcript(
        &self,
        transcript: &Transcript,
        progress: &dyn SetupProgressReporter,
    ) -> Result<usize> {
        // Stale chunks from a previous version of this transcript may
        // outnumber the new ones, so drop them before inserting.
        self.store.remove_source(&transcript.title).await?;

        let chunks = chunk_transcript(transcript, &self.config.chunking);
        let batch_size = self.config.store.batch_size;
        let total_batches = chunks.len().div_ceil(batch_size);

        for (i, batch) in chunks.chunks(batch_size).enumerate() {
            progress.report(SetupProgressEvent::Embedding {
                title: transcript.title.clone(),
                n: i as u64 + 1,
                total: total_batches as u64,
            });
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .with_context(|| format!("Failed to embed '{}'", transcript.title))?;
            self.store.add(batch, &vectors).await?;
        }

        self.store
            .record_source(&transcript.title, &self.fingerprint(transcript), chunks.len())
            .await?;
        tracing::debug!(title = %transcript.title, chunks = chunks.len(), "indexed transcript");
        Ok(chunks.len())
    }

    /// Content hash combined with the chunking parameters, so re-chunking
    /// with different settings re-indexes every transcript.
    fn fingerprint(&self, transcript: &Transcript) -> String {
        let c = &self.config.chunking;
        hash_content(&format!(
            "{}:{}:{}:{}",
            transcript.content_hash, c.chunk_size, c.overlap, c.boundary_window
        ))
    }

    async fn load_transcripts(&self) -> Result<Vec<Transcript>> {
        let loader = self.loader.clone();
        tokio::task::spawn_blocking(move || loader.load_all()).await?
    }

    /// Fail if the stored vectors came from a different embedding model
    /// than the one that would embed the query.
    async fn check_model(&self) -> Result<()> {
        let info = self.store.info().await?;
        if info.total_chunks == 0 {
            return Ok(());
        }
        if let (Some(model), Some(dims)) = (&info.embedding_model, info.embedding_dims) {
            if model != self.embedder.model_name() || dims != self.embedder.dims() {
                bail!(
                    "Collection '{}' was built with embedding model '{}' ({} dims), not '{}' ({} dims). Rebuild the vector store.",
                    info.collection_name,
                    model,
                    dims,
                    self.embedder.model_name(),
                    self.embedder.dims()
                );
            }
        }
        Ok(())
    }

    /// Chunks most similar to `query`, closest first.
    pub async fn search_transcripts(&self, query: &str, n_results: usize) -> Result<Vec<SearchHit>> {
        let query = non_empty(query)?;
        self.check_model().await?;
        let query_vec = self.embedder.embed_query(query).await?;
        self.store.search(&query_vec, n_results).await
    }

    /// Retrieve and format the context block for `query`.
    pub async fn get_relevant_context(&self, query: &str, n_results: usize) -> Result<String> {
        let hits = self.search_transcripts(query, n_results).await?;
        Ok(format_context(&hits))
    }

    /// Ask the language model to answer `query` from `context`.
    pub async fn generate_response(&self, query: &str, context: &str) -> Result<String> {
        let Some(llm) = &self.llm else {
            return Err(UpstreamError::new("OPENAI_API_KEY environment variable is required").into());
        };
        let prompt = user_prompt(query, context);
        llm.complete(&self.system_prompt, &prompt)
            .await
            .context("Failed to generate a response")
    }

    /// One full retrieval-augmented turn.
    pub async fn chat(&self, query: &str, n_results: usize) -> Result<ChatResponse> {
        let query = non_empty(query)?;
        let hits = self.search_transcripts(query, n_results).await?;
        let context = format_context(&hits);
        let response = self.generate_response(query, &context).await?;

        Ok(ChatResponse {
            query: query.to_string(),
            response,
            context_used: context,
            context_chunks: n_results,
            sources: source_titles(&hits),
        })
    }

    pub async fn transcript_summary(&self) -> Result<TranscriptSummary> {
        let transcripts = self.load_transcripts().await?;
        summarize(&transcripts)
    }

    pub async fn vector_store_info(&self) -> Result<StoreInfo> {
        self.store.info().await
    }
}

fn non_empty(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        bail!("Query must not be empty");
    }
    Ok(trimmed)
}

/// `"Source {i} (from '{title}'):\n{content}\n"` per hit, joined by newlines.
pub fn format_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT.to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "Source {} (from '{}'):\n{}\n",
                i + 1,
                hit.metadata.title,
                hit.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn user_prompt(query: &str, context: &str) -> String {
    format!(
        "Context from transcripts:\n\n{}\n\nQuestion: {}\n\nPlease answer based on the provided context.",
        context, query
    )
}

/// Distinct transcript titles in rank order.
fn source_titles(hits: &[SearchHit]) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for hit in hits {
        if !titles.contains(&hit.metadata.title) {
            titles.push(hit.metadata.title.clone());
        }
    }
    titles
}
