//! Transcript loading from a flat directory of text files.
//!
//! Only files directly inside the configured directory are considered; the
//! file-name pattern (default `*.txt`) is matched with [`globset`].

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobMatcher};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::TranscriptsConfig;
use crate::models::{Transcript, TranscriptSummary};

#[derive(Clone)]
pub struct TranscriptLoader {
    dir: PathBuf,
    matcher: GlobMatcher,
}

impl TranscriptLoader {
    pub fn new(config: &TranscriptsConfig) -> Result<Self> {
        let matcher = Glob::new(&config.pattern)
            .with_context(|| format!("Invalid transcripts.pattern: '{}'", config.pattern))?
            .compile_matcher();
        Ok(Self {
            dir: config.dir.clone(),
            matcher,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All matching files directly under the transcripts directory, sorted.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            bail!("Transcripts directory not found: {}", self.dir.display());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if self.matcher.is_match(entry.file_name()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Load one transcript. The title is the file stem.
    pub fn load(&self, path: &Path) -> Result<Transcript> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Error loading {}", path.display()))?;
        let content = raw.trim().to_string();

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Transcript {
            title,
            file_size: content.chars().count(),
            word_count: content.split_whitespace().count(),
            content_hash: hash_content(&content),
            content,
        })
    }

    /// Load every transcript. Files that fail to load are logged and skipped.
    pub fn load_all(&self) -> Result<Vec<Transcript>> {
        let files = self.list_files()?;
        tracing::info!(count = files.len(), dir = %self.dir.display(), "found transcript files");

        let mut transcripts = Vec::with_capacity(files.len());
        for path in &files {
            match self.load(path) {
                Ok(t) => {
                    tracing::debug!(title = %t.title, words = t.word_count, "loaded transcript");
                    transcripts.push(t);
                }
                Err(e) => tracing::warn!("{:#}", e),
            }
        }

        tracing::info!(count = transcripts.len(), "loaded transcripts");
        Ok(transcripts)
    }

    pub fn summary(&self) -> Result<TranscriptSummary> {
        let transcripts = self.load_all()?;
        summarize(&transcripts)
    }
}

/// Aggregate statistics over already-loaded transcripts.
pub fn summarize(transcripts: &[Transcript]) -> Result<TranscriptSummary> {
    if transcripts.is_empty() {
        bail!("No transcripts found");
    }

    let total_words: usize = transcripts.iter().map(|t| t.word_count).sum();
    let total_size: usize = transcripts.iter().map(|t| t.file_size).sum();

    Ok(TranscriptSummary {
        total_transcripts: transcripts.len(),
        total_words,
        total_size,
        average_words_per_transcript: total_words as f64 / transcripts.len() as f64,
        transcript_titles: transcripts.iter().map(|t| t.title.clone()).collect(),
    })
}

pub fn hash_content(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
