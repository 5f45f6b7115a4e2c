//! Configuration loading and validation.
//!
//! Settings come from an optional TOML file (default `./config/rag.toml`)
//! and a handful of environment variables that override it:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `OPENAI_API_KEY` | API key for completions and OpenAI embeddings |
//! | `OPENAI_MODEL` | `llm.model` |
//! | `TRANSCRIPTS_DIR` | `transcripts.dir` |
//! | `VECTOR_STORE_PATH` | `store.path` |
//!
//! Every section has defaults, so a missing config file is not an error.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub transcripts: TranscriptsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Read from `OPENAI_API_KEY`, never from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptsConfig {
    #[serde(default = "default_transcripts_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

impl Default for TranscriptsConfig {
    fn default() -> Self {
        Self {
            dir: default_transcripts_dir(),
            pattern: default_pattern(),
        }
    }
}

fn default_transcripts_dir() -> PathBuf {
    PathBuf::from("./transcripts")
}
fn default_pattern() -> String {
    "*.txt".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_store_batch_size")]
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            collection: default_collection(),
            batch_size: default_store_batch_size(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./vector_db/rag.sqlite")
}
fn default_collection() -> String {
    "transcripts".to_string()
}
fn default_store_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// How far back from a window's end to look for a sentence terminator.
    #[serde(default = "default_boundary_window")]
    pub boundary_window: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            boundary_window: default_boundary_window(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}
fn default_boundary_window() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_embed_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            api_base: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_embed_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_base: Option<String>,
    /// Replaces the built-in system prompt when set.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
            api_base: None,
            system_prompt: None,
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4-turbo-preview".to_string()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_n_results")]
    pub n_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n_results: default_n_results(),
        }
    }
}

fn default_n_results() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

/// Default OpenAI REST endpoint, shared by embeddings and completions.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

impl EmbeddingConfig {
    pub fn is_openai(&self) -> bool {
        self.provider == "openai"
    }

    /// Model name with the per-provider default applied.
    pub fn model_name(&self) -> String {
        match &self.model {
            Some(m) => m.clone(),
            None if self.is_openai() => "text-embedding-3-small".to_string(),
            None => "all-minilm-l6-v2".to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(OPENAI_API_BASE)
    }
}

impl LlmConfig {
    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(OPENAI_API_BASE)
    }
}

impl Config {
    /// Returns the API key or the error shown to users when it is missing.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!("OPENAI_API_KEY environment variable is required"),
        }
    }
}

/// Load configuration from `path` (if it exists), apply environment
/// overrides, and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str::<Config>(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    apply_env(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Empty values are ignored.
pub fn apply_env<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = get("OPENAI_API_KEY") {
        config.api_key = Some(key);
    }
    if let Some(model) = get("OPENAI_MODEL") {
        config.llm.model = model;
    }
    if let Some(dir) = get("TRANSCRIPTS_DIR") {
        config.transcripts.dir = PathBuf::from(dir);
    }
    if let Some(path) = get("VECTOR_STORE_PATH") {
        config.store.path = PathBuf::from(path);
    }
}

pub fn validate(config: &Config) -> Result<()> {
    let chunking = &config.chunking;
    if chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if chunking.overlap >= chunking.chunk_size {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            chunking.overlap,
            chunking.chunk_size
        );
    }
    if chunking.boundary_window >= chunking.chunk_size {
        bail!("chunking.boundary_window must be smaller than chunking.chunk_size");
    }

    if config.retrieval.n_results < 1 {
        bail!("retrieval.n_results must be >= 1");
    }
    if config.store.batch_size == 0 {
        bail!("store.batch_size must be > 0");
    }
    if config.store.collection.trim().is_empty() {
        bail!("store.collection must not be empty");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0 when set");
    }

    match config.embedding.provider.as_str() {
        "local" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local or openai.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.max_tokens == 0 {
        bail!("llm.max_tokens must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_original_tuning() {
        let cfg = Config::default();
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.chunking.boundary_window, 100);
        assert_eq!(cfg.store.batch_size, 100);
        assert_eq!(cfg.retrieval.n_results, 5);
        assert_eq!(cfg.llm.model, "gpt-4-turbo-preview");
        assert_eq!(cfg.llm.max_tokens, 1000);
        assert!((cfg.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.embedding.model_name(), "all-minilm-l6-v2");
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[transcripts]
dir = "/data/talks"

[llm]
model = "gpt-4o-mini"
"#,
        )
        .unwrap();
        assert_eq!(cfg.transcripts.dir, PathBuf::from("/data/talks"));
        assert_eq!(cfg.transcripts.pattern, "*.txt");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.max_tokens, 1000);
        assert_eq!(cfg.store.collection, "transcripts");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("TRANSCRIPTS_DIR", "/srv/transcripts"),
            ("VECTOR_STORE_PATH", ""),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        apply_env(&mut cfg, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.transcripts.dir, PathBuf::from("/srv/transcripts"));
        // empty values are ignored
        assert_eq!(cfg.store.path, default_store_path());
    }

    #[test]
    fn test_require_api_key() {
        let mut cfg = Config::default();
        let err = cfg.require_api_key().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        cfg.api_key = Some("   ".to_string());
        assert!(cfg.require_api_key().is_err());

        cfg.api_key = Some("sk-abc".to_string());
        assert_eq!(cfg.require_api_key().unwrap(), "sk-abc");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut cfg = Config::default();
        cfg.chunking.chunk_size = 100;
        cfg.chunking.overlap = 100;
        cfg.chunking.boundary_window = 10;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut cfg = Config::default();
        cfg.embedding.provider = "ollama".to_string();
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_openai_embedding_default_model() {
        let mut cfg = Config::default();
        cfg.embedding.provider = "openai".to_string();
        assert_eq!(cfg.embedding.model_name(), "text-embedding-3-small");
        assert_eq!(cfg.embedding.api_base(), OPENAI_API_BASE);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 1000);
    }

    #[test]
    fn test_bad_file_reports_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rag.toml");
        std::fs::write(&path, "[chunking]\nchunk_size = \"big\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("rag.toml"));
    }
}
