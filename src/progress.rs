//! Setup progress reporting.
//!
//! Reports what `rag setup` is doing so users see how many transcripts are
//! being indexed and how far embedding has got. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event emitted while building the vector store.
#[derive(Clone, Debug, PartialEq)]
pub enum SetupProgressEvent {
    /// Transcripts were read from disk; `total` is how many need indexing.
    Loading { found: u64, total: u64 },
    /// Transcript `n` of `total` is being chunked.
    Chunking { title: String, n: u64, total: u64 },
    /// Embedding batch `n` of `total` for the current transcript.
    Embedding { title: String, n: u64, total: u64 },
}

/// Reports setup progress. Implementations write to stderr (human or JSON).
pub trait SetupProgressReporter: Send + Sync {
    fn report(&self, event: SetupProgressEvent);
}

/// Human-friendly progress on stderr: "setup  chunking  12 / 340  founder-stories".
pub struct StderrProgress;

impl SetupProgressReporter for StderrProgress {
    fn report(&self, event: SetupProgressEvent) {
        let line = match &event {
            SetupProgressEvent::Loading { found, total } => format!(
                "setup  loaded {} transcripts, {} to index\n",
                format_number(*found),
                format_number(*total)
            ),
            SetupProgressEvent::Chunking { title, n, total } => format!(
                "setup  chunking  {} / {}  {}\n",
                format_number(*n),
                format_number(*total),
                title
            ),
            SetupProgressEvent::Embedding { title, n, total } => {
                format!("setup  embedding  batch {} / {}  {}\n", n, total, title)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SetupProgressReporter for JsonProgress {
    fn report(&self, event: SetupProgressEvent) {
        let obj = event_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn event_json(event: &SetupProgressEvent) -> serde_json::Value {
    match event {
        SetupProgressEvent::Loading { found, total } => serde_json::json!({
            "event": "progress",
            "phase": "loading",
            "found": found,
            "total": total
        }),
        SetupProgressEvent::Chunking { title, n, total } => serde_json::json!({
            "event": "progress",
            "phase": "chunking",
            "title": title,
            "n": n,
            "total": total
        }),
        SetupProgressEvent::Embedding { title, n, total } => serde_json::json!({
            "event": "progress",
            "phase": "embedding",
            "title": title,
            "n": n,
            "total": total
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SetupProgressReporter for NoProgress {
    fn report(&self, _event: SetupProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn SetupProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
