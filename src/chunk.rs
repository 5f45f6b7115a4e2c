//! Fixed-window text chunker with overlap.
//!
//! Splits transcript text into windows of at most `chunk_size` characters.
//! When a window would end mid-text, the chunker looks back up to
//! `boundary_window` characters for a sentence terminator (`.`, `!`, `?`)
//! and ends the window just after it. Consecutive windows share `overlap`
//! characters.
//!
//! Sizes are measured in `char`s, so multi-byte text is never split inside
//! a code point.

use crate::config::ChunkingConfig;
use crate::models::{Chunk, ChunkMetadata, Transcript};

/// Split text into overlapping windows. Empty (whitespace-only) windows are
/// dropped; every returned window is trimmed.
pub fn chunk_text(text: &str, params: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut windows = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + params.chunk_size).min(len);

        if end < len {
            let search_start = start.max(end.saturating_sub(params.boundary_window));
            if let Some(i) = (search_start + 1..=end)
                .rev()
                .find(|&i| matches!(chars[i - 1], '.' | '!' | '?'))
            {
                end = i;
            }
        }

        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            windows.push(trimmed.to_string());
        }

        if end >= len {
            break;
        }
        // Always advance, even with an overlap close to the window size.
        start = end.saturating_sub(params.overlap).max(start + 1);
    }

    windows
}

/// Chunk a transcript into [`Chunk`]s with ids `"{title}_{index}"`.
pub fn chunk_transcript(transcript: &Transcript, params: &ChunkingConfig) -> Vec<Chunk> {
    let windows = chunk_text(&transcript.content, params);
    let total = windows.len();

    windows
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: format!("{}_{}", transcript.title, i),
            metadata: ChunkMetadata {
                title: transcript.title.clone(),
                chunk_index: i,
                total_chunks: total,
                word_count: text.split_whitespace().count(),
            },
            text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(chunk_size: usize, overlap: usize, boundary_window: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            overlap,
            boundary_window,
        }
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", &params(1000, 200, 100));
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_empty_and_blank_text() {
        assert!(chunk_text("", &params(1000, 200, 100)).is_empty());
        assert!(chunk_text("   \n\n  ", &params(1000, 200, 100)).is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        // no sentence terminators: pure fixed windows
        let text: String = ('a'..='z').cycle().take(50).collect();
        let chunks = chunk_text(&text, &params(20, 5, 5));

        assert_eq!(chunks[0].chars().count(), 20);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(15).collect();
            assert!(pair[1].starts_with(&tail), "expected 5-char overlap");
        }
        // the last window reaches the end of the text
        assert!(text.ends_with(chunks.last().unwrap().as_str()));
    }

    #[test]
    fn test_breaks_at_sentence_boundary() {
        let text = "First sentence here. Second sentence runs on and on and on.";
        let chunks = chunk_text(text, &params(30, 0, 15));
        assert_eq!(chunks[0], "First sentence here.");
    }

    #[test]
    fn test_boundary_outside_window_is_ignored() {
        // the only '.' is 25 chars before the window end, beyond a 10-char lookback
        let text = "Abc. defghijklmnopqrstuvwxyzabcdefghijklmnop";
        let chunks = chunk_text(text, &params(30, 0, 10));
        assert_eq!(chunks[0].chars().count(), 30);
    }

    #[test]
    fn test_no_redundant_tail_chunk() {
        let text: String = "x".repeat(1500);
        let chunks = chunk_text(&text, &params(1000, 200, 100));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 700);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "héllo wörld ünïcode ".repeat(20);
        let chunks = chunk_text(&text, &params(25, 5, 5));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 25);
        }
    }

    #[test]
    fn test_always_progresses() {
        let text = ".".repeat(100);
        // every position is a boundary; overlap equals most of the window
        let chunks = chunk_text(&text, &params(10, 9, 9));
        assert!(!chunks.is_empty());
        assert!(chunks.len() <= 100);
    }

    #[test]
    fn test_chunk_transcript_ids_and_metadata() {
        let transcript = Transcript {
            title: "Keynote".to_string(),
            content: "One. Two. Three. Four. Five. Six. Seven. Eight.".to_string(),
            file_size: 47,
            word_count: 8,
            content_hash: String::new(),
        };
        let chunks = chunk_transcript(&transcript, &params(20, 4, 8));
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.id, format!("Keynote_{}", i));
            assert_eq!(c.metadata.chunk_index, i);
            assert_eq!(c.metadata.total_chunks, chunks.len());
            assert_eq!(c.metadata.title, "Keynote");
            assert_eq!(c.metadata.word_count, c.text.split_whitespace().count());
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta. Gamma delta! Epsilon zeta? Eta theta iota kappa.";
        let c1 = chunk_text(text, &params(16, 4, 6));
        let c2 = chunk_text(text, &params(16, 4, 6));
        assert_eq!(c1, c2);
    }
}
