//! `rag search`: nearest transcript chunks for a query, without calling
//! the language model.

use anyhow::Result;

use crate::chatbot::RagChatbot;
use crate::models::SearchHit;

const EXCERPT_CHARS: usize = 200;

pub async fn run_search(
    chatbot: &RagChatbot,
    query: &str,
    n_results: usize,
    json: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let hits = chatbot.search_transcripts(query, n_results).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("Search results for '{}':", query.trim());
    println!("{}", "-".repeat(60));
    print_hits(&hits);
    Ok(())
}

pub fn print_hits(hits: &[SearchHit]) {
    for (i, hit) in hits.iter().enumerate() {
        println!();
        println!("{}. Source: {}", i + 1, hit.metadata.title);
        println!(
            "   Chunk {}/{}",
            hit.metadata.chunk_index + 1,
            hit.metadata.total_chunks
        );
        println!("   Distance: {:.4}", hit.distance);
        println!("   Content: {}", excerpt(&hit.content, EXCERPT_CHARS));
    }
    println!();
}

/// First `max` characters of `text` on one line, with `...` when cut.
pub fn excerpt(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}
