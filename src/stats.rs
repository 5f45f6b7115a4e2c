//! Transcript and vector store statistics.
//!
//! Used by `rag stats` and the `/stats` chat command to show what is on
//! disk and what has been indexed.

use anyhow::Result;

use crate::chatbot::RagChatbot;
use crate::models::{StoreInfo, TranscriptSummary};
use crate::progress::format_number;

/// Print corpus and store statistics.
pub async fn run_stats(chatbot: &RagChatbot) -> Result<()> {
    let summary = chatbot.transcript_summary().await?;
    let info = chatbot.vector_store_info().await?;

    println!("Transcript RAG Stats");
    println!("====================");
    print!("{}", render(&summary, &info));
    Ok(())
}

fn render(summary: &TranscriptSummary, info: &StoreInfo) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&format!(
        "  Total Transcripts:            {}\n",
        format_number(summary.total_transcripts as u64)
    ));
    out.push_str(&format!(
        "  Total Words:                  {}\n",
        format_number(summary.total_words as u64)
    ));
    out.push_str(&format!(
        "  Total Size:                   {}\n",
        format_chars(summary.total_size as u64)
    ));
    out.push_str(&format!(
        "  Average Words per Transcript: {:.0}\n",
        summary.average_words_per_transcript
    ));
    out.push('\n');
    out.push_str(&format!("  Collection:        {}\n", info.collection_name));
    if let Some(path) = &info.persist_path {
        out.push_str(&format!("  Store:             {}\n", path));
    }
    out.push_str(&format!(
        "  Vector Chunks:     {}\n",
        format_number(info.total_chunks as u64)
    ));
    out.push_str(&format!(
        "  Indexed:           {} / {} transcripts\n",
        info.total_transcripts, summary.total_transcripts
    ));
    let model = match (&info.embedding_model, info.embedding_dims) {
        (Some(m), Some(d)) => format!("{} ({} dims)", m, d),
        (Some(m), None) => m.clone(),
        _ => "not set up".to_string(),
    };
    out.push_str(&format!("  Embedding model:   {}\n", model));
    out.push('\n');
    out
}

/// Format a character count the way byte sizes are usually shown.
fn format_chars(n: u64) -> String {
    if n < 1000 {
        format!("{} chars", n)
    } else if n < 1_000_000 {
        format!("{:.1}K chars", n as f64 / 1000.0)
    } else {
        format!("{:.1}M chars", n as f64 / 1_000_000.0)
    }
}
