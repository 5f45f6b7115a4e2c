//! `rag setup` and `rag check`.
//!
//! `setup` builds or refreshes the vector store. `check` walks the whole
//! pipeline once (load, index if empty, search, chat) and fails on the
//! first broken step.

use anyhow::{bail, Context, Result};

use crate::chatbot::RagChatbot;
use crate::models::SetupReport;
use crate::progress::{format_number, SetupProgressReporter};
use crate::search::excerpt;

pub async fn run_setup(
    chatbot: &RagChatbot,
    rebuild: bool,
    progress: &dyn SetupProgressReporter,
) -> Result<()> {
    println!(
        "Setting up vector store from {}",
        chatbot.config().transcripts.dir.display()
    );

    let report = chatbot.setup_vector_store(rebuild, progress).await?;
    print_report(&report);

    let summary = chatbot.transcript_summary().await?;
    println!();
    println!("  Total Transcripts: {}", format_number(summary.total_transcripts as u64));
    println!("  Total Words:       {}", format_number(summary.total_words as u64));
    println!("  Vector Chunks:     {}", format_number(report.total_chunks as u64));
    Ok(())
}

pub fn print_report(report: &SetupReport) {
    if report.is_noop() {
        println!(
            "Vector store already contains {} chunks. Nothing to do.",
            format_number(report.total_chunks as u64)
        );
        return;
    }

    let verb = if report.rebuilt { "Rebuilt" } else { "Updated" };
    println!(
        "{} vector store: {} indexed, {} unchanged, {} removed, {} chunks added.",
        verb,
        report.transcripts_indexed,
        report.transcripts_unchanged,
        report.transcripts_removed,
        format_number(report.chunks_added as u64)
    );
}

const CHECK_QUERY: &str = "advice for starting a company";
const CHECK_QUESTION: &str = "What advice do the speakers give about starting a company?";

pub async fn run_check(chatbot: &RagChatbot, progress: &dyn SetupProgressReporter) -> Result<()> {
    if !chatbot.can_chat() {
        bail!("OPENAI_API_KEY environment variable is required");
    }

    println!("Loading transcripts...");
    let summary = chatbot
        .transcript_summary()
        .await
        .context("transcript loading failed")?;
    println!(
        "  ok: {} transcripts, {} words",
        summary.total_transcripts,
        format_number(summary.total_words as u64)
    );

    println!("Checking vector store...");
    let mut info = chatbot.vector_store_info().await?;
    if info.total_chunks == 0 {
        println!("  vector store is empty, setting up");
        chatbot
            .setup_vector_store(false, progress)
            .await
            .context("vector store setup failed")?;
        info = chatbot.vector_store_info().await?;
    }
    println!("  ok: {} chunks", format_number(info.total_chunks as u64));

    println!("Searching...");
    let hits = chatbot
        .search_transcripts(CHECK_QUERY, 3)
        .await
        .context("search failed")?;
    println!("  ok: {} results", hits.len());
    if let Some(top) = hits.first() {
        println!("  top: {} | {}", top.metadata.title, excerpt(&top.content, 100));
    }

    println!("Chatting...");
    let response = chatbot
        .chat(CHECK_QUESTION, 3)
        .await
        .context("chat failed")?;
    println!("  ok: {}", excerpt(&response.response, 200));
    println!("  context chunks: {}", response.context_chunks);

    println!();
    println!("All checks passed.");
    Ok(())
}
