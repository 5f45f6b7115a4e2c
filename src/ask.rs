//! `rag ask`: answer a single question and exit.

use anyhow::Result;

use crate::chatbot::RagChatbot;

pub async fn run_ask(
    chatbot: &RagChatbot,
    question: &str,
    n_results: usize,
    show_context: bool,
    json: bool,
) -> Result<()> {
    let response = chatbot.chat(question, n_results).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.response);

    if !response.sources.is_empty() {
        println!();
        println!("Sources: {}", response.sources.join(", "));
    }

    if show_context {
        println!();
        println!("Context used:");
        println!("{}", "-".repeat(60));
        println!("{}", response.context_used);
        println!("{}", "-".repeat(60));
    }

    Ok(())
}
