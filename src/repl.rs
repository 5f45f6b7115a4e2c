//! Interactive chat loop (`rag chat`).
//!
//! Plain lines are questions. Lines starting with `/` are commands:
//!
//! | Command | Action |
//! |---------|--------|
//! | `/help` | List commands |
//! | `/stats` | Transcript and vector store statistics |
//! | `/setup` | Index new or changed transcripts |
//! | `/rebuild` | Clear and rebuild the vector store (asks first) |
//! | `/search [query]` | Show matching chunks without asking the model |
//! | `/clear` | Clear the screen |
//! | `/quit` | Exit |

use anyhow::{bail, Result};
use console::{style, Term};
use dialoguer::{Confirm, Input};

use crate::chatbot::RagChatbot;
use crate::progress::SetupProgressReporter;
use crate::search::print_hits;
use crate::setup::print_report;
use crate::stats::run_stats;

#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    Help,
    Stats,
    Setup,
    Rebuild,
    /// Search, optionally with the query given inline.
    Search(Option<String>),
    Clear,
    Quit,
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts
        .get(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/stats" => Some(ChatCommand::Stats),
        "/setup" => Some(ChatCommand::Setup),
        "/rebuild" => Some(ChatCommand::Rebuild),
        "/search" | "/s" => Some(ChatCommand::Search(arg)),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/quit" | "/exit" | "/q" => Some(ChatCommand::Quit),
        _ => Some(ChatCommand::Unknown(trimmed.to_string())),
    }
}

pub fn print_help() {
    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    let rows = [
        ("/help", "Show this help message"),
        ("/stats", "Show transcript and vector store statistics"),
        ("/setup", "Index new or changed transcripts"),
        ("/rebuild", "Rebuild the vector store (clears existing data)"),
        ("/search", "Search transcripts without generating a response"),
        ("/clear", "Clear the screen"),
        ("/quit", "Exit the application"),
    ];
    for (cmd, help) in rows {
        println!("  {:<10} {}", style(cmd).cyan(), help);
    }
    println!();
}

fn print_banner(chatbot: &RagChatbot) {
    println!();
    println!("  {}", style("Transcript RAG Chat").cyan().bold());
    println!(
        "  {}",
        style("Ask questions about the transcripts in your collection.").dim()
    );
    println!();
    println!(
        "  {}  {}",
        style("Model:").bold(),
        style(&chatbot.config().llm.model).dim()
    );
    println!(
        "  {}  {}",
        style("Transcripts:").bold(),
        style(chatbot.config().transcripts.dir.display()).dim()
    );
    println!();
    println!("  {}", style("Type /help for commands, /quit to exit").dim());
    println!("  {}", style("---").dim());
    println!();
}

/// Run the interactive chat loop until `/quit` or end of input.
pub async fn run_chat(
    chatbot: &RagChatbot,
    n_results: usize,
    progress: &dyn SetupProgressReporter,
) -> Result<()> {
    if !chatbot.can_chat() {
        bail!("OPENAI_API_KEY environment variable is required");
    }

    print_banner(chatbot);
    if let Err(e) = run_stats(chatbot).await {
        println!("{} {:#}", style("Error loading statistics:").red(), e);
    }

    loop {
        let line = match Input::<String>::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            // End of input (Ctrl+D) or a closed terminal.
            Err(_) => {
                println!();
                println!("Goodbye!");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match parse(line) {
            Some(ChatCommand::Quit) => {
                println!("Goodbye!");
                break;
            }
            Some(command) => handle_command(chatbot, command, progress).await,
            None => answer(chatbot, line, n_results).await,
        };

        if let Err(e) = result {
            println!("{} {:#}", style("Error:").red().bold(), e);
            println!();
        }
    }

    Ok(())
}

async fn handle_command(
    chatbot: &RagChatbot,
    command: ChatCommand,
    progress: &dyn SetupProgressReporter,
) -> Result<()> {
    match command {
        ChatCommand::Help => print_help(),
        ChatCommand::Stats => run_stats(chatbot).await?,
        ChatCommand::Setup => {
            println!("Setting up vector store...");
            let report = chatbot.setup_vector_store(false, progress).await?;
            print_report(&report);
        }
        ChatCommand::Rebuild => {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "{} This will clear all existing data. Continue?",
                    style("warning:").yellow().bold()
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Rebuild cancelled.");
                return Ok(());
            }
            println!("Rebuilding vector store...");
            let report = chatbot.setup_vector_store(true, progress).await?;
            print_report(&report);
        }
        ChatCommand::Search(query) => {
            let query = match query {
                Some(q) => q,
                None => Input::<String>::new()
                    .with_prompt("Search query")
                    .allow_empty(true)
                    .interact_text()?,
            };
            if query.trim().is_empty() {
                return Ok(());
            }
            let n: usize = Input::new()
                .with_prompt("Number of results")
                .default(5)
                .interact_text()?;
            let hits = chatbot.search_transcripts(&query, n.max(1)).await?;
            println!();
            println!("Search results for '{}':", query.trim());
            println!("{}", "-".repeat(60));
            print_hits(&hits);
        }
        ChatCommand::Clear => {
            Term::stdout().clear_screen()?;
            print_banner(chatbot);
        }
        ChatCommand::Unknown(input) => {
            println!("{} {}", style("Unknown command:").red(), input);
            println!("Type /help for available commands.");
        }
        ChatCommand::Quit => {}
    }
    Ok(())
}

async fn answer(chatbot: &RagChatbot, question: &str, n_results: usize) -> Result<()> {
    println!("{}", style("Thinking...").dim());
    let response = chatbot.chat(question, n_results).await?;

    println!();
    println!("{} {}", style("Assistant:").green().bold(), response.response);
    if !response.sources.is_empty() {
        println!(
            "{}",
            style(format!("Sources: {}", response.sources.join(", "))).dim()
        );
    }
    println!();

    let show = Confirm::new()
        .with_prompt("Show context used?")
        .default(false)
        .interact()?;
    if show {
        println!();
        println!("{}", style("Context used:").bold());
        println!("{}", "-".repeat(60));
        println!("{}", response.context_used);
        println!("{}", "-".repeat(60));
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse("what is product market fit?"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("/help"), Some(ChatCommand::Help));
        assert_eq!(parse("  /STATS "), Some(ChatCommand::Stats));
        assert_eq!(parse("/setup"), Some(ChatCommand::Setup));
        assert_eq!(parse("/rebuild"), Some(ChatCommand::Rebuild));
        assert_eq!(parse("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse("/exit"), Some(ChatCommand::Quit));
    }

    #[test]
    fn test_parse_search_with_inline_query() {
        assert_eq!(parse("/search"), Some(ChatCommand::Search(None)));
        assert_eq!(parse("/search   "), Some(ChatCommand::Search(None)));
        assert_eq!(
            parse("/search hiring early employees"),
            Some(ChatCommand::Search(Some("hiring early employees".to_string())))
        );
    }

    #[test]
    fn test_unknown_command_keeps_input() {
        assert_eq!(
            parse("/frobnicate now"),
            Some(ChatCommand::Unknown("/frobnicate now".to_string()))
        );
    }
}
