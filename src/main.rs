//! # Transcript RAG CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag chat` | Interactive chat session |
//! | `rag setup [--rebuild]` | Build or refresh the vector store |
//! | `rag search "<query>"` | Show the nearest transcript chunks |
//! | `rag ask "<question>"` | Answer one question and exit |
//! | `rag stats` | Transcript and vector store statistics |
//! | `rag check` | End-to-end smoke test |
//! | `rag serve` | HTTP JSON API |
//! | `rag completions <shell>` | Shell completion script |

use anyhow::{bail, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use transcript_rag::chatbot::RagChatbot;
use transcript_rag::config::{self, Config};
use transcript_rag::progress::ProgressMode;
use transcript_rag::{ask, repl, search, server, setup, stats};

/// Chat with a collection of transcripts using retrieval-augmented
/// generation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rag.example.toml` for a full example. A missing file
/// means built-in defaults.
#[derive(Parser)]
#[command(name = "rag", version, about = "Chat with a collection of transcripts")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, env = "RAG_CONFIG", default_value = "./config/rag.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Setup progress on stderr. Defaults to `human` on a TTY, otherwise `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session.
    ///
    /// Type questions at the prompt; `/help` lists the slash commands.
    Chat {
        /// Number of transcript chunks to retrieve per question.
        #[arg(short = 'n', long)]
        n_results: Option<usize>,
    },

    /// Build or refresh the vector store from the transcripts directory.
    ///
    /// Only new or changed transcripts are embedded unless `--rebuild`
    /// is given.
    Setup {
        /// Clear the collection and re-embed every transcript.
        #[arg(long)]
        rebuild: bool,
    },

    /// Search transcripts without generating a response.
    Search {
        query: String,

        /// Number of results to return.
        #[arg(short = 'n', long)]
        n_results: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask a single question and print the answer.
    Ask {
        question: String,

        /// Number of transcript chunks to use as context.
        #[arg(short = 'n', long)]
        n_results: Option<usize>,

        /// Also print the context block sent to the model.
        #[arg(long)]
        show_context: bool,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show transcript and vector store statistics.
    Stats,

    /// Run an end-to-end check: load, index if empty, search, and chat.
    Check,

    /// Start the HTTP JSON API.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("info,transcript_rag=debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn n_results(requested: Option<usize>, cfg: &Config) -> Result<usize> {
    match requested {
        Some(0) => bail!("--n-results must be >= 1"),
        Some(n) => Ok(n),
        None => Ok(cfg.retrieval.n_results),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Shell completions don't need config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "rag", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Chat { n_results: n } => {
            let n = n_results(n, &cfg)?;
            let chatbot = RagChatbot::from_config(cfg).await?;
            repl::run_chat(&chatbot, n, progress.as_ref()).await?;
        }
        Commands::Setup { rebuild } => {
            let chatbot = RagChatbot::from_config_retrieval_only(cfg).await?;
            setup::run_setup(&chatbot, rebuild, progress.as_ref()).await?;
        }
        Commands::Search {
            query,
            n_results: n,
            json,
        } => {
            let n = n_results(n, &cfg)?;
            let chatbot = RagChatbot::from_config_retrieval_only(cfg).await?;
            search::run_search(&chatbot, &query, n, json).await?;
        }
        Commands::Ask {
            question,
            n_results: n,
            show_context,
            json,
        } => {
            let n = n_results(n, &cfg)?;
            let chatbot = RagChatbot::from_config(cfg).await?;
            ask::run_ask(&chatbot, &question, n, show_context, json).await?;
        }
        Commands::Stats => {
            let chatbot = RagChatbot::from_config_retrieval_only(cfg).await?;
            stats::run_stats(&chatbot).await?;
        }
        Commands::Check => {
            let chatbot = RagChatbot::from_config(cfg).await?;
            setup::run_check(&chatbot, progress.as_ref()).await?;
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            let chatbot = RagChatbot::from_config_retrieval_only(cfg).await?;
            server::run_server(chatbot, &bind).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
