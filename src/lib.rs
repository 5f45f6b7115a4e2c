//! # Transcript RAG
//!
//! A retrieval-augmented chatbot over a directory of transcript text files.
//!
//! Transcripts are split into overlapping windows, embedded, and stored in
//! SQLite. Questions are embedded the same way, the nearest windows are
//! formatted into a context block, and a chat-completion model answers from
//! that context.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │ Transcripts │──▶│ Chunk+Embed │──▶│  SQLite  │
//! │   *.txt     │   │             │   │ vectors  │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │ nearest chunks
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │  (rag)   │       │   API    │
//!                 └────┬─────┘       └────┬─────┘
//!                      └──────▶ LLM ◀─────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! rag setup                     # index ./transcripts
//! rag ask "How do founders think about hiring?"
//! rag chat                      # interactive session
//! rag serve                     # JSON API on 127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Core data types |
//! | [`loader`] | Transcript loading and corpus statistics |
//! | [`chunk`] | Fixed-window text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store trait, SQLite and in-memory backends |
//! | [`llm`] | Chat-completion provider |
//! | [`chatbot`] | Retrieval-augmented orchestration |
//! | [`server`] | HTTP JSON API |
//! | [`repl`] | Interactive chat loop |

pub mod ask;
pub mod chatbot;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod openai;
pub mod progress;
pub mod repl;
pub mod search;
pub mod server;
pub mod setup;
pub mod stats;
pub mod store;
