//! # course-rag
//!
//! Question answering over course materials. Course documents are parsed,
//! chunked, and embedded into two vector collections (a course catalog and
//! the chunk content); a tool-calling LLM searches them to answer
//! questions, with short per-session conversation memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │ Course docs │──▶│ Parse+Chunk  │──▶│ SQLite          │
//! │ .txt / .md  │   │ + Embed      │   │ catalog+content │
//! └─────────────┘   └──────────────┘   └────────┬────────┘
//!                                               │
//!                  ┌──────────────┐   ┌─────────┴───────┐
//!   question ─────▶│  RagSystem   │──▶│ search / outline│
//!                  │ LLM + memory │◀──│     tools       │
//!                  └──────┬───────┘   └─────────────────┘
//!                         ▼
//!                  answer + sources (CLI / HTTP)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! crag init                          # create database
//! crag ingest --folder ./docs        # load course documents
//! crag ask "What is covered in lesson 2 of the MCP course?"
//! crag serve                         # HTTP API on [server].bind
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] / [`migrate`] | SQLite connection and schema |
//! | [`sqlite_store`] | SQLite-backed vector store |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama, local) |
//! | [`llm`] | Chat model client (Anthropic Messages API) |
//! | [`tools`] | Course search and outline tools, tool registry |
//! | [`generator`] | Tool-calling answer generation |
//! | [`memory`] | Per-session conversation history |
//! | [`rag`] | Query coordinator |
//! | [`ingest`] | Folder scanning and course ingestion |
//! | [`search`] / [`stats`] | CLI search and catalog commands |
//! | [`server`] | HTTP server |

pub mod config;
pub mod db;
pub mod embedding;
pub mod generator;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod migrate;
pub mod rag;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;
