//! # Repo Harness
//!
//! Ask questions about a code repository and its documentation.
//!
//! A repository (local path or git URL) and, optionally, a documentation
//! site are loaded into documents, split into overlapping fragments,
//! embedded, and written in batches into a named collection. At query time
//! a language model picks between two filtered search tools, `search_repo`
//! and `search_docs`, and answers from what they return.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌────────────────┐
//! │ Repo / Docs │──▶│  Fragment   │──▶│   Collection   │
//! │  adapters   │   │ + batch     │   │ SQLite + vecs  │
//! └─────────────┘   └─────────────┘   └───────┬────────┘
//!                                             │
//!                         ┌───────────────────┤
//!                         ▼                   ▼
//!                  ┌─────────────┐     ┌─────────────┐
//!                  │ Tool router │     │  MCP stdio  │
//!                  │ (HTTP /ask) │     │ (annotated) │
//!                  └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rh ingest --repo https://github.com/owner/project --docs-url https://docs.example.com
//! rh ask "How do I configure the server?"
//! rh serve http                 # POST /ask, /tools/*
//! rh serve stdio                # MCP over stdin/stdout
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`repo`] | Repository clone/walk into documents |
//! | [`docs`] | Sitemap crawl into documents |
//! | [`ingest`] | Ingestion pipeline |
//! | [`collections`] | Named collections under the data root |
//! | [`sqlite_store`] | SQLite-backed vector store |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Tool-calling language model clients |
//! | [`agent`] | Tool router wiring |
//! | [`server`] | HTTP server |
//! | [`mcp`] | MCP stdio server |
//! | [`stats`] | Inspection commands |

pub mod agent;
pub mod collections;
pub mod config;
pub mod db;
pub mod docs;
pub mod embedding;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod migrate;
pub mod progress;
pub mod repo;
pub mod server;
pub mod sqlite_store;
pub mod stats;
