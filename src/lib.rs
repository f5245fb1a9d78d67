//! # SpaceX RAG
//!
//! Retrieval-augmented question answering over a local directory of SpaceX
//! launch notes, plus a passthrough to the public SpaceX launch-data API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Corpus dir │──▶│ Chunk+Embed │──▶│ VectorIndex │◀─ index.json
//! │  *.md *.txt │   │  (provider) │   │  (cosine)   │   (optional)
//! └─────────────┘   └─────────────┘   └──────┬──────┘
//!                                            │ top-k
//!                    ┌──────────┐      ┌─────▼─────┐     ┌────────────┐
//!   GET /ask ──────▶ │  axum    │ ───▶ │ RagEngine │ ──▶ │ Answer LLM │
//!   GET /launches ─▶ │  server  │ ─┐   └───────────┘     └────────────┘
//!                    └──────────┘  └──▶ api.spacexdata.com
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`connector_fs`] | Corpus directory scanner |
//! | [`chunk`] | Paragraph chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Answer provider abstraction |
//! | [`index`] | Vector index build/search/persist |
//! | [`prompt`] | Prompt assembly and source previews |
//! | [`engine`] | Retrieval-augmented query engine |
//! | [`launches`] | Launch-data API proxy |
//! | [`server`] | HTTP server |

pub mod chunk;
pub mod config;
pub mod connector_fs;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod index;
pub mod launches;
pub mod llm;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod retry;
pub mod server;
