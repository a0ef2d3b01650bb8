//! # semdex
//!
//! A single-process semantic document index. Documents (PDF, DOCX, TXT,
//! XLSX, XLS) are uploaded, split into token-aware overlapping chunks,
//! embedded into fixed-dimension vectors, and persisted under a single data
//! directory. Queries are answered by cosine similarity over the stored
//! vectors.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────┐
//! │ Upload   │──▶│ Processor     │──▶│ VectorStore │
//! │ CLI/HTTP │   │ extract+chunk │   │ embed+index │
//! └──────────┘   └───────────────┘   └──────┬──────┘
//!                                           │
//!                        ┌──────────────────┤
//!                        ▼                  ▼
//!                   ┌─────────┐       ┌──────────┐
//!                   │   CLI   │       │   HTTP   │
//!                   │ (semdex)│       │  (axum)  │
//!                   └─────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! semdex ingest report.pdf          # process and index a document
//! semdex search "quarterly revenue" # semantic search
//! semdex serve                      # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-format text extraction |
//! | [`processor`] | Text cleanup and token-aware chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index backends |
//! | [`store`] | Vector + metadata persistence and retrieval |
//! | [`registry`] | Document registry and lifecycle |
//! | [`worker`] | Bounded background worker pool |
//! | [`orchestrator`] | Document lifecycle orchestration |
//! | [`server`] | HTTP API |

pub mod config;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod models;
pub mod orchestrator;
pub mod processor;
pub mod registry;
pub mod server;
pub mod store;
pub mod worker;
