//! # RepoLens
//!
//! Ask natural-language questions about any git repository.
//!
//! RepoLens clones a repository once (shallow, cached), cuts its source
//! files into overlapping text fragments, embeds them into an in-memory
//! vector index, and answers questions by retrieving the nearest fragments
//! and handing them to a chat model as context. A structural pass extracts
//! function/class symbols to enrich both the retrieved context and the
//! repository summary.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌───────────┐   ┌─────────────┐
//! │ acquire  │──▶│ fragment  │──▶│ embedding │──▶│ VectorIndex │
//! │ git clone│   │ 500/50    │   │ provider  │   │ per-repo    │
//! └─────────┘   └───────────┘   └───────────┘   └──────┬──────┘
//!      │                                               │
//!      ▼                                               ▼
//! ┌───────────┐   ┌───────────┐              ┌──────────────┐
//! │ structure │──▶│ summarize │              │    engine    │
//! │ symbols   │   │ + offline │              │ ask/answer   │
//! └───────────┘   └───────────┘              └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`acquire`] | Cached shallow git checkouts |
//! | [`fragment`] | Overlapping text fragmentation |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory vector index with build states |
//! | [`structure`] | Regex-based symbol extraction |
//! | [`summarize`] | Repository summary with offline fallback |
//! | [`llm`] | Chat backend abstraction |
//! | [`engine`] | Intent shortcut, retrieval, answer generation |
//! | [`session`] | Orchestration: `analyze` and `ask` |

pub mod acquire;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod index;
pub mod llm;
pub mod models;
pub mod session;
pub mod structure;
pub mod summarize;

pub use error::{Error, Result};
pub use session::Session;
