//! # Paper Digest
//!
//! A scheduled research digest: fetch recent arXiv preprints, narrow them down
//! with cheap batched LLM calls, analyze the best few in depth, and deliver the
//! result by email or webhook.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Paper, ScoredPaper, DigestEntry, ...)
//! - [`sources`]: Preprint sources behind the [`Source`] trait (arXiv)
//! - [`llm`]: Completion clients behind the [`llm::CompletionClient`] trait
//! - [`enrich`]: Community feedback search and PDF full text
//! - [`pipeline`]: Filter, score, select, analyze and the run orchestration
//! - [`notify`]: Email and webhook delivery
//! - [`utils`]: HTTP client, retry, PDF extraction and text helpers
//! - [`config`]: Configuration management

pub mod config;
pub mod enrich;
pub mod llm;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use models::{DigestEntry, Paper};
pub use pipeline::{Pipeline, PipelineError, RunReport};
pub use sources::Source;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
