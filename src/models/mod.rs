//! Core data models for papers and the records each pipeline stage produces.

mod digest;
mod paper;
mod query;

pub use digest::{
    clamp_score, DigestEntry, EnrichedPaper, ScoredPaper, MAX_FIELD_WORDS, MAX_SCORE, MIN_SCORE,
};
pub use paper::{Author, Paper, PaperBuilder};
pub use query::{DateWindow, FetchQuery};
