//! Pattern Learning - behavioral pattern engine library
//!
//! Accumulates observations per behavioral category from conversation turns,
//! aggregates them into confidence-scored hypotheses, and exposes what has
//! been confirmed back to the conversation layer:
//! - Keyword sub-pattern classifier
//! - SQLite-backed observation and hypothesis store
//! - Explicit feedback interpreter
//! - Exploration selector for categories the engine knows little about
//!
//! # Example
//!
//! ```ignore
//! use pattern_learning::{PatternLearner, PatternStore, Turn};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let learner = PatternLearner::new(PatternStore::open("patterns.db").await?, 1);
//!     learner.seed_categories().await?;
//!     let outcome = learner.ingest_turn(&Turn::new("maybe later, I'm tired", None)).await;
//!     println!("{} observations", outcome.observations_recorded);
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod learning;
pub mod cli;

pub use config::Config;
pub use error::{LearningError, Result};
pub use types::{ObservationContext, Role, Turn};

pub use learning::{
    CategoryStatus,
    ConfirmedPattern,
    ExplorationSelector,
    ExplorationTarget,
    Hypothesis,
    HypothesisStatus,
    Observation,
    PatternLearner,
    PatternStore,
    TurnLearning,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Keep at most `max_len` characters without splitting a UTF-8 sequence
pub fn truncate_safe(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
