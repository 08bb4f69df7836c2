//! Behavioral Pattern Learning
//!
//! Records observations per behavioral category, aggregates them into
//! confidence-scored hypotheses, and decides which categories are confirmed
//! and which need active exploration.

pub mod subpatterns;
pub mod categories;
pub mod store;
pub mod aggregator;
pub mod detector;
pub mod feedback;
pub mod engine;
pub mod exploration;
pub mod context;

pub use subpatterns::{classify, describe, SubpatternDef};
pub use categories::SEED_CATEGORIES;
pub use store::{Category, Hypothesis, HypothesisStatus, Observation, PatternStore};
pub use detector::{DetectedSignal, SignalDetector};
pub use feedback::{DetectedFeedback, FeedbackInterpreter, FeedbackType};
pub use engine::{CategoryStatus, ConfirmedPattern, PatternLearner, TurnLearning};
pub use exploration::{get_guidance, ExplorationSelector, ExplorationTarget};
pub use context::{load_confirmed_context, render_confirmed};
