//! Pattern Learner - the in-process contract the conversation layer talks to
//!
//! Each call is scoped to one user and runs as a single transaction, so an
//! observation and the recomputed hypotheses are durable together before the
//! caller sends its reply.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::aggregator;
use super::categories::SEED_CATEGORIES;
use super::detector::SignalDetector;
use super::feedback::{self, DetectedFeedback, FeedbackInterpreter};
use super::store::{self, best_hypothesis, Category, Hypothesis, HypothesisStatus, Observation, PatternStore};
use crate::error::Result;
use crate::types::{ObservationContext, Turn};

/// A confirmed hypothesis handed to the prompt renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedPattern {
    pub category: String,
    pub sub_pattern: Option<String>,
    pub hypothesis: String,
    pub confidence: u8,
}

/// Dashboard row for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStatus {
    pub category: String,
    pub description: String,
    pub observation_count: u32,
    /// Confidence of the strongest hypothesis, 0 when none exists
    pub confidence: u8,
    pub hypothesis: Option<String>,
    /// True when any hypothesis in the category is flagged
    pub needs_exploration: bool,
    pub status: Option<HypothesisStatus>,
}

impl CategoryStatus {
    pub(crate) fn build(category: &Category, observation_count: u32, hypotheses: &[Hypothesis]) -> Self {
        let best = best_hypothesis(hypotheses);
        Self {
            category: category.name.clone(),
            description: category.description.clone(),
            observation_count,
            confidence: best.map(|h| h.confidence).unwrap_or(0),
            hypothesis: best.map(|h| h.hypothesis.clone()),
            needs_exploration: hypotheses.iter().any(|h| h.needs_exploration),
            status: best.map(|h| h.status),
        }
    }
}

/// What the engine did with one conversation turn
#[derive(Debug, Clone, Default)]
pub struct TurnLearning {
    /// Confirmation phrase when the user gave explicit feedback
    pub confirmation: Option<&'static str>,
    pub feedback: Option<DetectedFeedback>,
    pub observations_recorded: usize,
    /// Set to "learning update failed: ..." when storage failed
    pub error: Option<String>,
}

/// Append an observation and recompute every group of its category
pub(crate) fn record_and_recompute(
    conn: &Connection,
    user_id: i64,
    category: &Category,
    sub_pattern: Option<&str>,
    text: &str,
    context: &ObservationContext,
) -> Result<Observation> {
    let observation = store::insert_observation(conn, user_id, category.id, sub_pattern, text, context)?;
    aggregator::recompute(conn, user_id, category)?;
    Ok(observation)
}

/// Record by category name; unknown categories are a silent no-op
fn record_by_name(
    conn: &Connection,
    user_id: i64,
    category_name: &str,
    text: &str,
    context: &ObservationContext,
    sub_pattern: Option<&str>,
) -> Result<Option<Observation>> {
    match store::find_category(conn, user_id, category_name)? {
        Some(category) => record_and_recompute(conn, user_id, &category, sub_pattern, text, context).map(Some),
        None => {
            debug!("Ignoring signal for unknown category '{}'", category_name);
            Ok(None)
        }
    }
}

/// User-scoped entry point into the learning engine
#[derive(Clone)]
pub struct PatternLearner {
    store: PatternStore,
    user_id: i64,
    interpreter: FeedbackInterpreter,
    detector: SignalDetector,
}

impl PatternLearner {
    pub fn new(store: PatternStore, user_id: i64) -> Self {
        Self {
            store,
            user_id,
            interpreter: FeedbackInterpreter::default(),
            detector: SignalDetector::new(),
        }
    }

    /// Use a different assistant name for feedback address triggers
    pub fn with_assistant_name(mut self, name: &str) -> Self {
        self.interpreter = FeedbackInterpreter::new(name);
        self
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    /// Create the 18 system categories. Existing names are skipped.
    pub async fn seed_categories(&self) -> Result<usize> {
        let user_id = self.user_id;
        self.store
            .write(|tx| {
                let mut created = 0;
                for (name, description) in SEED_CATEGORIES {
                    if store::find_category(tx, user_id, name)?.is_none() {
                        store::insert_category(tx, user_id, name, description, true)?;
                        created += 1;
                    }
                }
                Ok(created)
            })
            .await
    }

    /// Create a user-defined category
    pub async fn create_category(&self, name: &str, description: &str) -> Result<Category> {
        let user_id = self.user_id;
        self.store
            .write(|tx| store::insert_category(tx, user_id, name, description, false))
            .await
    }

    /// Record one observation and recompute its category.
    ///
    /// Returns `Ok(None)` without touching storage when the category does
    /// not exist for this user.
    pub async fn record_signal(
        &self,
        category_name: &str,
        text: &str,
        context: ObservationContext,
        sub_pattern: Option<&str>,
    ) -> Result<Option<Observation>> {
        let user_id = self.user_id;
        self.store
            .write(|tx| record_by_name(tx, user_id, category_name, text, &context, sub_pattern))
            .await
    }

    /// Confirmed hypotheses at or above `min_confidence`, strongest first
    pub async fn get_confirmed(&self, min_confidence: u8) -> Result<Vec<ConfirmedPattern>> {
        let user_id = self.user_id;
        self.store
            .read(|conn| {
                let names: HashMap<i64, String> = store::list_categories(conn, user_id)?
                    .into_iter()
                    .map(|c| (c.id, c.name))
                    .collect();

                let mut confirmed: Vec<ConfirmedPattern> = store::all_hypotheses(conn, user_id)?
                    .into_iter()
                    .filter(|h| h.is_confirmed() && h.confidence >= min_confidence)
                    .filter_map(|h| {
                        names.get(&h.category_id).map(|name| ConfirmedPattern {
                            category: name.clone(),
                            sub_pattern: h.sub_pattern,
                            hypothesis: h.hypothesis,
                            confidence: h.confidence,
                        })
                    })
                    .collect();
                confirmed.sort_by(|a, b| b.confidence.cmp(&a.confidence));
                Ok(confirmed)
            })
            .await
    }

    /// Status row for every category in creation order
    pub async fn get_all_status(&self) -> Result<Vec<CategoryStatus>> {
        let user_id = self.user_id;
        self.store
            .read(|conn| {
                let counts = store::observation_counts(conn, user_id)?;
                let hypotheses = store::all_hypotheses(conn, user_id)?;

                Ok(store::list_categories(conn, user_id)?
                    .iter()
                    .map(|category| {
                        let own: Vec<Hypothesis> = hypotheses
                            .iter()
                            .filter(|h| h.category_id == category.id)
                            .cloned()
                            .collect();
                        let count = counts.get(&category.id).copied().unwrap_or(0);
                        CategoryStatus::build(category, count, &own)
                    })
                    .collect())
            })
            .await
    }

    /// Status for a single category by exact name
    pub async fn category_status(&self, name: &str) -> Result<Option<CategoryStatus>> {
        let user_id = self.user_id;
        self.store
            .read(|conn| {
                let Some(category) = store::find_category(conn, user_id, name)? else {
                    return Ok(None);
                };
                let count = store::count_observations(conn, user_id, category.id)?;
                let hypotheses = store::hypotheses_for(conn, user_id, category.id)?;
                Ok(Some(CategoryStatus::build(&category, count, &hypotheses)))
            })
            .await
    }

    /// Status rows for categories with at least one flagged hypothesis
    pub async fn categories_needing_exploration(&self) -> Result<Vec<CategoryStatus>> {
        Ok(self
            .get_all_status()
            .await?
            .into_iter()
            .filter(|s| s.needs_exploration)
            .collect())
    }

    /// Observation log for a category, oldest first
    pub async fn observations(&self, name: &str) -> Result<Vec<Observation>> {
        let user_id = self.user_id;
        self.store
            .read(|conn| match store::find_category(conn, user_id, name)? {
                Some(category) => store::observations_for(conn, user_id, category.id),
                None => Ok(Vec::new()),
            })
            .await
    }

    /// Hypotheses for a category
    pub async fn hypotheses(&self, name: &str) -> Result<Vec<Hypothesis>> {
        let user_id = self.user_id;
        self.store
            .read(|conn| match store::find_category(conn, user_id, name)? {
                Some(category) => store::hypotheses_for(conn, user_id, category.id),
                None => Ok(Vec::new()),
            })
            .await
    }

    /// Classify whether a message is explicit feedback
    pub fn detect_feedback(&self, text: &str) -> DetectedFeedback {
        self.interpreter.detect(text)
    }

    /// Record feedback and floor its hypothesis; returns the confirmation phrase
    pub async fn apply_feedback(&self, detected: &DetectedFeedback) -> Result<Option<&'static str>> {
        if !detected.is_feedback {
            return Ok(None);
        }
        let user_id = self.user_id;
        self.store
            .write(|tx| feedback::apply_in(tx, user_id, detected))
            .await
    }

    /// Scan a turn for passive signals and record them in one transaction
    pub async fn scan_turn(&self, user_message: &str, assistant_reply: Option<&str>) -> Result<Vec<Observation>> {
        let signals = self.detector.scan(user_message, assistant_reply);
        if signals.is_empty() {
            return Ok(Vec::new());
        }

        let user_id = self.user_id;
        self.store
            .write(|tx| {
                let mut recorded = Vec::with_capacity(signals.len());
                for signal in &signals {
                    if let Some(obs) = record_by_name(
                        tx,
                        user_id,
                        signal.category,
                        &signal.observation,
                        &signal.context,
                        signal.sub_pattern,
                    )? {
                        recorded.push(obs);
                    }
                }
                Ok(recorded)
            })
            .await
    }

    /// Best-effort learning for one conversation turn.
    ///
    /// Feedback is applied first, then passive signals are recorded. Storage
    /// failures are logged and reported in the outcome, never raised, so the
    /// reply can always be delivered.
    pub async fn ingest_turn(&self, turn: &Turn) -> TurnLearning {
        let mut outcome = TurnLearning::default();

        let detected = self.detect_feedback(&turn.user_message);
        if detected.is_feedback {
            match self.apply_feedback(&detected).await {
                Ok(confirmation) => outcome.confirmation = confirmation,
                Err(e) => {
                    warn!("Learning update failed while applying feedback: {}", e);
                    outcome.error = Some(format!("learning update failed: {}", e));
                }
            }
            outcome.feedback = Some(detected);
        }

        match self.scan_turn(&turn.user_message, turn.assistant_reply.as_deref()).await {
            Ok(recorded) => outcome.observations_recorded = recorded.len(),
            Err(e) => {
                warn!("Learning update failed while scanning turn: {}", e);
                outcome.error = Some(format!("learning update failed: {}", e));
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn learner() -> PatternLearner {
        let store = PatternStore::open_in_memory().unwrap();
        let learner = PatternLearner::new(store, 1);
        learner.seed_categories().await.unwrap();
        learner
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let learner = learner().await;
        assert_eq!(learner.seed_categories().await.unwrap(), 0);
        assert_eq!(learner.get_all_status().await.unwrap().len(), 18);
    }

    #[tokio::test]
    async fn test_unknown_category_is_noop() {
        let learner = learner().await;
        let recorded = learner
            .record_signal("not_a_category", "anything", ObservationContext::new(), None)
            .await
            .unwrap();
        assert!(recorded.is_none());
    }

    #[tokio::test]
    async fn test_status_reflects_observations() {
        let learner = learner().await;
        for _ in 0..4 {
            learner
                .record_signal("decision_fatigue", "so many options", ObservationContext::new(), Some("too_many_options"))
                .await
                .unwrap();
        }

        let status = learner.category_status("decision_fatigue").await.unwrap().unwrap();
        assert_eq!(status.observation_count, 4);
        assert_eq!(status.confidence, 40);
        assert_eq!(status.hypothesis.as_deref(), Some("Too many options (observed 4 times)"));
        assert_eq!(status.status, Some(HypothesisStatus::Exploring));
        assert!(!status.needs_exploration);

        assert!(learner.category_status("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = PatternStore::open_in_memory().unwrap();
        let alice = PatternLearner::new(store.clone(), 1);
        let bob = PatternLearner::new(store, 2);
        alice.seed_categories().await.unwrap();
        bob.seed_categories().await.unwrap();

        for _ in 0..3 {
            alice
                .record_signal("failure_response", "try again", ObservationContext::new(), None)
                .await
                .unwrap();
        }

        assert_eq!(alice.hypotheses("failure_response").await.unwrap().len(), 1);
        assert!(bob.hypotheses("failure_response").await.unwrap().is_empty());
        assert!(bob.observations("failure_response").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_turn_records_signals() {
        let learner = learner().await;
        let outcome = learner
            .ingest_turn(&Turn::new("I'm exhausted, maybe tomorrow", None))
            .await;
        assert!(outcome.error.is_none());
        assert!(outcome.confirmation.is_none());
        assert_eq!(outcome.observations_recorded, 2);
    }
}
