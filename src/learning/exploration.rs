//! Exploration Selector - which category to probe next, and how
//!
//! Passive scanning only sees what the user happens to mention. When the user
//! asks to "dive deeper", the selector picks the category the engine knows
//! least about and hands back canned questions for it. Answers come back
//! through [`ExplorationSelector::record_session`], which trusts them more
//! than passive signals and bumps confidence directly.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::aggregator::{self, EXPLORATION_CLEAR_CONFIDENCE, MIN_OBSERVATIONS};
use super::engine::{record_and_recompute, PatternLearner};
use super::store::{self, best_hypothesis, Category, Hypothesis, GENERAL_GROUP};
use crate::error::{LearningError, Result};
use crate::types::ObservationContext;

/// Confidence added by one exploration session
pub const DEFAULT_CONFIDENCE_BUMP: u8 = 15;

/// Context `source` tag on observations recorded from a session
pub const SESSION_SOURCE: &str = "exploration_session";

/// Hypotheses below this are candidates for the low-confidence tier
pub const LOW_CONFIDENCE_CEILING: u8 = 50;

/// Questions used for categories without a hand-written entry
pub const FALLBACK_GUIDANCE: &[&str] = &[
    "Tell me more about this area",
    "When have you noticed patterns here?",
    "What works and what doesn't?",
];

/// Hand-written questions per seeded category
pub const GUIDANCE: &[(&str, &[&str])] = &[
    ("task_initiation", &[
        "What actually gets you started on tasks?",
        "Do you work better when someone else is around or on a call?",
        "Are external deadlines more effective than self-imposed ones?",
        "Do you need a specific routine or trigger before starting work?",
    ]),
    ("hyperfocus_triggers", &[
        "When do you get into deep focus - what's different about those times?",
        "Is it the type of work (creative vs analytical) or something else?",
        "Does time pressure help you focus or make it harder?",
        "What's the sweet spot between too easy and too hard for you?",
    ]),
    ("avoidance_reasons", &[
        "When you avoid a task, what's usually the real reason?",
        "Is it that you don't know how to start, or something else?",
        "Do you avoid boring tasks differently than scary ones?",
        "Does not knowing exactly what 'done' looks like make you avoid it?",
    ]),
    ("energy_patterns", &[
        "What drains your energy the most?",
        "Do meetings energize you or wipe you out?",
        "How does food timing affect your energy?",
        "Does creative work give you energy or take it?",
    ]),
    ("motivation_sources", &[
        "What actually motivates you to complete tasks?",
        "Is external validation important or not really?",
        "Do you work better on tasks that help others vs. yourself?",
        "Does competition or challenge drive you?",
    ]),
    ("communication_response", &[
        "What tone works best when I'm pushing you on something?",
        "Do you respond better to direct push or gentle suggestion?",
        "Does playful teasing work or shut you down?",
        "Do you want data/logic or emotional support?",
    ]),
    ("time_perception", &[
        "How accurate are you at estimating how long tasks take?",
        "Do you usually under or overestimate?",
        "Does it depend on the type of task?",
        "Do you have time blindness during hyperfocus?",
    ]),
    ("urgency_response", &[
        "How do you respond to deadline pressure?",
        "Do you thrive under pressure or freeze up?",
        "Do you wait until the last minute then execute perfectly?",
        "Is slight pressure helpful but extreme panic bad?",
    ]),
    ("accountability_effectiveness", &[
        "What type of accountability actually works for you?",
        "Are hard external deadlines more effective than soft ones?",
        "Do check-ins help or just add pressure?",
        "Does public commitment motivate you or create anxiety?",
    ]),
    ("context_switching_cost", &[
        "How do you handle switching between different types of tasks?",
        "Do interruptions kill your entire session or can you recover?",
        "Is it easier to switch between similar tasks than totally different ones?",
        "How much time do you need between different projects?",
    ]),
    ("momentum_building", &[
        "How do you build momentum for work?",
        "Do quick wins help you tackle bigger tasks?",
        "Do you need a warmup or go straight for hard stuff?",
        "Is there a routine that gets you into work mode?",
    ]),
    ("novelty_seeking", &[
        "How quickly do you get bored with the same project?",
        "Do you thrive on routine or need constant newness?",
        "Do you prefer mastering one thing or exploring many?",
        "How often do you need a new challenge?",
    ]),
    ("sensory_environment", &[
        "What environment helps you work best?",
        "Music, silence, or background noise?",
        "Does a clean or messy desk make a difference?",
        "Specific location or doesn't matter?",
    ]),
    ("decision_fatigue", &[
        "When do you notice your decision-making gets harder?",
        "Do too many options make it harder to choose?",
        "What time of day are decisions easiest for you?",
        "Do small decisions throughout the day drain you?",
    ]),
    ("task_breakdown_needs", &[
        "Do large projects overwhelm you without structure?",
        "Do you prefer detailed steps or general direction?",
        "Is it just the first step that needs to be clear?",
        "Do you like figuring it out yourself or want guidance?",
    ]),
    ("interruption_recovery", &[
        "When you're interrupted, how long does it take to get back?",
        "Do interruptions kill your session or can you recover?",
        "Does leaving notes help you resume?",
        "Are some types of interruptions worse than others?",
    ]),
    ("failure_response", &[
        "How do you handle it when things don't go as planned?",
        "Do you bounce back quickly or need processing time?",
        "Does 'what did we learn' help or feel patronizing?",
        "Do small failures hit harder than big ones?",
    ]),
    ("reward_sensitivity", &[
        "What kind of rewards actually motivate you?",
        "Do you need immediate rewards or does long-term payoff work?",
        "Is finishing a task itself satisfying, or do you need something else?",
        "Can you self-reward effectively or do you need external rewards?",
    ]),
];

/// Questions for a category, falling back to generic ones
pub fn get_guidance(category: &str) -> &'static [&'static str] {
    GUIDANCE
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, questions)| *questions)
        .unwrap_or(FALLBACK_GUIDANCE)
}

/// A category chosen for exploration, with what is known about it so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationTarget {
    pub category_id: i64,
    pub category: String,
    pub description: String,
    /// 0 when no hypothesis exists yet
    pub confidence: u8,
    pub observation_count: u32,
    pub hypothesis: Option<String>,
    pub needs_exploration: bool,
}

impl ExplorationTarget {
    fn build(category: &Category, observation_count: u32, hypothesis: Option<&Hypothesis>) -> Self {
        Self {
            category_id: category.id,
            category: category.name.clone(),
            description: category.description.clone(),
            confidence: hypothesis.map(|h| h.confidence).unwrap_or(0),
            observation_count,
            hypothesis: hypothesis.map(|h| h.hypothesis.clone()),
            needs_exploration: hypothesis.map(|h| h.needs_exploration).unwrap_or(false),
        }
    }
}

fn target_for(conn: &Connection, user_id: i64, category: &Category, hypothesis: Option<&Hypothesis>) -> Result<ExplorationTarget> {
    let count = store::count_observations(conn, user_id, category.id)?;
    Ok(ExplorationTarget::build(category, count, hypothesis))
}

/// Lowest confidence first, then earliest created
fn weakest<'a>(candidates: impl Iterator<Item = &'a Hypothesis>) -> Option<&'a Hypothesis> {
    candidates.min_by(|a, b| a.confidence.cmp(&b.confidence).then(a.id.cmp(&b.id)))
}

fn pick_next_in(conn: &Connection, user_id: i64) -> Result<Option<ExplorationTarget>> {
    let categories = store::list_categories(conn, user_id)?;
    let hypotheses = store::all_hypotheses(conn, user_id)?;
    let category_of = |h: &Hypothesis| categories.iter().find(|c| c.id == h.category_id);

    if let Some(flagged) = weakest(hypotheses.iter().filter(|h| h.needs_exploration)) {
        if let Some(category) = category_of(flagged) {
            debug!("Exploring flagged category {}", category.name);
            return target_for(conn, user_id, category, Some(flagged)).map(Some);
        }
    }

    let counts = store::observation_counts(conn, user_id)?;
    for category in &categories {
        let count = counts.get(&category.id).copied().unwrap_or(0);
        if (count as usize) < MIN_OBSERVATIONS {
            debug!("Exploring under-observed category {} ({} observations)", category.name, count);
            return Ok(Some(ExplorationTarget::build(category, count, None)));
        }
    }

    if let Some(low) = weakest(hypotheses.iter().filter(|h| h.confidence < LOW_CONFIDENCE_CEILING)) {
        if let Some(category) = category_of(low) {
            debug!("Exploring low-confidence category {} ({}%)", category.name, low.confidence);
            return target_for(conn, user_id, category, Some(low)).map(Some);
        }
    }

    Ok(None)
}

/// Hypothesis a session bump applies to: the weakest flagged one, then
/// `general`, then the weakest overall
fn bump_target(hypotheses: &[Hypothesis]) -> Option<&Hypothesis> {
    weakest(hypotheses.iter().filter(|h| h.needs_exploration))
        .or_else(|| hypotheses.iter().find(|h| h.group_key() == GENERAL_GROUP))
        .or_else(|| weakest(hypotheses.iter()))
}

fn record_session_in(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    insights: &[String],
    bump: u8,
) -> Result<Option<Hypothesis>> {
    let category = store::get_category(conn, user_id, category_id)?
        .ok_or_else(|| LearningError::CategoryNotFound(category_id.to_string()))?;

    let mut context = ObservationContext::new();
    context.insert("source".to_string(), json!(SESSION_SOURCE));
    for insight in insights {
        record_and_recompute(conn, user_id, &category, None, insight, &context)?;
    }

    let hypotheses = store::hypotheses_for(conn, user_id, category.id)?;
    let Some(target) = bump_target(&hypotheses) else {
        debug!("No hypothesis to bump in {} after session", category.name);
        return Ok(None);
    };

    let mut hypothesis = target.clone();
    hypothesis.confidence = hypothesis.confidence.saturating_add(bump).min(100);
    if hypothesis.confidence >= EXPLORATION_CLEAR_CONFIDENCE {
        hypothesis.needs_exploration = false;
    }
    hypothesis.last_updated = Utc::now();
    aggregator::confirm_if_ready(&mut hypothesis);
    store::update_hypothesis(conn, &hypothesis)?;

    info!(
        "Exploration session on {} recorded {} insights, confidence now {}%",
        category.name,
        insights.len(),
        hypothesis.confidence
    );
    Ok(Some(hypothesis))
}

/// On-demand exploration over one user's categories
#[derive(Clone)]
pub struct ExplorationSelector {
    learner: PatternLearner,
}

impl ExplorationSelector {
    pub fn new(learner: PatternLearner) -> Self {
        Self { learner }
    }

    /// Pick the category to probe next.
    ///
    /// Priority: a flagged hypothesis, then a category under the observation
    /// threshold (creation order), then the weakest hypothesis below 50.
    /// `None` means there is nothing worth exploring.
    pub async fn pick_next(&self) -> Result<Option<ExplorationTarget>> {
        let user_id = self.learner.user_id();
        self.learner.store().read(|conn| pick_next_in(conn, user_id)).await
    }

    /// First category (by creation) whose name contains `name`, ignoring case
    pub async fn get_category_by_name(&self, name: &str) -> Result<Option<ExplorationTarget>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let user_id = self.learner.user_id();
        self.learner
            .store()
            .read(|conn| {
                let Some(category) = store::list_categories(conn, user_id)?
                    .into_iter()
                    .find(|c| c.name.to_lowercase().contains(&needle))
                else {
                    return Ok(None);
                };
                let hypotheses = store::hypotheses_for(conn, user_id, category.id)?;
                target_for(conn, user_id, &category, best_hypothesis(&hypotheses)).map(Some)
            })
            .await
    }

    pub fn guidance(&self, category: &str) -> &'static [&'static str] {
        get_guidance(category)
    }

    /// Record the user's answers and bump the category's confidence.
    ///
    /// Returns the bumped hypothesis, or `None` if the category still has no
    /// hypothesis after the insights were recorded.
    pub async fn record_session(&self, category_id: i64, insights: &[String], bump: u8) -> Result<Option<Hypothesis>> {
        let user_id = self.learner.user_id();
        self.learner
            .store()
            .write(|tx| record_session_in(tx, user_id, category_id, insights, bump))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::store::PatternStore;

    async fn selector() -> (PatternLearner, ExplorationSelector) {
        let learner = PatternLearner::new(PatternStore::open_in_memory().unwrap(), 1);
        learner.seed_categories().await.unwrap();
        (learner.clone(), ExplorationSelector::new(learner))
    }

    async fn observe(learner: &PatternLearner, category: &str, times: usize) {
        for _ in 0..times {
            learner
                .record_signal(category, "noted", ObservationContext::new(), None)
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_guidance_table() {
        assert_eq!(GUIDANCE.len(), 18);
        for (_, questions) in GUIDANCE {
            assert!((3..=4).contains(&questions.len()));
        }
        assert_eq!(get_guidance("energy_patterns")[0], "What drains your energy the most?");
        assert_eq!(get_guidance("made_up"), FALLBACK_GUIDANCE);
    }

    #[tokio::test]
    async fn test_fresh_user_explores_first_category() {
        let (_, selector) = selector().await;
        let target = selector.pick_next().await.unwrap().unwrap();
        assert_eq!(target.category, "task_initiation");
        assert_eq!(target.observation_count, 0);
        assert_eq!(target.confidence, 0);
        assert!(target.hypothesis.is_none());
    }

    #[tokio::test]
    async fn test_name_lookup_is_fuzzy() {
        let (_, selector) = selector().await;
        let target = selector.get_category_by_name("ENERGY").await.unwrap().unwrap();
        assert_eq!(target.category, "energy_patterns");

        // "task" matches task_initiation before task_breakdown_needs
        let target = selector.get_category_by_name("task").await.unwrap().unwrap();
        assert_eq!(target.category, "task_initiation");

        assert!(selector.get_category_by_name("zzz").await.unwrap().is_none());
        assert!(selector.get_category_by_name("  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_bumps_and_clears_flag() {
        let (learner, selector) = selector().await;
        observe(&learner, "failure_response", 3).await;
        let category = selector.get_category_by_name("failure_response").await.unwrap().unwrap();

        let insights = vec!["I need a day to process".to_string()];
        let bumped = selector
            .record_session(category.category_id, &insights, DEFAULT_CONFIDENCE_BUMP)
            .await
            .unwrap()
            .unwrap();
        // 4 observations -> 40, plus the bump
        assert_eq!(bumped.confidence, 55);
        assert!(!bumped.is_confirmed());

        let observations = learner.observations("failure_response").await.unwrap();
        assert_eq!(observations.len(), 4);
        assert_eq!(observations[3].context["source"], json!(SESSION_SOURCE));
    }

    #[tokio::test]
    async fn test_session_without_hypothesis_does_not_bump() {
        let (learner, selector) = selector().await;
        let category = selector.get_category_by_name("novelty").await.unwrap().unwrap();
        let result = selector
            .record_session(category.category_id, &["I get bored fast".to_string()], 15)
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(learner.observations("novelty_seeking").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_session_for_foreign_category_fails() {
        let (_, selector) = selector().await;
        let err = selector.record_session(9999, &[], 15).await.unwrap_err();
        assert!(matches!(err, LearningError::CategoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_session_bumps_flagged_sub_pattern_first() {
        let (learner, selector) = selector().await;
        observe(&learner, "sensory_environment", 3).await;
        for _ in 0..3 {
            learner
                .record_signal("sensory_environment", "music on", ObservationContext::new(), Some("music"))
                .await
                .unwrap();
        }

        let mut flagged = learner
            .hypotheses("sensory_environment")
            .await
            .unwrap()
            .into_iter()
            .find(|h| h.group_key() == "music")
            .unwrap();
        flagged.needs_exploration = true;
        learner.store().write(|tx| store::update_hypothesis(tx, &flagged)).await.unwrap();

        let category = selector.pick_next().await.unwrap().unwrap();
        assert_eq!(category.category, "sensory_environment");
        for _ in 0..4 {
            selector.record_session(category.category_id, &[], 15).await.unwrap();
        }

        let hypotheses = learner.hypotheses("sensory_environment").await.unwrap();
        let music = hypotheses.iter().find(|h| h.group_key() == "music").unwrap();
        let general = hypotheses.iter().find(|h| h.group_key() == GENERAL_GROUP).unwrap();
        // Three bumps take the flagged group to 75 and clear it; the fourth goes to general
        assert_eq!(music.confidence, 75);
        assert!(!music.needs_exploration);
        assert_eq!(general.confidence, 45);

        let next = selector.pick_next().await.unwrap().unwrap();
        assert_eq!(next.category, "task_initiation");
    }

    #[tokio::test]
    async fn test_bump_confirms_at_threshold() {
        let (learner, selector) = selector().await;
        observe(&learner, "urgency_response", 7).await;
        let category = selector.get_category_by_name("urgency").await.unwrap().unwrap();

        let bumped = selector
            .record_session(category.category_id, &[], 15)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bumped.confidence, 85);
        assert!(bumped.is_confirmed());
    }
}
