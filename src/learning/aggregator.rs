//! Hypothesis Aggregator - turns a category's observations into hypotheses
//!
//! Observations are partitioned by sub-pattern (absent = `general`). Every
//! partition with at least [`MIN_OBSERVATIONS`] members gets a hypothesis
//! whose confidence is `min(count * 10, 100)`. This is a count heuristic, not
//! a probability: recency, source and evidence quality are not weighted.

use chrono::Utc;
use rusqlite::Connection;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::store::{self, Category, Hypothesis, HypothesisStatus, Observation, GENERAL_GROUP};
use super::subpatterns;
use crate::error::Result;

/// Minimum observations in a group before a hypothesis is formed
pub const MIN_OBSERVATIONS: usize = 3;

/// Confidence points contributed by each observation
pub const POINTS_PER_OBSERVATION: usize = 10;

/// Confidence at which a hypothesis is confirmed
pub const CONFIRMED_THRESHOLD: u8 = 80;

/// A group this large that is still below [`EXPLORATION_MAX_CONFIDENCE`] is flagged
pub const EXPLORATION_MIN_OBSERVATIONS: usize = 10;

/// Confidence below which a large group is flagged for exploration
pub const EXPLORATION_MAX_CONFIDENCE: u8 = 30;

/// Boosted confidence at which the exploration flag is cleared
pub const EXPLORATION_CLEAR_CONFIDENCE: u8 = 70;

/// Computed hypothesis for one observation group, before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisDraft {
    pub sub_pattern: Option<String>,
    pub hypothesis: String,
    pub confidence: u8,
    pub supporting: u32,
}

/// Count-based confidence, capped at 100
pub fn formula_confidence(count: usize) -> u8 {
    count.saturating_mul(POINTS_PER_OBSERVATION).min(100) as u8
}

/// Natural-language hypothesis text for a group
pub fn hypothesis_text(category: &str, sub_pattern: Option<&str>, count: usize) -> String {
    match sub_pattern.filter(|s| *s != GENERAL_GROUP) {
        Some(key) => match subpatterns::describe(category, key) {
            Some(description) => format!("{} (observed {} times)", description, count),
            None => format!("Pattern: {} (observed {} times)", key, count),
        },
        None => format!("Pattern emerging in {} ({} observations)", category, count),
    }
}

/// Partition observations and draft a hypothesis for every group at threshold
pub fn aggregate(category: &str, observations: &[Observation]) -> Vec<HypothesisDraft> {
    let mut groups: BTreeMap<&str, (Option<&str>, usize)> = BTreeMap::new();
    for obs in observations {
        let entry = groups
            .entry(obs.group_key())
            .or_insert((obs.sub_pattern.as_deref(), 0));
        entry.1 += 1;
    }

    groups
        .into_values()
        .filter(|(_, count)| *count >= MIN_OBSERVATIONS)
        .map(|(sub_pattern, count)| {
            // "general" given explicitly folds into the unnamed group
            let sub_pattern = sub_pattern.filter(|s| *s != GENERAL_GROUP);
            HypothesisDraft {
                sub_pattern: sub_pattern.map(|s| s.to_string()),
                hypothesis: hypothesis_text(category, sub_pattern, count),
                confidence: formula_confidence(count),
                supporting: count as u32,
            }
        })
        .collect()
}

/// Apply the exploration flag and confirmation rules after a confidence change
pub fn apply_thresholds(hypothesis: &mut Hypothesis, group_size: usize) {
    if group_size >= EXPLORATION_MIN_OBSERVATIONS && hypothesis.confidence < EXPLORATION_MAX_CONFIDENCE {
        hypothesis.needs_exploration = true;
    }
    confirm_if_ready(hypothesis);
}

/// Promote to confirmed once confidence reaches the threshold. Never demotes.
pub fn confirm_if_ready(hypothesis: &mut Hypothesis) {
    if hypothesis.confidence >= CONFIRMED_THRESHOLD && hypothesis.status != HypothesisStatus::Confirmed {
        hypothesis.status = HypothesisStatus::Confirmed;
        info!(
            "Hypothesis confirmed for category {} group '{}' at {}%",
            hypothesis.category_id,
            hypothesis.group_key(),
            hypothesis.confidence
        );
    }
}

/// Recompute every group of a category and upsert the resulting hypotheses.
///
/// Stored confidence never decreases: an existing row keeps
/// `max(stored, formula)`, so feedback and exploration boosts survive later
/// passive observations. Without a boost this equals the formula exactly.
pub fn recompute(conn: &Connection, user_id: i64, category: &Category) -> Result<Vec<Hypothesis>> {
    let observations = store::observations_for(conn, user_id, category.id)?;
    let drafts = aggregate(&category.name, &observations);
    let mut touched = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let group = store::group_key(draft.sub_pattern.as_deref()).to_string();
        let now = Utc::now();

        let hypothesis = match store::find_hypothesis(conn, user_id, category.id, &group)? {
            Some(mut existing) => {
                existing.hypothesis = draft.hypothesis;
                existing.confidence = existing.confidence.max(draft.confidence);
                existing.supporting_observations = draft.supporting;
                // Contradiction tracking is intentionally inert
                existing.contradicting_observations = 0;
                existing.last_updated = now;
                apply_thresholds(&mut existing, draft.supporting as usize);
                store::update_hypothesis(conn, &existing)?;
                debug!(
                    "Updated hypothesis {} ({}:{}) -> {}%",
                    existing.id, category.name, group, existing.confidence
                );
                existing
            }
            None => {
                let mut fresh = Hypothesis {
                    id: 0,
                    user_id,
                    category_id: category.id,
                    sub_pattern: draft.sub_pattern,
                    hypothesis: draft.hypothesis,
                    confidence: draft.confidence,
                    supporting_observations: draft.supporting,
                    contradicting_observations: 0,
                    status: HypothesisStatus::Exploring,
                    needs_exploration: false,
                    last_updated: now,
                };
                apply_thresholds(&mut fresh, draft.supporting as usize);
                let stored = store::insert_hypothesis(conn, &fresh)?;
                info!(
                    "Formed hypothesis for {}:{} - {}",
                    category.name, group, stored.hypothesis
                );
                stored
            }
        };
        touched.push(hypothesis);
    }

    Ok(touched)
}
