//! Feedback Interpreter - explicit user instructions to the assistant
//!
//! Detects messages like "remember I work best in the mornings" or "be more
//! direct", records them as observations, and floors the category's general
//! hypothesis at [`FEEDBACK_CONFIDENCE_FLOOR`]. Explicit feedback overrides
//! the passive count formula and is the one path that may create a
//! hypothesis for a group below the observation threshold.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::aggregator::{self, EXPLORATION_CLEAR_CONFIDENCE};
use super::categories::FEEDBACK_CATEGORY_DESCRIPTION;
use super::engine::record_and_recompute;
use super::store::{self, Category, Hypothesis, HypothesisStatus, GENERAL_GROUP};
use crate::error::Result;
use crate::types::ObservationContext;

/// Confidence floor applied after explicit feedback
pub const FEEDBACK_CONFIDENCE_FLOOR: u8 = 85;

/// Boost marker stored in the observation context
pub const FEEDBACK_CONFIDENCE_BOOST: u8 = 40;

/// Category used when feedback does not route anywhere more specific
pub const DEFAULT_FEEDBACK_CATEGORY: &str = "communication_style";

/// Phrases that mark a message as an instruction to the assistant
const FEEDBACK_TRIGGERS: &[&str] = &[
    "remember ",
    "don't forget",
    "please remember",
    "from now on",
    "stop ",
    "don't ",
    "i prefer",
    "i like when",
    "i don't like when",
    "be more",
    "be less",
    "you should",
    "can you be",
];

const TONE_KEYWORDS: &[&str] = &["formal", "casual", "friendly", "professional", "playful", "serious", "tone"];
const QUESTION_KEYWORDS: &[&str] = &["questions", "asking", "stop asking", "don't ask"];
const DIRECTNESS_KEYWORDS: &[&str] = &["direct", "blunt", "straight", "to the point"];
const TIME_OF_DAY_KEYWORDS: &[&str] = &["morning", "afternoon", "evening", "night", "time"];
const TASK_KEYWORDS: &[&str] = &["task", "work", "project"];

/// Kind of instruction the user gave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Tone,
    Style,
    Pattern,
    General,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Tone => "tone",
            FeedbackType::Style => "style",
            FeedbackType::Pattern => "pattern",
            FeedbackType::General => "general",
        }
    }

    /// Fixed confirmation the caller can surface to the user
    pub fn confirmation(&self) -> &'static str {
        match self {
            FeedbackType::Tone => "Got it, adjusting my tone!",
            FeedbackType::Style => "Understood, I'll adapt my style!",
            FeedbackType::Pattern => "Noted! I'll remember that.",
            FeedbackType::General => "Got it!",
        }
    }
}

impl std::fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of scanning one message for feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFeedback {
    pub is_feedback: bool,
    pub feedback_type: Option<FeedbackType>,
    pub instruction: String,
    pub category: Option<String>,
}

impl DetectedFeedback {
    fn none(text: &str) -> Self {
        Self {
            is_feedback: false,
            feedback_type: None,
            instruction: text.to_string(),
            category: None,
        }
    }

    fn found(text: &str, feedback_type: FeedbackType, category: &str) -> Self {
        Self {
            is_feedback: true,
            feedback_type: Some(feedback_type),
            instruction: text.to_string(),
            category: Some(category.to_string()),
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Detects explicit instructions addressed to the assistant
#[derive(Debug, Clone)]
pub struct FeedbackInterpreter {
    /// "<name>, " and "hey <name>," style triggers
    address_triggers: Vec<String>,
}

impl Default for FeedbackInterpreter {
    fn default() -> Self {
        Self::new("Sandy")
    }
}

impl FeedbackInterpreter {
    /// Create an interpreter that also treats direct address by name as a trigger
    pub fn new(assistant_name: &str) -> Self {
        let name = assistant_name.trim().to_lowercase();
        let address_triggers = if name.is_empty() {
            Vec::new()
        } else {
            vec![format!("{}, ", name), format!("hey {},", name)]
        };
        Self { address_triggers }
    }

    fn is_triggered(&self, lower: &str) -> bool {
        self.address_triggers.iter().any(|t| lower.contains(t.as_str()))
            || contains_any(lower, FEEDBACK_TRIGGERS)
    }

    /// Classify whether the message is an instruction and where it belongs
    pub fn detect(&self, text: &str) -> DetectedFeedback {
        let lower = text.to_lowercase();

        if !self.is_triggered(&lower) {
            return DetectedFeedback::none(text);
        }

        let detected = if contains_any(&lower, TONE_KEYWORDS) {
            DetectedFeedback::found(text, FeedbackType::Tone, DEFAULT_FEEDBACK_CATEGORY)
        } else if contains_any(&lower, QUESTION_KEYWORDS) || contains_any(&lower, DIRECTNESS_KEYWORDS) {
            DetectedFeedback::found(text, FeedbackType::Style, DEFAULT_FEEDBACK_CATEGORY)
        } else if lower.contains("remember") || lower.contains("don't forget") {
            let category = if contains_any(&lower, TIME_OF_DAY_KEYWORDS) {
                "energy_patterns"
            } else if contains_any(&lower, TASK_KEYWORDS) {
                "task_initiation"
            } else {
                DEFAULT_FEEDBACK_CATEGORY
            };
            DetectedFeedback::found(text, FeedbackType::Pattern, category)
        } else {
            DetectedFeedback::found(text, FeedbackType::General, DEFAULT_FEEDBACK_CATEGORY)
        };

        debug!(
            "Detected {:?} feedback routed to {:?}",
            detected.feedback_type, detected.category
        );
        detected
    }
}

/// Record feedback and floor the category's general hypothesis.
///
/// Runs inside the caller's transaction. Returns the confirmation phrase, or
/// `None` when the message was not feedback. A missing `communication_style`
/// is created on demand; any other missing category records nothing.
pub fn apply_in(
    conn: &Connection,
    user_id: i64,
    feedback: &DetectedFeedback,
) -> Result<Option<&'static str>> {
    if !feedback.is_feedback {
        return Ok(None);
    }

    let feedback_type = feedback.feedback_type.unwrap_or(FeedbackType::General);
    let category_name = feedback.category.as_deref().unwrap_or(DEFAULT_FEEDBACK_CATEGORY);

    let category = match store::find_category(conn, user_id, category_name)? {
        Some(category) => category,
        None if category_name == DEFAULT_FEEDBACK_CATEGORY => {
            info!("Creating category '{}' for explicit feedback", category_name);
            store::insert_category(conn, user_id, category_name, FEEDBACK_CATEGORY_DESCRIPTION, false)?
        }
        None => {
            debug!("Feedback routed to missing category '{}', nothing recorded", category_name);
            return Ok(Some(feedback_type.confirmation()));
        }
    };

    let mut context = ObservationContext::new();
    context.insert("feedback_type".to_string(), json!(feedback_type.as_str()));
    context.insert("explicit_instruction".to_string(), json!(true));
    context.insert("confidence_boost".to_string(), json!(FEEDBACK_CONFIDENCE_BOOST));

    record_and_recompute(
        conn,
        user_id,
        &category,
        None,
        &format!("USER FEEDBACK: {}", feedback.instruction),
        &context,
    )?;

    let hypothesis = floor_general_hypothesis(conn, user_id, &category)?;
    info!(
        "Applied {} feedback to {} (confidence now {}%)",
        feedback_type, category.name, hypothesis.confidence
    );

    Ok(Some(feedback_type.confirmation()))
}

fn floor_general_hypothesis(conn: &Connection, user_id: i64, category: &Category) -> Result<Hypothesis> {
    let mut hypothesis = match store::find_hypothesis(conn, user_id, category.id, GENERAL_GROUP)? {
        Some(existing) => existing,
        None => {
            let general_count = store::observations_for(conn, user_id, category.id)?
                .iter()
                .filter(|o| o.group_key() == GENERAL_GROUP)
                .count();
            Hypothesis {
                id: 0,
                user_id,
                category_id: category.id,
                sub_pattern: None,
                hypothesis: aggregator::hypothesis_text(&category.name, None, general_count),
                confidence: aggregator::formula_confidence(general_count),
                supporting_observations: general_count as u32,
                contradicting_observations: 0,
                status: HypothesisStatus::Exploring,
                needs_exploration: false,
                last_updated: Utc::now(),
            }
        }
    };

    hypothesis.confidence = hypothesis.confidence.max(FEEDBACK_CONFIDENCE_FLOOR);
    if hypothesis.confidence >= EXPLORATION_CLEAR_CONFIDENCE {
        hypothesis.needs_exploration = false;
    }
    hypothesis.last_updated = Utc::now();
    aggregator::confirm_if_ready(&mut hypothesis);

    if hypothesis.id == 0 {
        store::insert_hypothesis(conn, &hypothesis)
    } else {
        store::update_hypothesis(conn, &hypothesis)?;
        Ok(hypothesis)
    }
}
