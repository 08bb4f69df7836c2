//! Signal Detector - passive behavioral signals from each conversation turn
//!
//! Scans the user's message and the assistant's reply for phrases that hint
//! at a behavioral category (deflection, energy, time estimates, motivation,
//! focus). Each signal is tagged with a sub-pattern by the classifier and
//! later recorded as an observation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::subpatterns;
use crate::types::{ObservationContext, Role};

/// A signal found in one turn, ready to be recorded
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedSignal {
    pub category: &'static str,
    pub observation: String,
    pub context: ObservationContext,
    pub sub_pattern: Option<&'static str>,
    pub source: Role,
}

/// Phrases that suggest the user is deflecting
const DEFLECTION_PHRASES: &[&str] = &["later", "maybe", "not sure", "i don't know", "eventually", "probably"];

const HIGH_ENERGY_WORDS: &[&str] = &["ready", "pumped", "energized", "motivated", "let's go", "excited"];

const LOW_ENERGY_WORDS: &[&str] = &["tired", "exhausted", "drained", "overwhelmed", "can't", "struggling"];

/// Phrases in the assistant's reply that amount to a direct push
const DIRECT_PUSH_PHRASES: &[&str] = &["what's actually", "real reason", "and when"];

const MOTIVATION_WORDS: &[&str] = &["want to", "need to", "have to", "should", "must", "deadline"];

const FOCUS_PHRASES: &[&str] = &["in the zone", "flow", "focused"];

/// Characters of the user message kept in signal context
const SNIPPET_CHARS: usize = 100;

static TIME_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*(minute|min|hour|hr|day)s?").expect("time mention pattern is valid")
});

fn first_match<'a>(haystack: &str, needles: &[&'a str]) -> Option<&'a str> {
    needles.iter().copied().find(|n| haystack.contains(n))
}

fn context_with(source: Role, pairs: Vec<(&str, serde_json::Value)>) -> ObservationContext {
    let mut context = ObservationContext::new();
    context.insert("source".to_string(), json!(source.as_str()));
    for (key, value) in pairs {
        context.insert(key.to_string(), value);
    }
    context
}

/// Stateless scanner for per-turn behavioral signals
#[derive(Debug, Clone, Default)]
pub struct SignalDetector;

impl SignalDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scan one exchange and return every signal found
    pub fn scan(&self, user_message: &str, assistant_reply: Option<&str>) -> Vec<DetectedSignal> {
        let mut signals = Vec::new();
        let user_lower = user_message.to_lowercase();
        let snippet = crate::truncate_safe(user_message, SNIPPET_CHARS);

        let user_signal = |category: &'static str, observation: String, context: ObservationContext| {
            DetectedSignal {
                category,
                observation,
                context,
                sub_pattern: subpatterns::classify(category, &user_lower),
                source: Role::User,
            }
        };

        if let Some(phrase) = first_match(&user_lower, DEFLECTION_PHRASES) {
            signals.push(user_signal(
                "avoidance_reasons",
                format!("Used '{}' when discussing tasks - possible avoidance", phrase),
                context_with(Role::User, vec![
                    ("deflection_phrase", json!(phrase)),
                    ("message", json!(snippet)),
                ]),
            ));
        }

        for caps in TIME_MENTION.captures_iter(&user_lower) {
            let amount = &caps[1];
            let unit = &caps[2];
            signals.push(user_signal(
                "time_perception",
                format!("Mentioned {} {} for task estimation", amount, unit),
                context_with(Role::User, vec![("amount", json!(amount)), ("unit", json!(unit))]),
            ));
        }

        if let Some(word) = first_match(&user_lower, HIGH_ENERGY_WORDS) {
            signals.push(user_signal(
                "energy_patterns",
                format!("High energy signal: used '{}'", word),
                context_with(Role::User, vec![("energy_level", json!("high")), ("indicator", json!(word))]),
            ));
        }

        if let Some(word) = first_match(&user_lower, LOW_ENERGY_WORDS) {
            signals.push(user_signal(
                "energy_patterns",
                format!("Low energy signal: used '{}'", word),
                context_with(Role::User, vec![("energy_level", json!("low")), ("indicator", json!(word))]),
            ));
        }

        if let Some(reply) = assistant_reply {
            let reply_lower = reply.to_lowercase();
            if first_match(&reply_lower, DIRECT_PUSH_PHRASES).is_some() {
                signals.push(DetectedSignal {
                    category: "communication_response",
                    observation: "Assistant used direct push - observe user's response".to_string(),
                    context: context_with(Role::Assistant, vec![
                        ("approach", json!("direct_push")),
                        ("user_response", json!(snippet)),
                    ]),
                    sub_pattern: subpatterns::classify("communication_response", &reply_lower),
                    source: Role::Assistant,
                });
            }
        }

        if let Some(word) = first_match(&user_lower, MOTIVATION_WORDS) {
            signals.push(user_signal(
                "motivation_sources",
                format!("Motivation indicator: '{}' mentioned", word),
                context_with(Role::User, vec![("motivation_type", json!(word)), ("context", json!(snippet))]),
            ));
        }

        if first_match(&user_lower, FOCUS_PHRASES).is_some() {
            signals.push(user_signal(
                "hyperfocus_triggers",
                format!("User mentioned focus/flow state: {}", snippet),
                context_with(Role::User, vec![("focus_indicator", json!(true))]),
            ));
        }

        signals
    }
}
