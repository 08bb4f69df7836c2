//! Confirmed-pattern context block for prompt assembly
//!
//! The conversation layer injects this block ahead of the next reply so that
//! what the engine has confirmed about the user shapes the response.

use std::collections::BTreeMap;

use super::engine::{ConfirmedPattern, PatternLearner};
use crate::error::Result;

/// Render confirmed patterns as Markdown, grouped by category.
///
/// Returns an empty string when nothing is confirmed so callers can skip the
/// section entirely.
pub fn render_confirmed(patterns: &[ConfirmedPattern]) -> String {
    if patterns.is_empty() {
        return String::new();
    }

    let mut by_category: BTreeMap<&str, Vec<&ConfirmedPattern>> = BTreeMap::new();
    for pattern in patterns {
        by_category.entry(pattern.category.as_str()).or_default().push(pattern);
    }

    let mut context = String::with_capacity(256 + patterns.len() * 96);
    context.push_str("# Learned Patterns\n\n");
    context.push_str("_Confirmed from repeated observation and explicit feedback._\n\n");

    for (category, entries) in by_category {
        context.push_str(&format!("## {}\n\n", category));
        for entry in entries {
            context.push_str(&format!("- {} ({}% confidence)\n", entry.hypothesis, entry.confidence));
        }
        context.push('\n');
    }

    context.truncate(context.trim_end().len());
    context.push('\n');
    context
}

/// Load and render confirmed patterns at or above `min_confidence`
pub async fn load_confirmed_context(learner: &PatternLearner, min_confidence: u8) -> Result<String> {
    let patterns = learner.get_confirmed(min_confidence).await?;
    Ok(render_confirmed(&patterns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(category: &str, hypothesis: &str, confidence: u8) -> ConfirmedPattern {
        ConfirmedPattern {
            category: category.to_string(),
            sub_pattern: None,
            hypothesis: hypothesis.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_empty_renders_nothing() {
        assert_eq!(render_confirmed(&[]), "");
    }

    #[test]
    fn test_groups_by_category() {
        let rendered = render_confirmed(&[
            pattern("task_initiation", "Working while on call with someone (observed 9 times)", 90),
            pattern("energy_patterns", "Pattern emerging in energy_patterns (2 observations)", 85),
        ]);

        assert!(rendered.starts_with("# Learned Patterns\n"));
        let energy = rendered.find("## energy_patterns").unwrap();
        let task = rendered.find("## task_initiation").unwrap();
        assert!(energy < task);
        assert!(rendered.contains("- Working while on call with someone (observed 9 times) (90% confidence)\n"));
        assert!(rendered.ends_with("confidence)\n"));
    }

    #[tokio::test]
    async fn test_load_from_learner() {
        let store = crate::learning::store::PatternStore::open_in_memory().unwrap();
        let learner = PatternLearner::new(store, 1);
        learner.seed_categories().await.unwrap();
        assert_eq!(load_confirmed_context(&learner, 80).await.unwrap(), "");

        for _ in 0..8 {
            learner
                .record_signal("sensory_environment", "music on", Default::default(), Some("music"))
                .await
                .unwrap();
        }
        let rendered = load_confirmed_context(&learner, 80).await.unwrap();
        assert!(rendered.contains("## sensory_environment"));
        assert!(rendered.contains("- Music preferences (observed 8 times) (80% confidence)"));
    }
}
