//! End-to-end tests for the pattern learning engine

use pattern_learning::learning::store::{self, GENERAL_GROUP};
use pattern_learning::learning::{classify, FeedbackType};
use pattern_learning::{
    ExplorationSelector, Hypothesis, HypothesisStatus, ObservationContext, PatternLearner,
    PatternStore, Turn,
};

async fn seeded_learner() -> PatternLearner {
    let learner = PatternLearner::new(PatternStore::open_in_memory().unwrap(), 1);
    learner.seed_categories().await.unwrap();
    learner
}

async fn record(learner: &PatternLearner, category: &str, text: &str) {
    let sub_pattern = classify(category, text);
    learner
        .record_signal(category, text, ObservationContext::new(), sub_pattern)
        .await
        .unwrap()
        .expect("category exists");
}

async fn record_general(learner: &PatternLearner, category: &str, times: usize) {
    for i in 0..times {
        learner
            .record_signal(category, &format!("note {}", i), ObservationContext::new(), None)
            .await
            .unwrap();
    }
}

async fn all_hypotheses(learner: &PatternLearner) -> Vec<Hypothesis> {
    let user_id = learner.user_id();
    learner
        .store()
        .read(|conn| store::all_hypotheses(conn, user_id))
        .await
        .unwrap()
}

fn assert_confirmation_invariant(hypotheses: &[Hypothesis]) {
    for h in hypotheses {
        assert_eq!(
            h.status == HypothesisStatus::Confirmed,
            h.confidence >= 80,
            "hypothesis {} has status {} at {}%",
            h.id,
            h.status,
            h.confidence
        );
    }
}

#[tokio::test]
async fn test_body_doubling_forms_then_confirms() {
    let learner = seeded_learner().await;

    for text in [
        "got it done while on call with Sam",
        "worked on call with my sister",
        "started once I was on call",
    ] {
        record(&learner, "task_initiation", text).await;
    }

    let hypotheses = learner.hypotheses("task_initiation").await.unwrap();
    assert_eq!(hypotheses.len(), 1);
    let h = &hypotheses[0];
    assert_eq!(h.sub_pattern.as_deref(), Some("body_doubling"));
    assert_eq!(h.confidence, 30);
    assert_eq!(h.status, HypothesisStatus::Exploring);
    assert!(h.hypothesis.contains("Working while on call with someone (observed 3 times)"));

    for _ in 0..8 {
        record(&learner, "task_initiation", "another session on call").await;
    }

    let hypotheses = learner.hypotheses("task_initiation").await.unwrap();
    assert_eq!(hypotheses.len(), 1);
    assert_eq!(hypotheses[0].confidence, 100);
    assert_eq!(hypotheses[0].status, HypothesisStatus::Confirmed);
    assert_eq!(hypotheses[0].supporting_observations, 11);
    assert_eq!(hypotheses[0].contradicting_observations, 0);

    let confirmed = learner.get_confirmed(80).await.unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].category, "task_initiation");
    assert_eq!(confirmed[0].sub_pattern.as_deref(), Some("body_doubling"));
}

#[tokio::test]
async fn test_threshold_invariant() {
    let learner = seeded_learner().await;

    record(&learner, "sensory_environment", "I need music on").await;
    record(&learner, "sensory_environment", "music helps").await;
    record(&learner, "sensory_environment", "total silence please").await;
    record(&learner, "time_perception", "I always underestimate").await;
    record_general(&learner, "reward_sensitivity", 2).await;
    assert!(all_hypotheses(&learner).await.is_empty());

    record(&learner, "sensory_environment", "put some music on").await;
    let hypotheses = all_hypotheses(&learner).await;
    assert_eq!(hypotheses.len(), 1);

    for h in &hypotheses {
        let observations = learner
            .observations("sensory_environment")
            .await
            .unwrap()
            .into_iter()
            .filter(|o| o.group_key() == h.group_key())
            .count();
        assert!(observations >= 3);
        assert_eq!(h.supporting_observations as usize, observations);
    }
}

#[tokio::test]
async fn test_passive_confidence_is_monotonic_and_exact() {
    let learner = seeded_learner().await;
    let mut previous = 0;

    for count in 1..=13u32 {
        learner
            .record_signal("momentum_building", "quick win first", ObservationContext::new(), Some("quick_wins"))
            .await
            .unwrap();

        let hypotheses = learner.hypotheses("momentum_building").await.unwrap();
        if count < 3 {
            assert!(hypotheses.is_empty());
            continue;
        }
        let confidence = hypotheses[0].confidence;
        assert_eq!(confidence as u32, (count * 10).min(100));
        assert!(confidence >= previous);
        previous = confidence;
        assert_confirmation_invariant(&hypotheses);
    }
}

#[tokio::test]
async fn test_classifier_is_deterministic_and_first_match() {
    let text = "worked on call before the deadline";
    let first = classify("task_initiation", text);
    for _ in 0..5 {
        assert_eq!(classify("task_initiation", text), first);
    }
    // body_doubling is listed before external_deadline
    assert_eq!(first, Some("body_doubling"));
    assert_eq!(classify("task_initiation", "the deadline is friday"), Some("external_deadline"));
}

#[tokio::test]
async fn test_feedback_floor() {
    let learner = seeded_learner().await;
    record_general(&learner, "energy_patterns", 4).await;
    let before = learner.category_status("energy_patterns").await.unwrap().unwrap();
    assert_eq!(before.confidence, 40);

    let detected = learner.detect_feedback("Sandy, remember I work best in the mornings");
    assert!(detected.is_feedback);
    assert_eq!(detected.feedback_type, Some(FeedbackType::Pattern));
    assert_eq!(detected.category.as_deref(), Some("energy_patterns"));

    let confirmation = learner.apply_feedback(&detected).await.unwrap();
    assert_eq!(confirmation, Some("Noted! I'll remember that."));

    let hypotheses = learner.hypotheses("energy_patterns").await.unwrap();
    let general = hypotheses.iter().find(|h| h.group_key() == GENERAL_GROUP).unwrap();
    assert!(general.confidence >= 85);
    assert_eq!(general.status, HypothesisStatus::Confirmed);
    assert_confirmation_invariant(&hypotheses);

    let observations = learner.observations("energy_patterns").await.unwrap();
    let last = observations.last().unwrap();
    assert_eq!(last.text, "USER FEEDBACK: Sandy, remember I work best in the mornings");
    assert_eq!(last.context["explicit_instruction"], serde_json::json!(true));
}

#[tokio::test]
async fn test_feedback_floor_survives_passive_accrual() {
    let learner = seeded_learner().await;
    let detected = learner.detect_feedback("Remember I work best in the evening");
    learner.apply_feedback(&detected).await.unwrap();

    // One observation so far; the feedback creates the hypothesis anyway
    let h = learner.hypotheses("energy_patterns").await.unwrap();
    assert_eq!(h.len(), 1);
    assert_eq!(h[0].confidence, 85);

    record_general(&learner, "energy_patterns", 3).await;
    let h = learner.hypotheses("energy_patterns").await.unwrap();
    assert_eq!(h[0].confidence, 85);
    assert_eq!(h[0].supporting_observations, 4);
}

#[tokio::test]
async fn test_feedback_creates_missing_category() {
    let learner = seeded_learner().await;
    let outcome = learner.ingest_turn(&Turn::new("Be more direct with me", None)).await;
    assert_eq!(outcome.confirmation, Some("Understood, I'll adapt my style!"));
    assert!(outcome.error.is_none());

    let status = learner.category_status("communication_style").await.unwrap().unwrap();
    assert_eq!(status.description, "Learned from explicit user feedback");
    assert!(status.confidence >= 85);
}

#[tokio::test]
async fn test_feedback_to_unseeded_category_records_nothing() {
    let learner = PatternLearner::new(PatternStore::open_in_memory().unwrap(), 5);
    let detected = learner.detect_feedback("Sandy, remember I work best in the mornings");
    assert_eq!(detected.category.as_deref(), Some("energy_patterns"));

    let confirmation = learner.apply_feedback(&detected).await.unwrap();
    assert_eq!(confirmation, Some("Noted! I'll remember that."));
    assert!(learner.get_all_status().await.unwrap().is_empty());
    assert!(all_hypotheses(&learner).await.is_empty());

    // Seeding afterwards still yields the system category
    learner.seed_categories().await.unwrap();
    let user_id = learner.user_id();
    let energy = learner
        .store()
        .read(|conn| store::find_category(conn, user_id, "energy_patterns"))
        .await
        .unwrap()
        .unwrap();
    assert!(energy.is_system);
    assert!(learner.observations("energy_patterns").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_exploration_priority_ordering() {
    let learner = PatternLearner::new(PatternStore::open_in_memory().unwrap(), 3);
    learner.create_category("solid", "confirmed at 90").await.unwrap();
    learner.create_category("sparse", "one observation").await.unwrap();
    learner.create_category("stuck", "refuses to converge").await.unwrap();

    record_general(&learner, "solid", 9).await;
    record_general(&learner, "sparse", 1).await;
    record_general(&learner, "stuck", 3).await;

    let user_id = learner.user_id();
    learner
        .store()
        .write(|tx| {
            let category = store::find_category(tx, user_id, "stuck")?.unwrap();
            let mut h = store::find_hypothesis(tx, user_id, category.id, GENERAL_GROUP)?.unwrap();
            h.needs_exploration = true;
            store::update_hypothesis(tx, &h)
        })
        .await
        .unwrap();

    let solid = learner.category_status("solid").await.unwrap().unwrap();
    assert_eq!(solid.confidence, 90);
    assert_eq!(solid.status, Some(HypothesisStatus::Confirmed));

    let selector = ExplorationSelector::new(learner.clone());
    for _ in 0..3 {
        let target = selector.pick_next().await.unwrap().unwrap();
        assert_eq!(target.category, "stuck");
        assert!(target.needs_exploration);
    }

    let flagged = learner.categories_needing_exploration().await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].category, "stuck");

    // Bumping past 70 clears the flag, so the sparse category is next
    let stuck = selector.get_category_by_name("stuck").await.unwrap().unwrap();
    let insights = vec!["it's about the first step".to_string(), "needs a clear goal".to_string()];
    let bumped = selector.record_session(stuck.category_id, &insights, 15).await.unwrap().unwrap();
    assert_eq!(bumped.confidence, 65);
    assert!(bumped.needs_exploration);

    let bumped = selector.record_session(stuck.category_id, &[], 15).await.unwrap().unwrap();
    assert_eq!(bumped.confidence, 80);
    assert!(!bumped.needs_exploration);
    assert!(bumped.is_confirmed());

    let target = selector.pick_next().await.unwrap().unwrap();
    assert_eq!(target.category, "sparse");
    assert_eq!(target.observation_count, 1);
}

#[tokio::test]
async fn test_low_confidence_tier_and_nothing_to_explore() {
    let learner = PatternLearner::new(PatternStore::open_in_memory().unwrap(), 4);
    learner.create_category("alpha", "").await.unwrap();
    learner.create_category("beta", "").await.unwrap();
    record_general(&learner, "alpha", 4).await;
    record_general(&learner, "beta", 3).await;

    let selector = ExplorationSelector::new(learner.clone());
    let target = selector.pick_next().await.unwrap().unwrap();
    assert_eq!(target.category, "beta");
    assert_eq!(target.confidence, 30);

    record_general(&learner, "alpha", 1).await;
    record_general(&learner, "beta", 2).await;
    assert!(selector.pick_next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_ingest_turn_is_best_effort() {
    let learner = seeded_learner().await;
    learner
        .store()
        .write(|tx| {
            tx.execute_batch("DROP TABLE pattern_observations")?;
            Ok(())
        })
        .await
        .unwrap();

    let outcome = learner
        .ingest_turn(&Turn::new("maybe later", Some("What's the real reason?".to_string())))
        .await;
    let error = outcome.error.expect("storage failure is reported");
    assert!(error.starts_with("learning update failed"));
    assert_eq!(outcome.observations_recorded, 0);

    // Reads that do not touch the broken table still work
    assert!(learner.get_confirmed(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_for_every_seeded_category() {
    let learner = seeded_learner().await;
    record_general(&learner, "novelty_seeking", 3).await;

    let status = learner.get_all_status().await.unwrap();
    assert_eq!(status.len(), 18);
    assert_eq!(status[0].category, "task_initiation");

    let novelty = status.iter().find(|s| s.category == "novelty_seeking").unwrap();
    assert_eq!(novelty.observation_count, 3);
    assert_eq!(novelty.confidence, 30);
    assert_eq!(
        novelty.hypothesis.as_deref(),
        Some("Pattern emerging in novelty_seeking (3 observations)")
    );

    let untouched = status.iter().find(|s| s.category == "urgency_response").unwrap();
    assert_eq!(untouched.confidence, 0);
    assert!(untouched.hypothesis.is_none());
    assert!(untouched.status.is_none());
}

#[test]
fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("patterns.db");

    tokio_test::block_on(async {
        let learner = PatternLearner::new(PatternStore::open(&path).await.unwrap(), 1);
        learner.seed_categories().await.unwrap();
        record_general(&learner, "failure_response", 8).await;
    });

    tokio_test::block_on(async {
        let learner = PatternLearner::new(PatternStore::open(&path).await.unwrap(), 1);
        assert_eq!(learner.seed_categories().await.unwrap(), 0);
        let status = learner.category_status("failure_response").await.unwrap().unwrap();
        assert_eq!(status.observation_count, 8);
        assert_eq!(status.confidence, 80);
        assert_eq!(status.status, Some(HypothesisStatus::Confirmed));
    });
}
