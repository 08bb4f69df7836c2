//! Subpattern Classifier - keyword tables mapping free text to sub-patterns
//!
//! Each category owns an ordered list of sub-patterns. Classification is a
//! literal substring search over the lowercased text and the first entry with
//! any matching keyword wins, so entry order is part of the behavior.

use tracing::debug;

/// One sub-pattern within a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpatternDef {
    pub key: &'static str,
    pub keywords: &'static [&'static str],
    pub description: &'static str,
}

const fn sp(
    key: &'static str,
    keywords: &'static [&'static str],
    description: &'static str,
) -> SubpatternDef {
    SubpatternDef { key, keywords, description }
}

/// Ordered sub-pattern table per category
pub const SUBPATTERNS: &[(&str, &[SubpatternDef])] = &[
    ("task_initiation", &[
        sp("body_doubling", &["call", "zoom", "working with", "on call"], "Working while on call with someone"),
        sp("external_deadline", &["deadline", "due", "urgency", "urgent"], "External deadline pressure"),
        sp("accountability", &["waiting", "expecting", "someone needs"], "Someone waiting/expecting it"),
        sp("momentum", &["small win", "quick", "easy one"], "Momentum from small win"),
        sp("trigger", &["coffee", "walk", "after", "shower"], "After specific trigger (coffee, walk)"),
        sp("curiosity", &["interesting", "curious", "want to know"], "Curiosity/novelty driven"),
        sp("spite", &["prove", "show them", "wrong"], "Spite/proving something"),
    ]),
    ("hyperfocus_triggers", &[
        sp("creative", &["creative", "design", "write", "build"], "Creative tasks"),
        sp("time_pressure", &["deadline", "rush", "last minute"], "Time pressure"),
        sp("high_interest", &["interesting", "exciting", "fun"], "High interest level"),
        sp("novelty", &["new", "novel", "different", "first time"], "Novelty factor"),
        sp("challenge", &["challenge", "hard", "complex"], "Optimal challenge level"),
    ]),
    ("avoidance_reasons", &[
        sp("unclear_done", &["don't know", "unclear", "what does done"], "Unclear what 'done' looks like"),
        sp("too_many_steps", &["too much", "so many", "steps", "complicated"], "Too many steps"),
        sp("boring", &["boring", "tedious", "dull", "monotonous"], "Boring/tedious nature"),
        sp("decision_paralysis", &["don't know which", "options", "choose"], "Decision paralysis"),
        sp("perfectionism", &["perfect", "not ready", "not good enough"], "Perfectionism trap"),
        sp("fear_judgment", &["what will they", "worried", "scared"], "Fear of judgment"),
        sp("sustained_attention", &["focus", "concentration", "attention"], "Requires sustained attention"),
    ]),
    ("energy_patterns", &[
        sp("high_energy", &["ready", "pumped", "energized", "motivated", "let's go"], "High energy state"),
        sp("low_energy", &["tired", "exhausted", "drained", "overwhelmed"], "Low energy state"),
        sp("after_social", &["after meeting", "after call", "socializing"], "Energy after social interaction"),
        sp("creative_boost", &["creative work", "designing", "writing"], "Creative work energy impact"),
        sp("admin_drain", &["admin", "emails", "paperwork"], "Admin task energy drain"),
    ]),
    ("motivation_sources", &[
        sp("external_validation", &["they'll like", "approval", "impress"], "External validation"),
        sp("progress_viz", &["see progress", "tracking", "checking off"], "Progress visualization"),
        sp("competition", &["compete", "challenge", "beat", "win"], "Competition/challenge"),
        sp("helping_others", &["help", "for them", "they need"], "Helping others"),
        sp("personal_interest", &["interested", "want to", "curious"], "Personal interest"),
        sp("financial", &["money", "paid", "income", "revenue"], "Financial pressure"),
    ]),
    ("communication_response", &[
        sp("direct_push", &["real reason", "actually", "what's really"], "Direct push/challenge"),
        sp("gentle", &["maybe", "perhaps", "could"], "Gentle suggestion"),
        sp("question_based", &["what if", "have you", "would it"], "Question-based"),
        sp("playful", &["really?", "sure about that", "right..."], "Playful teasing"),
        sp("serious", &["this is important", "needs to happen"], "Serious concern"),
        sp("data_driven", &["data shows", "numbers", "evidence"], "Data-driven logic"),
    ]),
    ("time_perception", &[
        sp("optimistic", &["just", "only", "quick"], "Optimistic/underestimates"),
        sp("pessimistic", &["long", "forever", "takes ages"], "Pessimistic/overestimates"),
        sp("accurate", &["about", "roughly", "around"], "Accurate estimation"),
        sp("time_blindness", &["lose track", "didn't realize", "flew by"], "Time blindness"),
    ]),
    ("urgency_response", &[
        sp("thrives_pressure", &["deadline helps", "pressure works", "best under"], "Thrives under pressure"),
        sp("freezes", &["panic", "overwhelm", "can't"], "Freezes/panics"),
        sp("last_minute", &["last minute", "wait until", "night before"], "Last-minute rush"),
        sp("needs_buffer", &["need time", "cushion", "backup time"], "Needs buffer time"),
    ]),
    ("accountability_effectiveness", &[
        sp("hard_deadlines", &["deadline", "due date", "must be"], "Hard external deadlines"),
        sp("soft_deadlines", &["should", "hoping to", "trying to"], "Soft self-imposed deadlines"),
        sp("check_ins", &["check in", "update", "report"], "Check-ins with someone"),
        sp("public", &["told people", "public", "announced"], "Public commitment"),
        sp("consequences", &["lose", "miss out", "penalty"], "Consequences"),
        sp("rewards", &["get", "earn", "treat"], "Rewards"),
    ]),
    ("context_switching_cost", &[
        sp("grouped_similar", &["batch", "group", "similar"], "Better with tasks grouped"),
        sp("needs_transition", &["transition", "switch", "change"], "Needs transition time"),
        sp("loses_momentum", &["momentum", "flow", "zone"], "Loses momentum with interruptions"),
        sp("variety_thrives", &["variety", "different", "mix"], "Thrives on variety"),
    ]),
    ("momentum_building", &[
        sp("small_wins", &["quick win", "easy one", "small"], "Small wins cascade"),
        sp("warmup", &["warm up", "ease in", "start small"], "Needs warm-up tasks"),
        sp("hard_first", &["hardest first", "big one", "tackle"], "Goes for hard stuff first"),
        sp("routine", &["routine", "ritual", "always"], "Benefits from routine"),
    ]),
    ("novelty_seeking", &[
        sp("bores_quickly", &["bored", "same thing", "repetitive"], "Gets bored with repetition"),
        sp("thrives_routine", &["routine", "structure", "same"], "Thrives on routine/structure"),
        sp("new_challenge", &["new", "different", "challenge"], "Needs new challenge regularly"),
        sp("explore_exploit", &["explore", "try new", "experiment"], "Explore vs exploit balance"),
    ]),
    ("sensory_environment", &[
        sp("music", &["music", "playlist", "listening"], "Music preferences"),
        sp("silence", &["quiet", "silence", "no noise"], "Silence needs"),
        sp("location", &["office", "cafe", "home"], "Location preferences"),
        sp("clean_space", &["clean", "organized", "tidy"], "Clean vs messy space"),
        sp("temperature", &["warm", "cold", "hot"], "Temperature needs"),
    ]),
    ("decision_fatigue", &[
        sp("too_many_options", &["so many", "options", "choices"], "Too many options"),
        sp("no_clear_best", &["don't know which", "unclear", "all seem"], "No clear best choice"),
        sp("high_stakes", &["important", "big decision", "matters"], "High stakes pressure"),
        sp("time_depletion", &["afternoon", "end of day", "tired"], "End of day depletion"),
        sp("many_small", &["so many little", "decisions"], "After many small decisions"),
    ]),
    ("task_breakdown_needs", &[
        sp("overwhelmed_large", &["too big", "huge", "overwhelming"], "Overwhelmed by large projects"),
        sp("step_by_step", &["steps", "breakdown", "sequence"], "Benefits from step-by-step"),
        sp("autonomy", &["figure it out", "own way", "freedom"], "Prefers autonomy"),
        sp("first_step", &["first step", "start", "beginning"], "Needs only first step clear"),
    ]),
    ("interruption_recovery", &[
        sp("quick_recovery", &["back to it", "resume", "continue"], "Gets back on track quickly"),
        sp("loses_session", &["lost it", "momentum gone", "can't get back"], "Loses entire session"),
        sp("warmup_needed", &["need to", "get back into"], "Needs warmup time"),
        sp("breadcrumbs", &["notes", "where was i", "reminder"], "Benefits from breadcrumbs"),
    ]),
    ("failure_response", &[
        sp("catastrophizes", &["everything", "all", "disaster"], "Catastrophizes and spirals"),
        sp("bounces_back", &["next", "try again", "keep going"], "Bounces back quickly"),
        sp("needs_processing", &["need time", "process", "think about"], "Needs processing time"),
        sp("reframe", &["different way", "perspective", "look at"], "Benefits from reframe"),
    ]),
    ("reward_sensitivity", &[
        sp("immediate", &["now", "right away", "instant"], "Immediate gratification"),
        sp("long_term", &["later", "eventually", "future"], "Long-term payoff"),
        sp("social", &["they'll", "people", "approval"], "Social approval"),
        sp("financial", &["money", "paid", "earn"], "Financial gain"),
        sp("completion", &["done", "finished", "complete"], "Completion satisfaction"),
        sp("unlock", &["unlock", "access", "open"], "New challenge unlocked"),
    ]),
];

/// Ordered sub-pattern entries for a category, if it has a table
pub fn subpatterns_for(category: &str) -> Option<&'static [SubpatternDef]> {
    SUBPATTERNS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, defs)| *defs)
}

/// Classify text into a sub-pattern key for the category.
///
/// Returns the key of the first table entry with any keyword occurring as a
/// substring of the lowercased text, or `None` when the category has no
/// table or nothing matches.
pub fn classify(category: &str, text: &str) -> Option<&'static str> {
    let defs = subpatterns_for(category)?;
    let haystack = text.to_lowercase();

    let matched = defs
        .iter()
        .find(|def| def.keywords.iter().any(|kw| haystack.contains(kw)))
        .map(|def| def.key);

    if let Some(key) = matched {
        debug!("Classified '{}' text as sub-pattern '{}'", category, key);
    }
    matched
}

/// Human-readable description of a sub-pattern
pub fn describe(category: &str, key: &str) -> Option<&'static str> {
    subpatterns_for(category)?
        .iter()
        .find(|def| def.key == key)
        .map(|def| def.description)
}
