//! Seed categories created once per user at account setup

/// The 18 system categories as `(name, description)`
pub const SEED_CATEGORIES: &[(&str, &str)] = &[
    ("task_initiation", "What actually gets them started on tasks (body doubling, deadlines, accountability, momentum, triggers)"),
    ("hyperfocus_triggers", "What puts them in the zone (creative vs analytical, time pressure, interest, novelty, challenge level)"),
    ("avoidance_reasons", "Why specific tasks get avoided (unclear done, too many steps, boring, perfectionism, fear)"),
    ("energy_patterns", "What drains vs energizes (time of day, social, creative work, admin)"),
    ("motivation_sources", "What actually drives action (validation, progress, competition, helping others, interest, money)"),
    ("communication_response", "What tone and approach works (direct push, gentle, questions, playful, serious, data-driven)"),
    ("time_perception", "How time gets estimated (optimistic, pessimistic, accurate, time blindness)"),
    ("urgency_response", "How urgency lands (thrives under pressure, freezes, last-minute rush, needs buffer)"),
    ("accountability_effectiveness", "What type of accountability works (hard deadlines, soft, check-ins, public, consequences, rewards)"),
    ("context_switching_cost", "How switching between tasks goes (grouped better, needs transition, loses momentum, variety)"),
    ("momentum_building", "How work momentum builds (small wins, warm-up, hard first, routine)"),
    ("novelty_seeking", "How much novelty is needed (bores quickly, thrives on routine, new challenge, explore vs exploit)"),
    ("sensory_environment", "What environment helps work (music, silence, location, clean space, temperature)"),
    ("decision_fatigue", "When decision paralysis hits (too many options, no clear best, high stakes, time of day, many small decisions)"),
    ("task_breakdown_needs", "How much structure is needed (overwhelmed by large, step-by-step, autonomy, first step only)"),
    ("interruption_recovery", "How interruptions are handled (quick recovery, loses session, needs warm-up, breadcrumbs)"),
    ("failure_response", "How setbacks are handled (catastrophizes, bounces back, needs processing, reframe)"),
    ("reward_sensitivity", "What rewards motivate (immediate, long-term, social, financial, completion, unlock)"),
];

/// Description given to categories created on the fly for explicit feedback
pub const FEEDBACK_CATEGORY_DESCRIPTION: &str = "Learned from explicit user feedback";
