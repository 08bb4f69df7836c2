//! CLI interface for pattern-learning

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::learning::{
    render_confirmed, ExplorationSelector, ExplorationTarget, PatternLearner, PatternStore,
};
use crate::types::{ObservationContext, Turn};

#[derive(Parser)]
#[command(name = "pattern-learning")]
#[command(about = "Learns behavioral patterns from conversation signals and explicit feedback", long_about = None)]
#[command(version)]
struct Cli {
    /// Database path (overrides the config file)
    #[arg(long, global = true, env = "PATTERN_LEARNING_DB")]
    db: Option<PathBuf>,

    /// Act as this user (overrides the config file)
    #[arg(short, long, global = true)]
    user: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the built-in categories for the user
    Seed,
    /// Record one observation in a category
    Observe {
        /// Category name
        category: String,
        /// Observation text
        text: String,
        /// Sub-pattern key (classified from the text when omitted)
        #[arg(short, long)]
        sub_pattern: Option<String>,
    },
    /// Run a conversation turn through the learning pipeline
    Turn {
        /// The user's message
        #[arg(value_name = "USER")]
        message: String,
        /// The assistant's reply
        #[arg(short, long)]
        reply: Option<String>,
    },
    /// Apply an explicit feedback message
    Feedback {
        /// Message text
        text: String,
    },
    /// Show every category's current state
    Status,
    /// List confirmed patterns
    Confirmed {
        /// Minimum confidence (defaults to the configured value)
        #[arg(short, long)]
        min: Option<u8>,
        /// Print the prompt context block instead of a table
        #[arg(long)]
        context: bool,
    },
    /// Pick a category to explore, or look one up by name
    Explore {
        /// Category name or fragment
        name: Option<String>,
    },
    /// Show exploration questions for a category
    Guidance {
        /// Category name
        category: String,
    },
    /// Record answers from an exploration session
    Session {
        /// Category name or fragment
        category: String,
        /// One or more insights from the user
        #[arg(required = true)]
        insights: Vec<String>,
        /// Confidence to add (defaults to the configured value)
        #[arg(short, long)]
        bump: Option<u8>,
    },
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Show or locate the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// Add a user-defined category
    Add {
        /// Category name
        name: String,
        /// What the category tracks
        description: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Print the config file path
    Path,
}

fn print_target(target: &ExplorationTarget) {
    println!("Category: {} (id {})", target.category, target.category_id);
    println!("  {}", target.description);
    println!("  Observations: {}", target.observation_count);
    println!("  Confidence:   {}%", target.confidence);
    if let Some(hypothesis) = &target.hypothesis {
        println!("  Hypothesis:   {}", hypothesis);
    }
    if target.needs_exploration {
        println!("  Flagged for exploration");
    }
}

fn print_questions(questions: &[&str]) {
    for (i, question) in questions.iter().enumerate() {
        println!("  {}. {}", i + 1, question);
    }
}

pub async fn run(config: Config) -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Config { command } => {
            match command {
                ConfigCommands::Show => crate::config::show_config()?,
                ConfigCommands::Path => println!("{}", crate::config::config_path()?.display()),
            }
            return Ok(());
        }
        Commands::Guidance { category } => {
            println!("Questions for {}:", category);
            print_questions(crate::learning::get_guidance(category));
            return Ok(());
        }
        _ => {}
    }

    let db_path = match cli.db {
        Some(path) => path,
        None => config.database_path()?,
    };
    let store = PatternStore::open(&db_path)
        .await
        .with_context(|| format!("Failed to open pattern store at {}", db_path.display()))?;
    let user_id = cli.user.unwrap_or(config.learning.user_id);
    let learner = PatternLearner::new(store, user_id).with_assistant_name(&config.learning.assistant_name);

    match cli.command {
        Commands::Seed => {
            let created = learner.seed_categories().await?;
            println!("Seeded {} categories for user {}", created, user_id);
        }
        Commands::Observe { category, text, sub_pattern } => {
            let sub_pattern = sub_pattern.or_else(|| {
                crate::learning::classify(&category, &text).map(|s| s.to_string())
            });
            let mut context = ObservationContext::new();
            context.insert("source".to_string(), serde_json::json!("cli"));

            match learner
                .record_signal(&category, &text, context, sub_pattern.as_deref())
                .await?
            {
                Some(observation) => {
                    println!(
                        "Recorded observation {} in {} [{}]",
                        observation.id,
                        category,
                        observation.group_key()
                    );
                    if let Some(status) = learner.category_status(&category).await? {
                        println!("  Confidence now {}%", status.confidence);
                    }
                }
                None => println!("Unknown category '{}', nothing recorded", category),
            }
        }
        Commands::Turn { message, reply } => {
            let outcome = learner.ingest_turn(&Turn::new(message, reply)).await;
            if let Some(confirmation) = outcome.confirmation {
                println!("{}", confirmation);
            }
            println!("Recorded {} passive observations", outcome.observations_recorded);
            if let Some(error) = outcome.error {
                eprintln!("{}", error);
            }
        }
        Commands::Feedback { text } => {
            let detected = learner.detect_feedback(&text);
            match learner.apply_feedback(&detected).await? {
                Some(confirmation) => println!("{}", confirmation),
                None => println!("Not recognised as feedback"),
            }
        }
        Commands::Status => {
            let rows = learner.get_all_status().await?;
            if rows.is_empty() {
                println!("No categories yet. Run 'pattern-learning seed' first.");
            } else {
                println!("{:<30} {:>5} {:>5}  {:<10} Hypothesis", "Category", "Obs", "Conf", "Status");
                for row in &rows {
                    let status = row.status.map(|s| s.as_str()).unwrap_or("-");
                    let flag = if row.needs_exploration { " *" } else { "" };
                    println!(
                        "{:<30} {:>5} {:>4}%  {:<10} {}{}",
                        row.category,
                        row.observation_count,
                        row.confidence,
                        status,
                        row.hypothesis.as_deref().unwrap_or(""),
                        flag
                    );
                }
            }
        }
        Commands::Confirmed { min, context } => {
            let min = min.unwrap_or(config.learning.confirmed_min_confidence);
            let patterns = learner.get_confirmed(min).await?;
            if context {
                print!("{}", render_confirmed(&patterns));
            } else if patterns.is_empty() {
                println!("No confirmed patterns at {}% or above.", min);
            } else {
                for pattern in &patterns {
                    println!("{:>3}%  {:<30} {}", pattern.confidence, pattern.category, pattern.hypothesis);
                }
            }
        }
        Commands::Explore { name } => {
            let selector = ExplorationSelector::new(learner);
            let target = match name {
                Some(name) => selector.get_category_by_name(&name).await?,
                None => selector.pick_next().await?,
            };
            match target {
                Some(target) => {
                    print_target(&target);
                    println!("\nQuestions:");
                    print_questions(selector.guidance(&target.category));
                }
                None => println!("Nothing needs exploring right now. You're doing fine."),
            }
        }
        Commands::Session { category, insights, bump } => {
            let selector = ExplorationSelector::new(learner);
            let target = selector
                .get_category_by_name(&category)
                .await?
                .with_context(|| format!("No category matching '{}'", category))?;
            let bump = bump.unwrap_or(config.learning.exploration_bump);

            match selector.record_session(target.category_id, &insights, bump).await? {
                Some(hypothesis) => println!(
                    "Recorded {} insights in {}; confidence now {}% ({})",
                    insights.len(),
                    target.category,
                    hypothesis.confidence,
                    hypothesis.status
                ),
                None => println!(
                    "Recorded {} insights in {}; not enough observations for a hypothesis yet",
                    insights.len(),
                    target.category
                ),
            }
        }
        Commands::Category { command } => match command {
            CategoryCommands::Add { name, description } => {
                let category = learner.create_category(&name, &description).await?;
                println!("Created category '{}' (id {})", category.name, category.id);
            }
        },
        Commands::Config { .. } | Commands::Guidance { .. } => {}
    }

    Ok(())
}
