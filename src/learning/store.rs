//! Pattern Store - SQLite persistence for categories, observations and hypotheses
//!
//! Every row carries a `user_id` and every query filters on it. Observations
//! are append-only; hypotheses are upserted per `(category, group_key)` where
//! the group key is the sub-pattern or the literal `general`.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{LearningError, Result};
use crate::types::ObservationContext;

/// Group key used for observations without a sub-pattern
pub const GENERAL_GROUP: &str = "general";

/// Resolve the partition key for an optional sub-pattern
pub fn group_key(sub_pattern: Option<&str>) -> &str {
    sub_pattern.unwrap_or(GENERAL_GROUP)
}

/// A named behavioral dimension tracked for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    /// Seeded at account setup (`true`) or user-defined (`false`)
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

/// One immutable evidentiary data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub sub_pattern: Option<String>,
    pub text: String,
    pub context: ObservationContext,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn group_key(&self) -> &str {
        group_key(self.sub_pattern.as_deref())
    }
}

/// Hypothesis lifecycle status. Only ever moves `Exploring -> Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HypothesisStatus {
    Exploring,
    Confirmed,
}

impl HypothesisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HypothesisStatus::Exploring => "exploring",
            HypothesisStatus::Confirmed => "confirmed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exploring" => Some(HypothesisStatus::Exploring),
            "confirmed" => Some(HypothesisStatus::Confirmed),
            _ => None,
        }
    }
}

impl std::fmt::Display for HypothesisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived, confidence-scored summary for a (category, sub-pattern) group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub sub_pattern: Option<String>,
    pub hypothesis: String,
    /// 0-100
    pub confidence: u8,
    pub supporting_observations: u32,
    /// Reserved column. Nothing increments it; always 0.
    pub contradicting_observations: u32,
    pub status: HypothesisStatus,
    pub needs_exploration: bool,
    pub last_updated: DateTime<Utc>,
}

impl Hypothesis {
    pub fn group_key(&self) -> &str {
        group_key(self.sub_pattern.as_deref())
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == HypothesisStatus::Confirmed
    }
}

/// Pick the strongest hypothesis: highest confidence, earliest id on ties
pub fn best_hypothesis(hypotheses: &[Hypothesis]) -> Option<&Hypothesis> {
    hypotheses
        .iter()
        .max_by(|a, b| a.confidence.cmp(&b.confidence).then(b.id.cmp(&a.id)))
}

/// SQLite-backed pattern store
#[derive(Clone)]
pub struct PatternStore {
    conn: Arc<Mutex<Connection>>,
}

impl PatternStore {
    /// Open (or create) a store at the given path
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        Self::init_schema(&conn)?;

        debug!("Opened pattern store at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS pattern_categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                category_name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                is_system INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, category_name)
            );

            CREATE TABLE IF NOT EXISTS pattern_observations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                sub_pattern TEXT,
                observation TEXT NOT NULL,
                context TEXT NOT NULL DEFAULT '{}',
                observed_at TEXT NOT NULL,
                FOREIGN KEY (category_id) REFERENCES pattern_categories(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS pattern_hypotheses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                sub_pattern TEXT,
                group_key TEXT NOT NULL,
                hypothesis TEXT NOT NULL,
                confidence INTEGER NOT NULL DEFAULT 0,
                supporting_observations INTEGER NOT NULL DEFAULT 0,
                contradicting_observations INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'exploring',
                needs_exploration INTEGER NOT NULL DEFAULT 0,
                last_updated TEXT NOT NULL,
                UNIQUE (user_id, category_id, group_key),
                FOREIGN KEY (category_id) REFERENCES pattern_categories(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_observations_category ON pattern_observations(user_id, category_id);
            CREATE INDEX IF NOT EXISTS idx_hypotheses_category ON pattern_hypotheses(user_id, category_id);
            CREATE INDEX IF NOT EXISTS idx_hypotheses_exploration ON pattern_hypotheses(user_id, needs_exploration);
        "#)?;
        Ok(())
    }

    /// Run read-only queries against the connection
    pub async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().await;
        f(&*conn)
    }

    /// Run a unit of work inside one transaction.
    ///
    /// The transaction commits only if `f` succeeds; any error rolls it back.
    pub async fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

// --- Row mapping ---

fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        is_system: row.get(4)?,
        created_at: parse_ts(5, row.get(5)?)?,
    })
}

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<Observation> {
    let raw_context: String = row.get(5)?;
    let context = serde_json::from_str::<ObservationContext>(&raw_context)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Observation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        sub_pattern: row.get(3)?,
        text: row.get(4)?,
        context,
        observed_at: parse_ts(6, row.get(6)?)?,
    })
}

fn hypothesis_from_row(row: &Row<'_>) -> rusqlite::Result<Hypothesis> {
    let raw_status: String = row.get(8)?;
    let status = HypothesisStatus::parse(&raw_status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            Type::Text,
            format!("unknown hypothesis status '{}'", raw_status).into(),
        )
    })?;
    let confidence: i64 = row.get(5)?;
    let supporting: i64 = row.get(6)?;
    let contradicting: i64 = row.get(7)?;

    Ok(Hypothesis {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        sub_pattern: row.get(3)?,
        hypothesis: row.get(4)?,
        confidence: confidence.clamp(0, 100) as u8,
        supporting_observations: supporting.max(0) as u32,
        contradicting_observations: contradicting.max(0) as u32,
        status,
        needs_exploration: row.get(9)?,
        last_updated: parse_ts(10, row.get(10)?)?,
    })
}

const CATEGORY_COLUMNS: &str = "id, user_id, category_name, description, is_system, created_at";
const OBSERVATION_COLUMNS: &str =
    "id, user_id, category_id, sub_pattern, observation, context, observed_at";
const HYPOTHESIS_COLUMNS: &str = "id, user_id, category_id, sub_pattern, hypothesis, confidence, \
     supporting_observations, contradicting_observations, status, needs_exploration, last_updated";

// --- Categories ---

/// Find a category by exact name
pub fn find_category(conn: &Connection, user_id: i64, name: &str) -> Result<Option<Category>> {
    let sql = format!(
        "SELECT {} FROM pattern_categories WHERE user_id = ?1 AND category_name = ?2",
        CATEGORY_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![user_id, name], category_from_row)
        .optional()?)
}

/// Find a category by id, scoped to the user
pub fn get_category(conn: &Connection, user_id: i64, id: i64) -> Result<Option<Category>> {
    let sql = format!(
        "SELECT {} FROM pattern_categories WHERE user_id = ?1 AND id = ?2",
        CATEGORY_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![user_id, id], category_from_row)
        .optional()?)
}

/// All categories for a user in creation order
pub fn list_categories(conn: &Connection, user_id: i64) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM pattern_categories WHERE user_id = ?1 ORDER BY id ASC",
        CATEGORY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], category_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Insert a category, rejecting duplicate names for the same user
pub fn insert_category(
    conn: &Connection,
    user_id: i64,
    name: &str,
    description: &str,
    is_system: bool,
) -> Result<Category> {
    if find_category(conn, user_id, name)?.is_some() {
        return Err(LearningError::CategoryExists(name.to_string()));
    }

    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO pattern_categories (user_id, category_name, description, is_system, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, name, description, is_system, created_at.to_rfc3339()],
    )?;

    Ok(Category {
        id: conn.last_insert_rowid(),
        user_id,
        name: name.to_string(),
        description: description.to_string(),
        is_system,
        created_at,
    })
}

// --- Observations ---

/// Append an observation. There is no update or delete counterpart.
pub fn insert_observation(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    sub_pattern: Option<&str>,
    text: &str,
    context: &ObservationContext,
) -> Result<Observation> {
    // An explicit "general" folds into the unnamed group
    let sub_pattern = sub_pattern.filter(|s| *s != GENERAL_GROUP);
    let observed_at = Utc::now();
    let context_json = serde_json::to_string(context)?;

    conn.execute(
        "INSERT INTO pattern_observations (user_id, category_id, sub_pattern, observation, context, observed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![user_id, category_id, sub_pattern, text, context_json, observed_at.to_rfc3339()],
    )?;

    Ok(Observation {
        id: conn.last_insert_rowid(),
        user_id,
        category_id,
        sub_pattern: sub_pattern.map(|s| s.to_string()),
        text: text.to_string(),
        context: context.clone(),
        observed_at,
    })
}

/// All observations for a category, oldest first
pub fn observations_for(conn: &Connection, user_id: i64, category_id: i64) -> Result<Vec<Observation>> {
    let sql = format!(
        "SELECT {} FROM pattern_observations WHERE user_id = ?1 AND category_id = ?2 ORDER BY id ASC",
        OBSERVATION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, category_id], observation_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Total observation count for a category across all groups
pub fn count_observations(conn: &Connection, user_id: i64, category_id: i64) -> Result<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pattern_observations WHERE user_id = ?1 AND category_id = ?2",
        params![user_id, category_id],
        |row| row.get(0),
    )?;
    Ok(count as u32)
}

/// Observation counts keyed by category id
pub fn observation_counts(conn: &Connection, user_id: i64) -> Result<HashMap<i64, u32>> {
    let mut stmt = conn.prepare(
        "SELECT category_id, COUNT(*) FROM pattern_observations WHERE user_id = ?1 GROUP BY category_id",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u32))
    })?;
    Ok(rows.collect::<rusqlite::Result<HashMap<_, _>>>()?)
}

// --- Hypotheses ---

/// Hypotheses for one category in creation order
pub fn hypotheses_for(conn: &Connection, user_id: i64, category_id: i64) -> Result<Vec<Hypothesis>> {
    let sql = format!(
        "SELECT {} FROM pattern_hypotheses WHERE user_id = ?1 AND category_id = ?2 ORDER BY id ASC",
        HYPOTHESIS_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, category_id], hypothesis_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Every hypothesis for a user in creation order
pub fn all_hypotheses(conn: &Connection, user_id: i64) -> Result<Vec<Hypothesis>> {
    let sql = format!(
        "SELECT {} FROM pattern_hypotheses WHERE user_id = ?1 ORDER BY id ASC",
        HYPOTHESIS_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], hypothesis_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// The hypothesis for one (category, group) pair
pub fn find_hypothesis(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    group: &str,
) -> Result<Option<Hypothesis>> {
    let sql = format!(
        "SELECT {} FROM pattern_hypotheses WHERE user_id = ?1 AND category_id = ?2 AND group_key = ?3",
        HYPOTHESIS_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![user_id, category_id, group], hypothesis_from_row)
        .optional()?)
}

/// Insert a new hypothesis row; the `id` field of the input is ignored
pub fn insert_hypothesis(conn: &Connection, hypothesis: &Hypothesis) -> Result<Hypothesis> {
    conn.execute(
        "INSERT INTO pattern_hypotheses (user_id, category_id, sub_pattern, group_key, hypothesis,
             confidence, supporting_observations, contradicting_observations, status,
             needs_exploration, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            hypothesis.user_id,
            hypothesis.category_id,
            hypothesis.sub_pattern,
            hypothesis.group_key(),
            hypothesis.hypothesis,
            hypothesis.confidence as i64,
            hypothesis.supporting_observations as i64,
            hypothesis.contradicting_observations as i64,
            hypothesis.status.as_str(),
            hypothesis.needs_exploration,
            hypothesis.last_updated.to_rfc3339(),
        ],
    )?;

    let mut stored = hypothesis.clone();
    stored.id = conn.last_insert_rowid();
    Ok(stored)
}

/// Overwrite the mutable fields of an existing hypothesis
pub fn update_hypothesis(conn: &Connection, hypothesis: &Hypothesis) -> Result<()> {
    conn.execute(
        "UPDATE pattern_hypotheses
         SET hypothesis = ?1, confidence = ?2, supporting_observations = ?3,
             contradicting_observations = ?4, status = ?5, needs_exploration = ?6,
             last_updated = ?7
         WHERE id = ?8 AND user_id = ?9",
        params![
            hypothesis.hypothesis,
            hypothesis.confidence as i64,
            hypothesis.supporting_observations as i64,
            hypothesis.contradicting_observations as i64,
            hypothesis.status.as_str(),
            hypothesis.needs_exploration,
            hypothesis.last_updated.to_rfc3339(),
            hypothesis.id,
            hypothesis.user_id,
        ],
    )?;
    Ok(())
}
