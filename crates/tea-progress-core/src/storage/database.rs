//! SQLite-based storage for children, the activity catalog and the attempt log.
//!
//! Provides persistent storage for:
//! - Child profiles and their lifetime counters
//! - The activity catalog with typed JSON content
//! - The append-only attempt log
//! - Per-category progress rows
//! - Unlocked medals
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text so that string
//! comparison in SQL orders them chronologically.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::debug;

use super::config::DatabaseConfig;
use super::{data_dir, migrations};
use crate::achievements::{Medal, MedalKey, MedalKind};
use crate::activity::{
    Activity, ActivityContent, ActivityId, Attempt, AttemptQuery, Category, ChildId, NewActivity,
    NewAttempt,
};
use crate::child::{CategoryProgress, Child};
use crate::error::{CoreError, DatabaseError, Result};
use crate::tier::Tier;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CHILD_COLUMNS: &str = "id, name, initial_tier, current_tier, max_tier, total_points,
     activities_completed, streak_days, last_activity_at, created_at, active,
     initial_tier_configured";

const ACTIVITY_COLUMNS: &str =
    "id, title, description, category, tier, content, reward_points, estimated_minutes, active";

const ATTEMPT_COLUMNS: &str = "id, child_id, activity_id, category, completed, attempt_number,
     time_spent_secs, points, completed_at";

const PROGRESS_COLUMNS: &str = "child_id, category, tier, stage, completed_count, total_available,
     points, last_activity_id, last_activity_at, started_at, active, tier_since";

const MEDAL_COLUMNS: &str = "id, child_id, kind, category, title, description, icon, unlocked_at";

// === Helper Functions ===

/// Format a timestamp for database storage
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn format_opt_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(format_ts)
}

/// Parse a text column through `FromStr`, reporting failures as conversion errors.
fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .transpose()
}

fn child_from_row(row: &Row<'_>) -> rusqlite::Result<Child> {
    Ok(Child {
        id: row.get(0)?,
        name: row.get(1)?,
        initial_tier: parse_col(row, 2)?,
        current_tier: parse_col(row, 3)?,
        max_tier: parse_col(row, 4)?,
        total_points: row.get(5)?,
        activities_completed: row.get(6)?,
        streak_days: row.get(7)?,
        last_activity_at: parse_opt_col(row, 8)?,
        created_at: parse_col(row, 9)?,
        active: row.get(10)?,
        initial_tier_configured: row.get(11)?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let content_json: String = row.get(5)?;
    let content: ActivityContent = serde_json::from_str(&content_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    Ok(Activity {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: parse_col(row, 3)?,
        tier: parse_col(row, 4)?,
        content,
        reward_points: row.get(6)?,
        estimated_minutes: row.get(7)?,
        active: row.get(8)?,
    })
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<Attempt> {
    Ok(Attempt {
        id: row.get(0)?,
        child_id: row.get(1)?,
        activity_id: row.get(2)?,
        category: parse_col(row, 3)?,
        completed: row.get(4)?,
        attempt_number: row.get(5)?,
        time_spent_secs: row.get(6)?,
        points: row.get(7)?,
        completed_at: parse_col(row, 8)?,
    })
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<CategoryProgress> {
    Ok(CategoryProgress {
        child_id: row.get(0)?,
        category: parse_col(row, 1)?,
        tier: parse_col(row, 2)?,
        stage: parse_col(row, 3)?,
        completed_count: row.get(4)?,
        total_available: row.get(5)?,
        points: row.get(6)?,
        last_activity_id: row.get(7)?,
        last_activity_at: parse_opt_col(row, 8)?,
        started_at: parse_opt_col(row, 9)?,
        active: row.get(10)?,
        tier_since: parse_opt_col(row, 11)?,
    })
}

fn medal_from_row(row: &Row<'_>) -> rusqlite::Result<Medal> {
    Ok(Medal {
        id: row.get(0)?,
        child_id: row.get(1)?,
        kind: parse_col(row, 2)?,
        category: parse_opt_col(row, 3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        icon: row.get(6)?,
        unlocked_at: parse_col(row, 7)?,
    })
}

/// SQLite database for the progression engine.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/tea-progress/tea-progress.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_with(&DatabaseConfig::default())
    }

    /// Open the configured database, falling back to the data directory.
    pub fn open_with(config: &DatabaseConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::open_at(path),
            None => Self::open_at(data_dir()?.join("tea-progress.db")),
        }
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.migrate()?;
        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database (for tests and dry runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(DatabaseError::from)?;
        migrations::migrate(&self.conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front so concurrent read-modify-write
    /// sequences serialise. Any error rolls the whole unit back.
    pub fn immediate<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    // === Children ===

    pub fn create_child(&self, name: &str, now: DateTime<Utc>) -> Result<Child> {
        let tier = Tier::LOWEST.as_str();
        self.conn.execute(
            "INSERT INTO children (name, initial_tier, current_tier, max_tier, created_at)
             VALUES (?1, ?2, ?2, ?2, ?3)",
            params![name, tier, format_ts(now)],
        )?;
        Ok(Child::new(self.conn.last_insert_rowid(), name, now))
    }

    pub fn get_child(&self, id: ChildId) -> Result<Option<Child>> {
        let sql = format!("SELECT {CHILD_COLUMNS} FROM children WHERE id = ?1");
        Ok(self.conn.query_row(&sql, [id], child_from_row).optional()?)
    }

    /// Like [`Self::get_child`] but a missing child is an error.
    pub fn require_child(&self, id: ChildId) -> Result<Child> {
        self.get_child(id)?
            .ok_or_else(|| CoreError::child_not_found(id))
    }

    pub fn list_children(&self, active_only: bool) -> Result<Vec<Child>> {
        let sql = format!(
            "SELECT {CHILD_COLUMNS} FROM children WHERE (?1 = 0 OR active = 1) ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([active_only], child_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Write the tier fields of a child that has not started yet.
    pub fn save_child_tiers(&self, child: &Child) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE children SET initial_tier = ?2, current_tier = ?3, max_tier = ?4,
                initial_tier_configured = ?5
             WHERE id = ?1",
            params![
                child.id,
                child.initial_tier.as_str(),
                child.current_tier.as_str(),
                child.max_tier.as_str(),
                child.initial_tier_configured,
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::child_not_found(child.id));
        }
        Ok(())
    }

    /// Persist one completion: counters grow in SQL, the rest is written as computed.
    pub fn apply_child_completion(&self, child: &Child, points: u32) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE children SET
                total_points = total_points + ?2,
                activities_completed = activities_completed + 1,
                streak_days = ?3,
                last_activity_at = ?4,
                current_tier = ?5,
                max_tier = ?6
             WHERE id = ?1",
            params![
                child.id,
                points,
                child.streak_days,
                format_opt_ts(child.last_activity_at),
                child.current_tier.as_str(),
                child.max_tier.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::child_not_found(child.id));
        }
        Ok(())
    }

    // === Activity catalog ===

    pub fn insert_activity(&self, activity: &NewActivity) -> Result<Activity> {
        let content = serde_json::to_string(&activity.content)?;
        self.conn.execute(
            "INSERT INTO activities
                (title, description, category, tier, kind, content, reward_points, estimated_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                activity.title,
                activity.description,
                activity.category.as_str(),
                activity.tier.as_str(),
                activity.content.kind(),
                content,
                activity.reward_points,
                activity.estimated_minutes,
            ],
        )?;
        Ok(Activity {
            id: self.conn.last_insert_rowid(),
            title: activity.title.clone(),
            description: activity.description.clone(),
            category: activity.category,
            tier: activity.tier,
            reward_points: activity.reward_points,
            estimated_minutes: activity.estimated_minutes,
            active: true,
            content: activity.content.clone(),
        })
    }

    pub fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>> {
        let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?1");
        Ok(self.conn.query_row(&sql, [id], activity_from_row).optional()?)
    }

    /// Catalog entries in insertion order.
    pub fn list_activities(
        &self,
        category: Option<Category>,
        active_only: bool,
    ) -> Result<Vec<Activity>> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities
             WHERE (?1 IS NULL OR category = ?1) AND (?2 = 0 OR active = 1)
             ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![category.map(Category::as_str), active_only],
            activity_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_activities(&self) -> Result<u32> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM activities", [], |row| row.get(0))?)
    }

    pub fn count_active_in_category(&self, category: Category) -> Result<u32> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM activities WHERE category = ?1 AND active = 1",
            [category.as_str()],
            |row| row.get(0),
        )?)
    }

    /// Retire or restore a catalog entry. Returns false for unknown ids.
    pub fn set_activity_active(&self, id: ActivityId, active: bool) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE activities SET active = ?2 WHERE id = ?1",
            params![id, active],
        )?;
        Ok(changed > 0)
    }

    // === Attempt log ===

    /// Append an attempt, numbering it per (child, activity).
    pub fn record_attempt(&self, attempt: &NewAttempt) -> Result<Attempt> {
        let activity = self
            .get_activity(attempt.activity_id)?
            .ok_or_else(|| CoreError::activity_not_found(attempt.activity_id))?;

        let previous: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM attempts WHERE child_id = ?1 AND activity_id = ?2",
            params![attempt.child_id, attempt.activity_id],
            |row| row.get(0),
        )?;
        let attempt_number = previous + 1;

        self.conn.execute(
            "INSERT INTO attempts
                (child_id, activity_id, category, completed, attempt_number,
                 time_spent_secs, points, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                attempt.child_id,
                attempt.activity_id,
                activity.category.as_str(),
                attempt.completed,
                attempt_number,
                attempt.time_spent_secs,
                attempt.points,
                format_ts(attempt.completed_at),
            ],
        )?;

        Ok(Attempt {
            id: self.conn.last_insert_rowid(),
            child_id: attempt.child_id,
            activity_id: attempt.activity_id,
            category: activity.category,
            completed: attempt.completed,
            attempt_number,
            time_spent_secs: attempt.time_spent_secs,
            points: attempt.points,
            completed_at: attempt.completed_at,
        })
    }

    /// A child's attempts, oldest first.
    pub fn query_attempts(&self, child_id: ChildId, query: &AttemptQuery) -> Result<Vec<Attempt>> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts
             WHERE child_id = ?1
               AND (?2 IS NULL OR activity_id = ?2)
               AND (?3 IS NULL OR category = ?3)
               AND (?4 IS NULL OR completed_at >= ?4)
             ORDER BY completed_at, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                child_id,
                query.activity_id,
                query.category.map(Category::as_str),
                format_opt_ts(query.since),
            ],
            attempt_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Distinct active activities of a category completed since `since`.
    pub fn distinct_completed_activities(
        &self,
        child_id: ChildId,
        category: Category,
        since: Option<DateTime<Utc>>,
    ) -> Result<u32> {
        Ok(self.conn.query_row(
            "SELECT COUNT(DISTINCT a.activity_id)
             FROM attempts a JOIN activities act ON act.id = a.activity_id
             WHERE a.child_id = ?1 AND a.category = ?2 AND a.completed = 1
               AND act.active = 1
               AND (?3 IS NULL OR a.completed_at >= ?3)",
            params![child_id, category.as_str(), format_opt_ts(since)],
            |row| row.get(0),
        )?)
    }

    // === Category progress ===

    pub fn get_progress(
        &self,
        child_id: ChildId,
        category: Category,
    ) -> Result<Option<CategoryProgress>> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM category_progress WHERE child_id = ?1 AND category = ?2"
        );
        Ok(self
            .conn
            .query_row(&sql, params![child_id, category.as_str()], progress_from_row)
            .optional()?)
    }

    /// Progress rows in category order.
    pub fn list_progress(&self, child_id: ChildId, active_only: bool) -> Result<Vec<CategoryProgress>> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM category_progress
             WHERE child_id = ?1 AND (?2 = 0 OR active = 1)"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![child_id, active_only], progress_from_row)?;
        let mut progress = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        progress.sort_by_key(|p| p.category);
        Ok(progress)
    }

    pub fn upsert_progress(&self, progress: &CategoryProgress) -> Result<()> {
        self.conn.execute(
            "INSERT INTO category_progress
                (child_id, category, tier, stage, completed_count, total_available, points,
                 last_activity_id, last_activity_at, started_at, active, tier_since)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(child_id, category) DO UPDATE SET
                tier = excluded.tier,
                stage = excluded.stage,
                completed_count = excluded.completed_count,
                total_available = excluded.total_available,
                points = excluded.points,
                last_activity_id = excluded.last_activity_id,
                last_activity_at = excluded.last_activity_at,
                started_at = excluded.started_at,
                active = excluded.active,
                tier_since = excluded.tier_since",
            params![
                progress.child_id,
                progress.category.as_str(),
                progress.tier.as_str(),
                progress.stage.as_str(),
                progress.completed_count,
                progress.total_available,
                progress.points,
                progress.last_activity_id,
                format_opt_ts(progress.last_activity_at),
                format_opt_ts(progress.started_at),
                progress.active,
                format_opt_ts(progress.tier_since),
            ],
        )?;
        Ok(())
    }

    /// Mark a progress row inactive. Returns false when there was no active row.
    pub fn deactivate_progress(&self, child_id: ChildId, category: Category) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE category_progress SET active = 0
             WHERE child_id = ?1 AND category = ?2 AND active = 1",
            params![child_id, category.as_str()],
        )?;
        Ok(changed > 0)
    }

    // === Medals ===

    /// Store an unlock; `None` when the child already holds it.
    pub fn insert_medal(
        &self,
        child_id: ChildId,
        key: MedalKey,
        now: DateTime<Utc>,
    ) -> Result<Option<Medal>> {
        let info = key.kind.info();
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO medals
                (child_id, kind, category, title, description, icon, unlocked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                child_id,
                key.kind.key(),
                key.category.map_or("", Category::as_str),
                info.title,
                info.description,
                info.icon,
                format_ts(now),
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(Medal {
            id: self.conn.last_insert_rowid(),
            child_id,
            kind: key.kind,
            category: key.category,
            title: info.title,
            description: info.description,
            icon: info.icon,
            unlocked_at: now,
        }))
    }

    /// Unlocked medals, newest first.
    pub fn list_medals(&self, child_id: ChildId) -> Result<Vec<Medal>> {
        let sql = format!(
            "SELECT {MEDAL_COLUMNS} FROM medals WHERE child_id = ?1
             ORDER BY unlocked_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([child_id], medal_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn unlocked_keys(&self, child_id: ChildId) -> Result<HashSet<MedalKey>> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, category FROM medals WHERE child_id = ?1")?;
        let rows = stmt.query_map([child_id], |row| {
            Ok(MedalKey {
                kind: parse_col::<MedalKind>(row, 0)?,
                category: parse_opt_col::<Category>(row, 1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<HashSet<_>>>()?)
    }
}
