//! Database schema migrations for tea-progress.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{debug, warn};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: children, catalog, attempt log, category progress, medals.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS children (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            name                 TEXT NOT NULL,
            initial_tier         TEXT NOT NULL DEFAULT 'inicial',
            current_tier         TEXT NOT NULL DEFAULT 'inicial',
            max_tier             TEXT NOT NULL DEFAULT 'inicial',
            total_points         INTEGER NOT NULL DEFAULT 0,
            activities_completed INTEGER NOT NULL DEFAULT 0,
            streak_days          INTEGER NOT NULL DEFAULT 0,
            last_activity_at     TEXT,
            created_at           TEXT NOT NULL,
            active               INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS activities (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            title             TEXT NOT NULL,
            description       TEXT NOT NULL DEFAULT '',
            category          TEXT NOT NULL,
            tier              TEXT NOT NULL,
            kind              TEXT NOT NULL,
            content           TEXT NOT NULL,
            reward_points     INTEGER NOT NULL DEFAULT 10,
            estimated_minutes INTEGER NOT NULL DEFAULT 5,
            active            INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS attempts (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            child_id        INTEGER NOT NULL REFERENCES children(id),
            activity_id     INTEGER NOT NULL REFERENCES activities(id),
            category        TEXT NOT NULL,
            completed       INTEGER NOT NULL,
            attempt_number  INTEGER NOT NULL,
            time_spent_secs INTEGER NOT NULL DEFAULT 0,
            points          INTEGER NOT NULL DEFAULT 0,
            completed_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS category_progress (
            child_id         INTEGER NOT NULL REFERENCES children(id),
            category         TEXT NOT NULL,
            tier             TEXT NOT NULL,
            stage            TEXT NOT NULL DEFAULT 'inicial',
            completed_count  INTEGER NOT NULL DEFAULT 0,
            total_available  INTEGER NOT NULL DEFAULT 0,
            points           INTEGER NOT NULL DEFAULT 0,
            last_activity_id INTEGER REFERENCES activities(id),
            last_activity_at TEXT,
            started_at       TEXT,
            active           INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (child_id, category)
        );

        CREATE TABLE IF NOT EXISTS medals (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            child_id    INTEGER NOT NULL REFERENCES children(id),
            kind        TEXT NOT NULL,
            category    TEXT NOT NULL DEFAULT '',
            title       TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            icon        TEXT NOT NULL DEFAULT '',
            unlocked_at TEXT NOT NULL,
            UNIQUE (child_id, kind, category)
        );",
    )?;

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [1])?;
    tx.commit()?;
    debug!("schema migrated to v1");
    Ok(())
}

/// Migration v2: indexes for the attempt-log query patterns.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_attempts_child_completed_at ON attempts(child_id, completed_at);
         CREATE INDEX IF NOT EXISTS idx_attempts_child_activity ON attempts(child_id, activity_id);
         CREATE INDEX IF NOT EXISTS idx_attempts_child_category ON attempts(child_id, category);
         CREATE INDEX IF NOT EXISTS idx_activities_category_tier ON activities(category, tier);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    debug!("schema migrated to v2");
    Ok(())
}

/// Migration v3: one-time initial tier flag and the start of a category's
/// current rung.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE children ADD COLUMN initial_tier_configured INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE category_progress ADD COLUMN tier_since TEXT;",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()?;
    debug!("schema migrated to v3");
    Ok(())
}
