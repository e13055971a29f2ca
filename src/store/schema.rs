use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Create or migrate the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
        [version],
    )?;
    Ok(())
}

fn create_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS subtitle_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            series TEXT NOT NULL,
            season TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_path TEXT NOT NULL UNIQUE,
            is_processed INTEGER NOT NULL DEFAULT 0,
            is_wanted INTEGER NOT NULL DEFAULT 0,
            force_process INTEGER NOT NULL DEFAULT 0,
            already_had INTEGER NOT NULL DEFAULT 0,
            last_scanned INTEGER NOT NULL,
            processed_at INTEGER,
            error_message TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_subtitle_entries_series_season
            ON subtitle_entries (series, season);

        CREATE TABLE IF NOT EXISTS series_watch_configs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            series_name TEXT NOT NULL,
            season_name TEXT,
            auto_watch INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        -- NULL season is the whole-series scope and must be unique as well
        CREATE UNIQUE INDEX IF NOT EXISTS idx_series_watch_configs_scope
            ON series_watch_configs (series_name, COALESCE(season_name, ''));

        CREATE TABLE IF NOT EXISTS api_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model TEXT NOT NULL,
            recorded_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_api_usage_model_time
            ON api_usage (model, recorded_at);

        CREATE TABLE IF NOT EXISTS app_settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT NOT NULL UNIQUE,
            value TEXT NOT NULL,
            description TEXT,
            updated_at INTEGER NOT NULL
        );
        "#,
    )?;

    Ok(())
}
