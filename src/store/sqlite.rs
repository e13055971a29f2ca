use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::schema;
use super::{EntryRepository, SettingsStore, UsageRepository, WatchConfigRepository};
use crate::error::{Result, TranslarrError};
use crate::models::{
    is_eligible, ApiUsageRecord, AppSetting, SeasonGroup, SeriesGroup, SeriesWatchConfig, SubtitleEntry,
};

const ENTRY_COLUMNS: &str = "id, series, season, file_name, file_path, is_processed, is_wanted, \
     force_process, already_had, last_scanned, processed_at, error_message";

const WATCH_COLUMNS: &str = "id, series_name, season_name, auto_watch, created_at";

/// SQLite-backed store implementing every repository trait.
///
/// Statements run on tokio's blocking pool behind one shared connection.
#[derive(Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (and create if needed) the database file at the given path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {}", db_path.display());
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Self::from_connection(conn, db_path)
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        debug!("Creating in-memory database");
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, db_path: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn)?;
        register_functions(&conn)?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Run a closure against the connection on the blocking pool
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| TranslarrError::Task(format!("Failed to acquire database lock: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| TranslarrError::Task(format!("Database task panicked: {}", e)))?
    }
}

/// Expose the batch eligibility predicate to SQL
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "translarr_eligible",
        4,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            Ok(is_eligible(
                ctx.get::<bool>(0)?,
                ctx.get::<bool>(1)?,
                ctx.get::<bool>(2)?,
                ctx.get::<bool>(3)?,
            ))
        },
    )?;
    Ok(())
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<SubtitleEntry> {
    Ok(SubtitleEntry {
        id: row.get(0)?,
        series: row.get(1)?,
        season: row.get(2)?,
        file_name: row.get(3)?,
        file_path: row.get(4)?,
        is_processed: row.get(5)?,
        is_wanted: row.get(6)?,
        force_process: row.get(7)?,
        already_had: row.get(8)?,
        last_scanned: from_millis(row.get(9)?),
        processed_at: row.get::<_, Option<i64>>(10)?.map(from_millis),
        error_message: row.get(11)?,
    })
}

fn watch_from_row(row: &Row<'_>) -> rusqlite::Result<SeriesWatchConfig> {
    Ok(SeriesWatchConfig {
        id: row.get(0)?,
        series_name: row.get(1)?,
        season_name: row.get(2)?,
        auto_watch: row.get(3)?,
        created_at: from_millis(row.get(4)?),
    })
}

fn query_entries(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<SubtitleEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let entries = stmt
        .query_map(params, entry_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

#[async_trait]
impl EntryRepository for SqliteStore {
    async fn find_by_path(&self, file_path: &str) -> Result<Option<SubtitleEntry>> {
        let file_path = file_path.to_string();

        self.run(move |conn| {
            let sql = format!("SELECT {} FROM subtitle_entries WHERE file_path = ?1", ENTRY_COLUMNS);
            Ok(conn.query_row(&sql, [file_path], entry_from_row).optional()?)
        })
        .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<SubtitleEntry>> {
        self.run(move |conn| {
            let sql = format!("SELECT {} FROM subtitle_entries WHERE id = ?1", ENTRY_COLUMNS);
            Ok(conn.query_row(&sql, [id], entry_from_row).optional()?)
        })
        .await
    }

    async fn insert(&self, entry: &SubtitleEntry) -> Result<i64> {
        let entry = entry.clone();

        self.run(move |conn| {
            conn.execute(
                r#"
                INSERT INTO subtitle_entries (
                    series, season, file_name, file_path, is_processed, is_wanted,
                    force_process, already_had, last_scanned, processed_at, error_message
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    entry.series,
                    entry.season,
                    entry.file_name,
                    entry.file_path,
                    entry.is_processed,
                    entry.is_wanted,
                    entry.force_process,
                    entry.already_had,
                    to_millis(entry.last_scanned),
                    entry.processed_at.map(to_millis),
                    entry.error_message,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn update(&self, entry: &SubtitleEntry) -> Result<()> {
        let entry = entry.clone();

        self.run(move |conn| {
            let changed = conn.execute(
                r#"
                UPDATE subtitle_entries SET
                    series = ?2, season = ?3, file_name = ?4, file_path = ?5,
                    is_processed = ?6, is_wanted = ?7, force_process = ?8, already_had = ?9,
                    last_scanned = ?10, processed_at = ?11, error_message = ?12
                WHERE id = ?1
                "#,
                params![
                    entry.id,
                    entry.series,
                    entry.season,
                    entry.file_name,
                    entry.file_path,
                    entry.is_processed,
                    entry.is_wanted,
                    entry.force_process,
                    entry.already_had,
                    to_millis(entry.last_scanned),
                    entry.processed_at.map(to_millis),
                    entry.error_message,
                ],
            )?;

            if changed == 0 {
                return Err(TranslarrError::NotFound(format!(
                    "SubtitleEntry with Id {} not found",
                    entry.id
                )));
            }
            Ok(())
        })
        .await
    }

    async fn get_all(&self) -> Result<Vec<SubtitleEntry>> {
        self.run(|conn| {
            let sql = format!("SELECT {} FROM subtitle_entries ORDER BY id", ENTRY_COLUMNS);
            query_entries(conn, &sql, [])
        })
        .await
    }

    async fn get_unprocessed_wanted(&self, limit: usize) -> Result<Vec<SubtitleEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM subtitle_entries \
                 WHERE translarr_eligible(is_processed, is_wanted, already_had, force_process) \
                 ORDER BY id LIMIT ?1",
                ENTRY_COLUMNS
            );
            query_entries(conn, &sql, [limit])
        })
        .await
    }

    async fn bulk_set_wanted(&self, series: &str, season: Option<&str>, wanted: bool) -> Result<usize> {
        let series = series.to_string();
        let season = season.map(str::to_string);

        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE subtitle_entries SET is_wanted = ?3 \
                 WHERE series = ?1 AND (?2 IS NULL OR season = ?2)",
                params![series, season, wanted],
            )?;
            Ok(changed)
        })
        .await
    }

    async fn delete_by_ids(&self, ids: &[i64]) -> Result<usize> {
        let mut ids: Vec<i64> = ids.iter().copied().filter(|id| *id > 0).collect();
        ids.sort_unstable();
        ids.dedup();

        if ids.is_empty() {
            return Ok(0);
        }

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM subtitle_entries WHERE id = ?1")?;
                for id in &ids {
                    removed += stmt.execute([id])?;
                }
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn series_groups(&self) -> Result<Vec<SeriesGroup>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT series, season, COUNT(*), SUM(is_wanted), SUM(is_processed)
                FROM subtitle_entries
                GROUP BY series, season
                ORDER BY series, season
                "#,
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        SeasonGroup {
                            season_name: row.get(1)?,
                            total_files: row.get::<_, i64>(2)? as usize,
                            wanted_files: row.get::<_, i64>(3)? as usize,
                            processed_files: row.get::<_, i64>(4)? as usize,
                            is_watched: false,
                        },
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut grouped: BTreeMap<String, Vec<SeasonGroup>> = BTreeMap::new();
            for (series, season) in rows {
                grouped.entry(series).or_default().push(season);
            }

            Ok(grouped
                .into_iter()
                .map(|(series_name, seasons)| SeriesGroup {
                    total_files: seasons.iter().map(|s| s.total_files).sum(),
                    wanted_files: seasons.iter().map(|s| s.wanted_files).sum(),
                    processed_files: seasons.iter().map(|s| s.processed_files).sum(),
                    series_name,
                    seasons,
                    is_watched: false,
                })
                .collect())
        })
        .await
    }
}

#[async_trait]
impl WatchConfigRepository for SqliteStore {
    async fn get_all_watch_configs(&self) -> Result<Vec<SeriesWatchConfig>> {
        self.run(|conn| {
            let sql = format!("SELECT {} FROM series_watch_configs ORDER BY id", WATCH_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let configs = stmt
                .query_map([], watch_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(configs)
        })
        .await
    }

    async fn get_watch_config(&self, series: &str, season: Option<&str>) -> Result<Option<SeriesWatchConfig>> {
        let series = series.to_string();
        let season = season.map(str::to_string);

        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM series_watch_configs WHERE series_name = ?1 AND season_name IS ?2",
                WATCH_COLUMNS
            );
            Ok(conn
                .query_row(&sql, params![series, season], watch_from_row)
                .optional()?)
        })
        .await
    }

    async fn add_watch_config(&self, series: &str, season: Option<&str>, auto_watch: bool) -> Result<SeriesWatchConfig> {
        let series = series.to_string();
        let season = season.map(str::to_string);

        self.run(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT COUNT(*) FROM series_watch_configs WHERE series_name = ?1 AND season_name IS ?2",
                params![series, season],
                |row| row.get(0),
            )?;

            if exists {
                return Err(TranslarrError::Conflict(format!(
                    "Watch configuration already exists for {}",
                    SeriesWatchConfig::scope_label(&series, season.as_deref())
                )));
            }

            let created_at = Utc::now();
            conn.execute(
                "INSERT INTO series_watch_configs (series_name, season_name, auto_watch, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![series, season, auto_watch, to_millis(created_at)],
            )?;

            Ok(SeriesWatchConfig {
                id: conn.last_insert_rowid(),
                series_name: series,
                season_name: season,
                auto_watch,
                created_at,
            })
        })
        .await
    }

    async fn delete_watch_config(&self, series: &str, season: Option<&str>) -> Result<bool> {
        let series = series.to_string();
        let season = season.map(str::to_string);

        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM series_watch_configs WHERE series_name = ?1 AND season_name IS ?2",
                params![series, season],
            )?;
            Ok(removed > 0)
        })
        .await
    }
}

#[async_trait]
impl UsageRepository for SqliteStore {
    async fn record_usage(&self, model: &str, at: DateTime<Utc>) -> Result<()> {
        let model = model.to_string();

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO api_usage (model, recorded_at) VALUES (?1, ?2)",
                params![model, to_millis(at)],
            )?;
            Ok(())
        })
        .await
    }

    async fn count_usage(&self, model: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<usize> {
        let model = model.to_string();

        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM api_usage WHERE model = ?1 AND recorded_at >= ?2 AND recorded_at < ?3",
                params![model, to_millis(from), to_millis(to)],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn usage_between(&self, from: DateTime<Utc>, to: DateTime<Utc>, model: Option<&str>) -> Result<Vec<ApiUsageRecord>> {
        let model = model.map(str::to_string);

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, model, recorded_at FROM api_usage \
                 WHERE recorded_at >= ?1 AND recorded_at <= ?2 AND (?3 IS NULL OR model = ?3) \
                 ORDER BY recorded_at",
            )?;
            let records = stmt
                .query_map(params![to_millis(from), to_millis(to), model], |row| {
                    Ok(ApiUsageRecord {
                        id: row.get(0)?,
                        model: row.get(1)?,
                        recorded_at: from_millis(row.get(2)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();

        self.run(move |conn| {
            Ok(conn
                .query_row("SELECT value FROM app_settings WHERE key = ?1", [key], |row| row.get(0))
                .optional()?)
        })
        .await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, to_millis(Utc::now())],
            )?;
            Ok(())
        })
        .await
    }

    async fn seed_setting(&self, key: &str, value: &str, description: &str) -> Result<bool> {
        let key = key.to_string();
        let value = value.to_string();
        let description = description.to_string();

        self.run(move |conn| {
            let added = conn.execute(
                "INSERT OR IGNORE INTO app_settings (key, value, description, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![key, value, description, to_millis(Utc::now())],
            )?;
            Ok(added > 0)
        })
        .await
    }

    async fn all_settings(&self) -> Result<Vec<AppSetting>> {
        self.run(|conn| {
            let mut stmt =
                conn.prepare("SELECT key, value, description, updated_at FROM app_settings ORDER BY key")?;
            let settings = stmt
                .query_map([], |row| {
                    Ok(AppSetting {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        description: row.get(2)?,
                        updated_at: from_millis(row.get(3)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(settings)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VideoFile;
    use chrono::Duration;

    fn entry(path: &str, series: &str, season: &str) -> SubtitleEntry {
        let video = VideoFile {
            file_path: PathBuf::from(path),
            file_name: Path::new(path).file_name().unwrap().to_string_lossy().into_owned(),
            series: series.to_string(),
            season: season.to_string(),
        };
        SubtitleEntry::discovered(&video, false, false, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_and_find_by_path() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert(&entry("/m/Show/S1/e01.mkv", "Show", "S1")).await.unwrap();

        let found = store.find_by_path("/m/Show/S1/e01.mkv").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.series, "Show");
        assert!(store.find_by_path("/m/Show/S1/E01.mkv").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_path_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&entry("/m/a.mkv", "A", "A")).await.unwrap();
        assert!(store.insert(&entry("/m/a.mkv", "A", "A")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_round_trips_all_flags() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert(&entry("/m/Show/S1/e01.mkv", "Show", "S1")).await.unwrap();

        let mut stored = store.find_by_id(id).await.unwrap().unwrap();
        stored.is_processed = true;
        stored.force_process = true;
        stored.processed_at = Some(Utc::now());
        stored.error_message = Some("boom".to_string());
        store.update(&stored).await.unwrap();

        let reloaded = store.find_by_id(id).await.unwrap().unwrap();
        assert!(reloaded.is_processed);
        assert!(reloaded.force_process);
        assert!(reloaded.processed_at.is_some());
        assert_eq!(reloaded.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_update_missing_entry_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ghost = entry("/m/ghost.mkv", "G", "G");
        ghost.id = 42;
        assert!(matches!(store.update(&ghost).await, Err(TranslarrError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unprocessed_wanted_uses_eligibility_predicate() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut wanted = entry("/m/1.mkv", "S", "1");
        wanted.is_wanted = true;
        let mut had = entry("/m/2.mkv", "S", "1");
        had.is_wanted = true;
        had.already_had = true;
        let mut forced = entry("/m/3.mkv", "S", "1");
        forced.is_processed = true;
        forced.force_process = true;
        let idle = entry("/m/4.mkv", "S", "1");

        for e in [&wanted, &had, &forced, &idle] {
            store.insert(e).await.unwrap();
        }

        let batch = store.get_unprocessed_wanted(10).await.unwrap();
        let paths: Vec<_> = batch.iter().map(|e| e.file_path.as_str()).collect();
        assert_eq!(paths, vec!["/m/1.mkv", "/m/3.mkv"]);

        let all = store.get_all().await.unwrap();
        let expected: Vec<_> = all.iter().filter(|e| e.is_eligible()).map(|e| e.file_path.as_str()).collect();
        assert_eq!(paths, expected);

        assert_eq!(store.get_unprocessed_wanted(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_set_wanted_scopes() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&entry("/m/Show/S1/e01.mkv", "Show", "S1")).await.unwrap();
        store.insert(&entry("/m/Show/S2/e01.mkv", "Show", "S2")).await.unwrap();
        store.insert(&entry("/m/Other/S1/e01.mkv", "Other", "S1")).await.unwrap();

        assert_eq!(store.bulk_set_wanted("Show", Some("S1"), true).await.unwrap(), 1);
        assert_eq!(store.bulk_set_wanted("Show", None, true).await.unwrap(), 2);

        let other = store.find_by_path("/m/Other/S1/e01.mkv").await.unwrap().unwrap();
        assert!(!other.is_wanted);
    }

    #[tokio::test]
    async fn test_delete_by_ids_counts_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.insert(&entry("/m/a.mkv", "A", "A")).await.unwrap();
        let b = store.insert(&entry("/m/b.mkv", "A", "A")).await.unwrap();

        assert_eq!(store.delete_by_ids(&[a, a, 999]).await.unwrap(), 1);
        assert_eq!(store.delete_by_ids(&[]).await.unwrap(), 0);
        assert_eq!(store.get_all().await.unwrap().len(), 1);
        assert!(store.find_by_id(b).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_series_groups_aggregate_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut e1 = entry("/m/Show/S1/e01.mkv", "Show", "S1");
        e1.is_wanted = true;
        e1.is_processed = true;
        store.insert(&e1).await.unwrap();
        store.insert(&entry("/m/Show/S1/e02.mkv", "Show", "S1")).await.unwrap();
        store.insert(&entry("/m/Show/S2/e01.mkv", "Show", "S2")).await.unwrap();
        store.insert(&entry("/m/Alpha/S1/e01.mkv", "Alpha", "S1")).await.unwrap();

        let groups = store.series_groups().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].series_name, "Alpha");
        let show = &groups[1];
        assert_eq!(show.total_files, 3);
        assert_eq!(show.wanted_files, 1);
        assert_eq!(show.processed_files, 1);
        assert_eq!(show.seasons.len(), 2);
        assert_eq!(show.seasons[0].total_files, 2);
    }

    #[tokio::test]
    async fn test_watch_config_conflict_and_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_watch_config("Show", None, true).await.unwrap();
        store.add_watch_config("Show", Some("S1"), true).await.unwrap();

        let conflict = store.add_watch_config("Show", None, true).await;
        assert!(matches!(conflict, Err(TranslarrError::Conflict(_))));

        assert!(store.get_watch_config("Show", Some("S1")).await.unwrap().is_some());
        assert!(store.delete_watch_config("Show", None).await.unwrap());
        assert!(!store.delete_watch_config("Show", None).await.unwrap());
        assert_eq!(store.get_all_watch_configs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_usage_counts_by_window_and_model() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.record_usage("gemini-2.5-pro", now - Duration::seconds(90)).await.unwrap();
        store.record_usage("gemini-2.5-pro", now - Duration::seconds(10)).await.unwrap();
        store.record_usage("gemini-2.5-flash", now - Duration::seconds(5)).await.unwrap();

        let recent = store
            .count_usage("gemini-2.5-pro", now - Duration::seconds(60), now + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(recent, 1);

        let all = store
            .usage_between(now - Duration::hours(1), now, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let flash = store
            .usage_between(now - Duration::hours(1), now, Some("gemini-2.5-flash"))
            .await
            .unwrap();
        assert_eq!(flash.len(), 1);
    }

    #[tokio::test]
    async fn test_settings_seed_does_not_overwrite() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.seed_setting("PreferredSubsLang", "pl", "target").await.unwrap());
        store.set_setting("PreferredSubsLang", "uk").await.unwrap();
        assert!(!store.seed_setting("PreferredSubsLang", "pl", "target").await.unwrap());

        assert_eq!(store.get_setting("PreferredSubsLang").await.unwrap().as_deref(), Some("uk"));
        assert_eq!(store.get_setting("Missing").await.unwrap(), None);

        let all = store.all_settings().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description.as_deref(), Some("target"));
    }

    #[tokio::test]
    async fn test_open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("translarr.db");

        let store = SqliteStore::open(&path).unwrap();
        store.set_setting("GeminiModel", "gemini-2.5-pro").await.unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }
}
