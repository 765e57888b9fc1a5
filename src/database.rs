use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// A tracked series, keyed by the folder it lives in on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: i64,
    pub folder_name: String,
    pub tvdb_id: Option<i64>,
    pub tvdb_name: Option<String>,
    pub tvdb_image: Option<String>,
}

/// One watched file reported by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub folder_name: String,
    pub file_name: String,
    pub timestamp: NaiveDateTime,
}

impl SyncEvent {
    /// SQLite date functions and text ordering only handle four-digit years.
    pub fn has_storable_timestamp(&self) -> bool {
        (0..=9999).contains(&self.timestamp.year())
    }
}

/// First event whose timestamp cannot be stored, if any
pub fn first_unstorable(events: &[SyncEvent]) -> Option<&SyncEvent> {
    events.iter().find(|e| !e.has_storable_timestamp())
}

/// A show together with how many of its episodes were watched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowSummary {
    #[serde(flatten)]
    pub show: Show,
    pub episodes_watched: i64,
}

/// Episode joined with its owning show, as written to the CSV export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRow {
    pub id: i64,
    pub folder_name: String,
    pub file_name: String,
    pub timestamp: NaiveDateTime,
    pub tvdb_id: Option<i64>,
    pub tvdb_name: Option<String>,
    pub tvdb_image: Option<String>,
}

/// Database manager for shows and episodes
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create or open the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create database dir {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("open database {}", path.display()))?;
        info!("Opened database at {}", path.display());

        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Initialize database schema
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS show (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                folder_name TEXT NOT NULL UNIQUE,
                tvdb_id INTEGER,
                tvdb_name TEXT,
                tvdb_image TEXT
            );

            CREATE TABLE IF NOT EXISTS episode (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                show_id INTEGER NOT NULL REFERENCES show(id),
                file_name TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                UNIQUE (show_id, file_name)
            );

            CREATE INDEX IF NOT EXISTS idx_episode_timestamp ON episode(timestamp);",
        )
        .context("initialize schema")?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Record a batch of watch events, returning how many episodes were new.
    ///
    /// The whole batch runs in one transaction. Lookups go through the same
    /// transaction, so a repeated (folder, file) pair later in the batch sees
    /// the row inserted by its first occurrence. Any error drops the
    /// transaction, which rolls everything back.
    pub fn sync_episodes(&self, events: &[SyncEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        if let Some(event) = first_unstorable(events) {
            return Err(anyhow!(
                "timestamp {} of {}/{} is outside years 0000-9999",
                event.timestamp,
                event.folder_name,
                event.file_name
            ));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction().context("begin sync transaction")?;

        let mut added = 0;
        for event in events {
            let show_id = find_or_create_show(&tx, &event.folder_name)?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM episode WHERE show_id = ?1 AND file_name = ?2",
                    params![show_id, event.file_name],
                    |row| row.get(0),
                )
                .optional()
                .context("lookup episode")?;

            if existing.is_none() {
                tx.execute(
                    "INSERT INTO episode (show_id, file_name, timestamp) VALUES (?1, ?2, ?3)",
                    params![show_id, event.file_name, event.timestamp],
                )
                .with_context(|| {
                    format!("insert episode {}/{}", event.folder_name, event.file_name)
                })?;
                added += 1;
            }
        }

        tx.commit().context("commit sync transaction")?;
        debug!("Synced {} events, {} new episodes", events.len(), added);
        Ok(added)
    }

    /// Look up a show by id
    pub fn show(&self, id: i64) -> Result<Option<Show>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, folder_name, tvdb_id, tvdb_name, tvdb_image FROM show WHERE id = ?1",
            [id],
            |row| {
                Ok(Show {
                    id: row.get(0)?,
                    folder_name: row.get(1)?,
                    tvdb_id: row.get(2)?,
                    tvdb_name: row.get(3)?,
                    tvdb_image: row.get(4)?,
                })
            },
        )
        .optional()
        .context("lookup show")
    }

    /// Watched counts per show, most watched first; ties go to the older show.
    pub fn show_counts(&self) -> Result<Vec<ShowSummary>> {
        self.query_summaries(
            "SELECT s.id, s.folder_name, s.tvdb_id, s.tvdb_name, s.tvdb_image, COUNT(e.id) AS watched
             FROM show s
             JOIN episode e ON e.show_id = s.id
             GROUP BY s.id
             ORDER BY watched DESC, s.id ASC",
        )
    }

    /// Every show with its watched count, in creation order
    pub fn shows(&self) -> Result<Vec<ShowSummary>> {
        self.query_summaries(
            "SELECT s.id, s.folder_name, s.tvdb_id, s.tvdb_name, s.tvdb_image, COUNT(e.id) AS watched
             FROM show s
             LEFT JOIN episode e ON e.show_id = s.id
             GROUP BY s.id
             ORDER BY s.id ASC",
        )
    }

    fn query_summaries(&self, sql: &str) -> Result<Vec<ShowSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;

        let summaries = stmt
            .query_map([], |row| {
                Ok(ShowSummary {
                    show: Show {
                        id: row.get(0)?,
                        folder_name: row.get(1)?,
                        tvdb_id: row.get(2)?,
                        tvdb_name: row.get(3)?,
                        tvdb_image: row.get(4)?,
                    },
                    episodes_watched: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("query show counts")?;

        Ok(summaries)
    }

    /// Episodes watched per calendar day, oldest day first
    pub fn daily_counts(&self) -> Result<Vec<(NaiveDate, i64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT date(timestamp) AS day, COUNT(*)
             FROM episode
             GROUP BY day
             ORDER BY day ASC",
        )?;

        let days: Vec<(NaiveDate, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()
            .context("query daily counts")?;

        Ok(days)
    }

    /// All episodes with their show fields, ordered by timestamp then id
    pub fn episode_rows(&self) -> Result<Vec<EpisodeRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT e.id, s.folder_name, e.file_name, e.timestamp, s.tvdb_id, s.tvdb_name, s.tvdb_image
             FROM episode e
             JOIN show s ON s.id = e.show_id
             ORDER BY e.timestamp ASC, e.id ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(EpisodeRow {
                    id: row.get(0)?,
                    folder_name: row.get(1)?,
                    file_name: row.get(2)?,
                    timestamp: row.get(3)?,
                    tvdb_id: row.get(4)?,
                    tvdb_name: row.get(5)?,
                    tvdb_image: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("query episodes")?;

        Ok(rows)
    }

    pub fn episode_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM episode", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn show_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM show", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Store external metadata on a show. Returns false if no such show.
    pub fn update_show_metadata(
        &self,
        id: i64,
        tvdb_id: i64,
        tvdb_name: Option<&str>,
        tvdb_image: Option<&str>,
    ) -> Result<bool> {
        let conn = self.lock()?;

        let updated = conn
            .execute(
                "UPDATE show SET tvdb_id = ?1, tvdb_name = ?2, tvdb_image = ?3 WHERE id = ?4",
                params![tvdb_id, tvdb_name, tvdb_image, id],
            )
            .context("update show metadata")?;

        Ok(updated > 0)
    }
}

fn find_or_create_show(tx: &Transaction<'_>, folder_name: &str) -> Result<i64> {
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM show WHERE folder_name = ?1",
            [folder_name],
            |row| row.get(0),
        )
        .optional()
        .context("lookup show")?;

    if let Some(id) = existing {
        return Ok(id);
    }

    tx.execute("INSERT INTO show (folder_name) VALUES (?1)", [folder_name])
        .with_context(|| format!("insert show {}", folder_name))?;
    debug!("Created show {}", folder_name);
    Ok(tx.last_insert_rowid())
}
