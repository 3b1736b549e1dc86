//! Cache backend on SQLite.
//! One row per tagged string; batches are upserted in a single transaction.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection};
use tracing::info;

use super::cache::{CacheBackend, CacheError};

pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open (or create) the cache database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn, db_path.display().to_string())
    }

    /// Non-durable database, used when the file cannot be opened.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn init(conn: Connection, label: String) -> Result<Self, CacheError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS translation_cache (
                tagged_text TEXT PRIMARY KEY,
                translated_text TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );",
        )?;
        info!(path = %label, "SQLite cache opened");
        Ok(Self { conn })
    }
}

impl CacheBackend for SqliteBackend {
    fn load(&mut self) -> Result<HashMap<String, String>, CacheError> {
        let mut stmt = self
            .conn
            .prepare("SELECT tagged_text, translated_text FROM translation_cache")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut entries = HashMap::new();
        for row in rows {
            let (tagged, text) = row?;
            entries.insert(tagged, text);
        }
        Ok(entries)
    }

    fn store(&mut self, batch: &[(String, String)]) -> Result<(), CacheError> {
        let now = now_unix();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO translation_cache
                 (tagged_text, translated_text, created_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (tagged, text) in batch {
                stmt.execute(params![tagged, text, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Current time as Unix timestamp (seconds).
fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
