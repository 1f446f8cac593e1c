use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use directories::ProjectDirs;
use rusqlite::{Connection, params};

use crate::api::models::Conversation;
use crate::error::StorageError;

/// Last conversation list seen per user, so the sidebar has something to show
/// before the list request returns. The backend stays authoritative.
#[derive(Debug, Clone)]
pub struct ConversationCache {
    path: PathBuf,
}

impl ConversationCache {
    pub fn default_path() -> Option<PathBuf> {
        let proj = ProjectDirs::from("com", "example", "Tripper")?;
        Some(proj.data_dir().join("cache.sqlite"))
    }

    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(Self::default_path().ok_or(StorageError::NoDataDir)?)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let cache = Self {
            path: path.as_ref().to_path_buf(),
        };
        if let Some(parent) = cache.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = cache.conn()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS conversations (
                user_id TEXT NOT NULL,
                id INTEGER NOT NULL,
                title TEXT,
                started_at TEXT NOT NULL,
                position INTEGER NOT NULL,
                cached_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, id)
            );
            "#,
        )?;
        Ok(cache)
    }

    fn conn(&self) -> Result<Connection, StorageError> {
        Ok(Connection::open(&self.path)?)
    }

    /// Replace everything cached for `user_id` with `conversations`, keeping
    /// the order the backend returned.
    pub fn replace(&self, user_id: &str, conversations: &[Conversation]) -> Result<(), StorageError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM conversations WHERE user_id = ?1", params![user_id])?;
        for (position, c) in conversations.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO conversations (user_id, id, title, started_at, position, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(user_id, id) DO UPDATE SET
                    title=excluded.title,
                    started_at=excluded.started_at,
                    position=excluded.position,
                    cached_at=excluded.cached_at
                "#,
                params![user_id, c.id, c.title, c.started_at, position as i64, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn conversations(&self, user_id: &str) -> Result<Vec<Conversation>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, started_at FROM conversations WHERE user_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Conversation {
                id: row.get(0)?,
                title: row.get(1)?,
                started_at: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
