//! SQLite catalog of processed videos and their star ratings.

use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use vidseek_core::traits::VideoCatalog;
use vidseek_core::types::video_id_for_path;

pub const MAX_STAR_RATING: u8 = 5;

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS processed_videos (
                id TEXT PRIMARY KEY,
                file_path TEXT NOT NULL UNIQUE,
                star_rating INTEGER NOT NULL DEFAULT 0,
                success INTEGER NOT NULL DEFAULT 0,
                processed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_processed_videos_path ON processed_videos(file_path);
            ",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl VideoCatalog for SqliteCatalog {
    fn star_rating(&self, video_path: &str) -> Result<Option<u8>> {
        let conn = self.lock();
        let rating: Option<i64> = conn
            .query_row(
                "SELECT star_rating FROM processed_videos WHERE file_path = ?1",
                params![video_path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(rating.map(|r| r.clamp(0, i64::from(MAX_STAR_RATING)) as u8))
    }

    /// Inserts a minimal unprocessed row when the video is unknown.
    fn set_star_rating(&self, video_path: &str, rating: u8) -> Result<()> {
        if rating > MAX_STAR_RATING {
            return Err(anyhow!("star rating {rating} outside 0..={MAX_STAR_RATING}"));
        }
        let conn = self.lock();
        conn.execute(
            "INSERT INTO processed_videos (id, file_path, star_rating, success) VALUES (?1, ?2, ?3, 0)
             ON CONFLICT(file_path) DO UPDATE SET star_rating = excluded.star_rating",
            params![video_id_for_path(video_path), video_path, i64::from(rating)],
        )?;
        Ok(())
    }

    fn is_processed(&self, video_path: &str) -> Result<bool> {
        let conn = self.lock();
        let success: Option<i64> = conn
            .query_row(
                "SELECT success FROM processed_videos WHERE file_path = ?1",
                params![video_path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(success.unwrap_or(0) != 0)
    }

    fn mark_processed(&self, video_path: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO processed_videos (id, file_path, success, processed_at) VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(file_path) DO UPDATE SET success = 1, processed_at = excluded.processed_at",
            params![video_id_for_path(video_path), video_path, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
