// Key/value operations over the app_state table
use rusqlite::{params, OptionalExtension};

use crate::db::connection::DatabaseConnection;
use crate::error::Result;

/// Store key for the last selected music directory
pub const MUSIC_DIR_KEY: &str = "music-dir";

/// Small key/value store used to restore session state across runs.
///
/// The player works fine without it: a missing or broken store just
/// means no remembered directory.
pub struct StateStore;

impl StateStore {
    /// Insert or replace a value
    pub fn put(db: &DatabaseConnection, key: &str, value: &str) -> Result<()> {
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        conn.execute(
            "INSERT INTO app_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;

        Ok(())
    }

    /// Look up a value, `None` when the key was never stored
    pub fn get(db: &DatabaseConnection, key: &str) -> Result<Option<String>> {
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        let value = conn
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    /// Remove a key; removing an absent key is not an error
    pub fn delete(db: &DatabaseConnection, key: &str) -> Result<()> {
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        conn.execute("DELETE FROM app_state WHERE key = ?1", params![key])?;

        Ok(())
    }
}
