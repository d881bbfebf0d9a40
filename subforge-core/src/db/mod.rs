//! SQLite database layer for SubForge.
//!
//! Provides persistent storage for:
//! - Settings (app preferences, one JSON document per key)
//! - Translation providers (ordered JSON blobs)

mod migrations;

use rusqlite::{params, Connection};
use std::path::PathBuf;

use crate::engine::default_data_root;

/// Database file name inside the data root.
const DB_FILE: &str = "subforge.db";

/// Database connection wrapper.
///
/// Automatically handles connection setup, migrations, and file permissions.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open the database at the default location.
    ///
    /// Default path: `~/.local/share/subforge/subforge.db`
    pub fn open() -> anyhow::Result<Self> {
        Self::open_at(Self::default_path())
    }

    /// Open the database at a specific path.
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 0600 on Unix (provider keys live here).
    pub fn open_at(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            {
                tracing::warn!(path = %path.display(), error = %e, "Failed to set database file permissions");
            }
        }

        Ok(Self { conn, path })
    }

    /// In-memory database, used when the file cannot be opened.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        })
    }

    /// Get the default database path.
    pub fn default_path() -> PathBuf {
        default_data_root().join(DB_FILE)
    }

    /// Run database migrations.
    ///
    /// Safe to call multiple times - migrations are tracked and only run once.
    pub fn migrate(&self) -> anyhow::Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get the database file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    // =========================================================================
    // Settings Storage
    // =========================================================================

    /// Save a setting to the database (upsert).
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, unixepoch())
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            [key, value],
        )?;
        Ok(())
    }

    /// Get a setting from the database.
    ///
    /// Returns `None` if the setting doesn't exist.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM settings WHERE key = ?")?;
        let result = stmt.query_row([key], |row| row.get(0));
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a setting from the database.
    pub fn delete_setting(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?", [key])?;
        Ok(())
    }

    // =========================================================================
    // Translation Provider Storage
    // =========================================================================

    /// All provider rows as `(id, config_json)`, in display order.
    pub fn list_providers(&self) -> Result<Vec<(String, String)>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, config FROM translation_providers ORDER BY position, id")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    /// Replaces the stored providers with `rows`, keeping their order.
    pub fn replace_providers(&self, rows: &[(String, String)]) -> Result<(), rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM translation_providers", [])?;
        for (position, (id, config)) in rows.iter().enumerate() {
            tx.execute(
                "INSERT INTO translation_providers (id, position, config) VALUES (?, ?, ?)",
                params![id, position as i64, config],
            )?;
        }
        tx.commit()
    }

    /// Whether any provider row has been stored.
    pub fn has_providers(&self) -> Result<bool, rusqlite::Error> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM translation_providers)",
            [],
            |row| row.get(0),
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
