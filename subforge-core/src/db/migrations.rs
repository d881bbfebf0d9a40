//! Database migrations for SubForge.
//!
//! Migrations are applied in order and recorded by name.

use anyhow::Context;
use rusqlite::Connection;

/// SQL for the initial schema migration.
const MIGRATION_001_SETTINGS: &str = r#"
-- Settings table (key-value store for app preferences)
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (unixepoch())
);
"#;

/// SQL for the translation providers migration.
const MIGRATION_002_TRANSLATION_PROVIDERS: &str = r#"
-- Translation providers (ordered, config kept as a JSON blob)
CREATE TABLE IF NOT EXISTS translation_providers (
    id TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    config TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (unixepoch())
);

CREATE INDEX IF NOT EXISTS idx_translation_providers_position
    ON translation_providers(position);
"#;

/// All migrations in order. Each is (name, sql).
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_settings", MIGRATION_001_SETTINGS),
    ("002_translation_providers", MIGRATION_002_TRANSLATION_PROVIDERS),
];

/// Apply every migration not yet recorded in the `migrations` table.
///
/// Each migration and its bookkeeping row commit together.
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL DEFAULT (unixepoch())
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        if is_applied(conn, name)? {
            continue;
        }

        tracing::info!(migration = %name, "Applying migration");
        let tx = conn
            .unchecked_transaction()
            .with_context(|| format!("begin migration {name}"))?;
        tx.execute_batch(sql)
            .with_context(|| format!("migration {name} failed"))?;
        tx.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
        tx.commit()?;
    }

    Ok(())
}

fn is_applied(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )
}
