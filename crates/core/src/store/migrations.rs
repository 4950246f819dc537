//! Schema migrations for the store database.
//!
//! Applied versions are recorded in a `_migrations` table; on open, every
//! migration above the recorded high-water mark runs in order.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Ordered migration batches. Versions must only ever be appended.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_entries.sql"))];

/// Bring the schema up to date, applying any versions newer than the
/// recorded high-water mark.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` when a migration batch does not
/// execute; bookkeeping failures surface as store errors.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .map_err(Error::from)?;

        let applied: i64 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
                row.get(0)
            })
            .map_err(Error::from)?;

        for &(version, sql) in MIGRATIONS {
            if version <= applied {
                continue;
            }
            conn.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("v{version}: {e}")))?;
            conn.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(Error::from)?;
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
