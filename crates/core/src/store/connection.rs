//! Store database handle.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

/// Handle to the store database.
///
/// Cloning is cheap: every clone funnels through the single background
/// thread that owns the SQLite connection, which is what lets the gateway
/// fire capture writes without coordinating with concurrent replay reads.
#[derive(Clone, Debug)]
pub struct StoreDb {
    pub(crate) conn: Connection,
}

impl StoreDb {
    /// Open the store at `path`, creating the file if needed, and bring
    /// its schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Store(e.into()))?;
        Self::setup(conn).await
    }

    /// Open a throwaway in-memory store. Used by tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Store(e.into()))?;
        Self::setup(conn).await
    }

    async fn setup(conn: Connection) -> Result<Self, Error> {
        // WAL keeps replay reads responsive while capture writes land;
        // foreign keys make store purges cascade over their entries.
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;
                 PRAGMA foreign_keys=ON;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Store)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_applies_pragmas_and_schema() {
        let db = StoreDb::open_in_memory().await.unwrap();

        let (foreign_keys, has_stores) = db
            .conn
            .call(|conn| -> Result<(bool, bool), Error> {
                let foreign_keys: bool = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
                let has_stores: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='stores')",
                    [],
                    |row| row.get(0),
                )?;
                Ok((foreign_keys, has_stores))
            })
            .await
            .unwrap();

        assert!(foreign_keys);
        assert!(has_stores);
    }

    #[tokio::test]
    async fn test_clones_share_the_store() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let other = db.clone();

        db.create_store("offgate-cache-v1").await.unwrap();
        assert_eq!(other.list_stores().await.unwrap(), vec!["offgate-cache-v1".to_string()]);
    }
}
