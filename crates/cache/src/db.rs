//! Database connection and pool management.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::sqlite::{
    SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

/// Schema for the folder tree and file records, applied on every connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
/// A batch upload runs eight tasks that each look up a hash and insert a
/// record; a couple of spare connections keep folder lookups from queueing
/// behind them. Writes still go through the single WAL writer.
const MAX_CONNECTIONS: u32 = 10;
/// How long a writer waits for another to finish before reporting
/// [`Database`](ErrorKind::Database) (retryable).
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Connection pool for the metadata database.
///
/// Hand it to [`Repository`](crate::Repository) to read and write records.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Pragmas issued as queries only affect the connection they ran
            // on, so every pooled connection gets them as it is opened.
            .after_connect(|conn, _meta| Box::pin(async move { Self::tune(conn).await }))
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to the metadata database at the given path.
    ///
    /// Creates the database file (and its parent directory) if it doesn't
    /// exist and runs migrations.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
        }
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(options, MAX_CONNECTIONS).await
    }

    /// Connect to a throwaway in-memory database, gone once the pool closes.
    ///
    /// Not behind `#[cfg(test)]`: other crates build their test stores on it.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // Every connection to ":memory:" opens its own empty database, so the
        // pool must never grow past one.
        Self::new(options, 1).await
    }

    /// Options shared by file-backed and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Uploads read (dedup lookups) while other uploads write records.
            .journal_mode(SqliteJournalMode::Wal)
            // Files point at folders; a folder with children cannot go away.
            .foreign_keys(true)
            // A lost record after power failure is recovered by re-uploading:
            // the file itself was already fsynced by the storage writer.
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .auto_vacuum(SqliteAutoVacuum::None)
    }

    /// Per-connection settings that have no builder method.
    async fn tune(conn: &mut SqliteConnection) -> sqlx::Result<()> {
        // Records are small and mostly appended; checkpoint often enough
        // that the WAL stays a few megabytes, and keep hot pages of the
        // hash index in an 8 MiB cache.
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Bring the schema up to date. Already applied migrations are skipped.
    #[instrument(skip_all)]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// The underlying pool, for repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for every connection to come back, then close them all.
    pub async fn close(&self) {
        // Refresh planner statistics for the hash and folder-path indexes.
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
