//! Connection pool and pragmas

use crate::error::{RepositoryError, Result};
use crate::migrations;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pooled SQLite handle
pub type SqlitePool = Pool<SqliteConnectionManager>;

/// Database location and pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub pool_size: u32,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("bridge.sqlite3"),
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

fn apply_pragmas(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(mode = %mode, "sqlite did not switch to WAL journal mode");
    }
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;",
    )
}

/// Open the pool and bring the schema up to date
///
/// # Errors
/// Returns `Unavailable` if the file cannot be opened, or a migration error
pub fn open_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| RepositoryError::Unavailable(format!("{}: {e}", parent.display())))?;
    }
    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(&config.path)
        .with_init(move |conn| apply_pragmas(conn, busy_timeout));
    let pool = Pool::builder()
        .max_size(config.pool_size.max(1))
        .connection_timeout(busy_timeout.max(Duration::from_secs(1)))
        .build(manager)?;

    let mut conn = pool.get()?;
    migrations::migrate_to_latest(&mut conn)?;
    tracing::info!(
        path = %config.path.display(),
        pool_size = config.pool_size,
        "database ready"
    );
    Ok(pool)
}

/// Run `f` with a pooled connection on the blocking thread pool
pub(crate) async fn with_connection<F, T>(pool: &SqlitePool, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

/// Run `f` in a transaction; commits on `Ok`, rolls back on drop otherwise
pub(crate) fn in_transaction<F, T>(
    conn: &mut Connection,
    behavior: TransactionBehavior,
    f: F,
) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(behavior)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
