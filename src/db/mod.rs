//! SQLite-backed relational store
//!
//! The [`Database`] owns an r2d2 connection pool. It is built once by the
//! entry point and handed to the pipeline as a [`ConnectionProvider`];
//! connections are borrowed per unit of work and returned to the pool when
//! the guard drops, on every exit path.

pub mod activity;
pub mod keys;
pub mod ledger;
pub mod schema;

pub use activity::{ActivityEntry, ActivityEvent, ActivitySink, ActivityStats, SqliteActivityLog};
pub use keys::KnownKeys;
pub use ledger::{StoredValidationError, UploadLog, UploadStatus};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;

use crate::core::error::DbResult;

/// Pool of SQLite connections
pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

/// A connection borrowed from the pool
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Abstract source of connections.
///
/// Lets the orchestrator run against a real pool or a test double.
pub trait ConnectionProvider: Send + Sync {
    /// Borrow a connection. It is released when the returned guard drops.
    fn connection(&self) -> DbResult<PooledConnection>;
}

/// Handle to the ETL database
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database and bootstrap its schema
    pub fn open(path: &Path, pool_size: u32) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        {
            let conn = pool.get()?;
            // Enable WAL mode for better concurrent access
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            schema::bootstrap(&conn)?;
        }

        tracing::debug!(path = %path.display(), pool_size, "database opened");

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Database file location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionProvider for Database {
    fn connection(&self) -> DbResult<PooledConnection> {
        Ok(self.pool.get()?)
    }
}
