//! Shared SQLite handle.
//!
//! One connection per process, guarded by a mutex and driven from the
//! blocking pool. Every multi-statement change runs in a transaction while
//! holding the lock, so readers never see a half-applied write.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{StoreError, StoreResult};

const SCHEMA_VERSION: i32 = 2;

/// Cloneable handle to the weather database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        tracing::debug!("Opened weather database at {}", path.display());
        Self::from_connection(conn)
    }

    /// In-memory database (tests, ephemeral runs).
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// Once started, `f` runs to completion even if the returned future is
    /// dropped, so a cancelled caller cannot leave a partial write behind.
    pub async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?
        .unwrap_or(0);

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS places (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            is_primary INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS weather_now (
            place_id TEXT PRIMARY KEY REFERENCES places(id) ON DELETE CASCADE,
            temp_c REAL NOT NULL,
            condition TEXT NOT NULL,
            icon TEXT NOT NULL,
            humidity INTEGER NOT NULL,
            wind_kph REAL NOT NULL,
            feels_like_c REAL NOT NULL,
            dt INTEGER NOT NULL,
            cached_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS weather_hourly (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            place_id TEXT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
            dt INTEGER NOT NULL,
            temp_c REAL NOT NULL,
            icon TEXT NOT NULL,
            precip_mm REAL NOT NULL,
            cached_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS weather_daily (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            place_id TEXT NOT NULL REFERENCES places(id) ON DELETE CASCADE,
            dt INTEGER NOT NULL,
            min_c REAL NOT NULL,
            max_c REAL NOT NULL,
            icon TEXT NOT NULL,
            cached_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS app_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_places_single_primary
            ON places(is_primary) WHERE is_primary = 1;
        CREATE INDEX IF NOT EXISTS idx_weather_hourly_place_dt ON weather_hourly(place_id, dt);
        CREATE INDEX IF NOT EXISTS idx_weather_daily_place_dt ON weather_daily(place_id, dt);
        "#,
    )?;

    if version < SCHEMA_VERSION {
        conn.execute("DELETE FROM schema_version", [])?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        tracing::info!("Initialized weather database schema v{}", SCHEMA_VERSION);
    }

    Ok(())
}
