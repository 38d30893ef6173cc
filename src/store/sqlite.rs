//! SQLite-backed record store.
//!
//! Timestamps are stored as UTC microseconds since the epoch so window and
//! freshness comparisons stay numeric.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::{RecordStore, Result, StoreError};
use crate::models::{User, WeatherSnapshot};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        api_key     TEXT NOT NULL UNIQUE,
        enabled     INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS weather (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        city        TEXT NOT NULL,
        country     TEXT NOT NULL,
        description TEXT NOT NULL,
        updated_on  INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_weather_pair ON weather(city, country, updated_on);

    CREATE TABLE IF NOT EXISTS weather_requests (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id      INTEGER NOT NULL REFERENCES users(id),
        requested_on INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_requests_user_ts ON weather_requests(user_id, requested_on);
";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // Runs `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&*guard)
        })
        .await?
    }
}

fn from_micros(value: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(value).ok_or(StoreError::InvalidTimestamp(value))
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_enabled_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        let api_key = api_key.to_string();
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, api_key, enabled FROM users \
                     WHERE api_key = ?1 AND enabled = 1 LIMIT 1",
                    params![api_key],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            api_key: row.get(1)?,
                            enabled: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn append_request_log(&self, user: &User, requested_on: DateTime<Utc>) -> Result<()> {
        let user_id = user.id;
        let requested_on = requested_on.timestamp_micros();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO weather_requests (user_id, requested_on) VALUES (?1, ?2)",
                params![user_id, requested_on],
            )?;
            Ok(())
        })
        .await
    }

    async fn count_request_log_since(&self, user: &User, since: DateTime<Utc>) -> Result<u64> {
        let user_id = user.id;
        let since = since.timestamp_micros();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM weather_requests WHERE user_id = ?1 AND requested_on > ?2",
                params![user_id, since],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn find_latest_snapshot(
        &self,
        city: &str,
        country: &str,
    ) -> Result<Option<WeatherSnapshot>> {
        let city = city.to_string();
        let country = country.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT city, country, description, updated_on FROM weather \
                     WHERE city = ?1 AND country = ?2 \
                     ORDER BY updated_on DESC, id DESC LIMIT 1",
                    params![city, country],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|(city, country, description, updated_on)| -> Result<WeatherSnapshot> {
                Ok(WeatherSnapshot {
                    city,
                    country,
                    description,
                    updated_on: from_micros(updated_on)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn save_snapshot(&self, snapshot: &WeatherSnapshot) -> Result<()> {
        let snapshot = snapshot.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO weather (city, country, description, updated_on) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    snapshot.city,
                    snapshot.country,
                    snapshot.description,
                    snapshot.updated_on.timestamp_micros()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn add_user(&self, api_key: &str, enabled: bool) -> Result<User> {
        let api_key = api_key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (api_key, enabled) VALUES (?1, ?2)",
                params![api_key, enabled],
            )?;
            let user = conn.query_row(
                "SELECT id, api_key, enabled FROM users WHERE api_key = ?1",
                params![api_key],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        api_key: row.get(1)?,
                        enabled: row.get(2)?,
                    })
                },
            )?;
            Ok(user)
        })
        .await
    }
}
