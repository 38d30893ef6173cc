//! Record store: users, weather snapshots and the request log.
//!
//! The rate limiter and the cache policy hold no state of their own; every
//! read and write they make goes through [`RecordStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{User, WeatherSnapshot};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Store lock poisoned")]
    Poisoned,
    #[error("Invalid timestamp stored: {0}")]
    InvalidTimestamp(i64),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Exact match on the key, restricted to enabled users.
    async fn find_enabled_user_by_api_key(&self, api_key: &str) -> Result<Option<User>>;

    async fn append_request_log(&self, user: &User, requested_on: DateTime<Utc>) -> Result<()>;

    /// Number of log entries for `user` stamped strictly after `since`.
    async fn count_request_log_since(&self, user: &User, since: DateTime<Utc>) -> Result<u64>;

    /// Most recently updated snapshot for the pair. Ties go to the last one saved.
    async fn find_latest_snapshot(
        &self,
        city: &str,
        country: &str,
    ) -> Result<Option<WeatherSnapshot>>;

    /// Appends; earlier snapshots for the pair are kept.
    async fn save_snapshot(&self, snapshot: &WeatherSnapshot) -> Result<()>;

    /// Provisioning hook. Returns the existing user untouched if the key is taken.
    async fn add_user(&self, api_key: &str, enabled: bool) -> Result<User>;
}
