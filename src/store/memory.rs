use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{RecordStore, Result};
use crate::models::{RequestLogEntry, User, WeatherSnapshot};

// Process-local store, used when no database file is configured
#[derive(Default)]
pub struct MemoryStore {
    next_user_id: AtomicI64,
    users: DashMap<String, User>, // api key -> user
    request_log: DashMap<i64, Vec<RequestLogEntry>>, // user id -> entries
    snapshots: DashMap<(String, String), Vec<WeatherSnapshot>>, // (city, country) -> history
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_enabled_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .get(api_key)
            .filter(|user| user.enabled)
            .map(|user| user.clone()))
    }

    async fn append_request_log(&self, user: &User, requested_on: DateTime<Utc>) -> Result<()> {
        self.request_log
            .entry(user.id)
            .or_default()
            .push(RequestLogEntry {
                user_id: user.id,
                requested_on,
            });
        Ok(())
    }

    async fn count_request_log_since(&self, user: &User, since: DateTime<Utc>) -> Result<u64> {
        let count = self
            .request_log
            .get(&user.id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.user_id == user.id && e.requested_on > since)
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn find_latest_snapshot(
        &self,
        city: &str,
        country: &str,
    ) -> Result<Option<WeatherSnapshot>> {
        let key = (city.to_string(), country.to_string());
        let latest = self.snapshots.get(&key).and_then(|history| {
            // max_by_key keeps the last maximum, so equal timestamps favour the newest insert
            history.iter().max_by_key(|s| s.updated_on).cloned()
        });
        Ok(latest)
    }

    async fn save_snapshot(&self, snapshot: &WeatherSnapshot) -> Result<()> {
        self.snapshots
            .entry((snapshot.city.clone(), snapshot.country.clone()))
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn add_user(&self, api_key: &str, enabled: bool) -> Result<User> {
        let user = self
            .users
            .entry(api_key.to_string())
            .or_insert_with(|| User {
                id: self.next_user_id.fetch_add(1, Ordering::Relaxed) + 1,
                api_key: api_key.to_string(),
                enabled,
            })
            .clone();
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, second).unwrap()
    }

    #[tokio::test]
    async fn disabled_users_are_not_found() {
        let store = MemoryStore::new();
        store.add_user("enabled-key", true).await.unwrap();
        store.add_user("disabled-key", false).await.unwrap();

        assert!(store.find_enabled_user_by_api_key("enabled-key").await.unwrap().is_some());
        assert!(store.find_enabled_user_by_api_key("disabled-key").await.unwrap().is_none());
        assert!(store.find_enabled_user_by_api_key("ENABLED-KEY").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_user_keeps_existing_record() {
        let store = MemoryStore::new();
        let first = store.add_user("key", false).await.unwrap();
        let second = store.add_user("key", true).await.unwrap();

        assert_eq!(first, second);
        assert!(!second.enabled);
    }

    #[tokio::test]
    async fn count_excludes_entries_at_window_start() {
        let store = MemoryStore::new();
        let user = store.add_user("key", true).await.unwrap();
        let other = store.add_user("other", true).await.unwrap();

        let since = at(0, 0);
        store.append_request_log(&user, since).await.unwrap();
        store.append_request_log(&user, since + Duration::seconds(1)).await.unwrap();
        store.append_request_log(&user, at(1, 0)).await.unwrap();
        store.append_request_log(&other, at(1, 0)).await.unwrap();

        assert_eq!(store.count_request_log_since(&user, since).await.unwrap(), 2);
        assert_eq!(store.count_request_log_since(&other, since).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn latest_snapshot_is_most_recent_for_exact_pair() {
        let store = MemoryStore::new();
        let snapshot = |description: &str, updated_on| WeatherSnapshot {
            city: "Melbourne".into(),
            country: "Australia".into(),
            description: description.into(),
            updated_on,
        };

        store.save_snapshot(&snapshot("Rain", at(5, 0))).await.unwrap();
        store.save_snapshot(&snapshot("Cloudy", at(1, 0))).await.unwrap();

        let latest = store.find_latest_snapshot("Melbourne", "Australia").await.unwrap();
        assert_eq!(latest.map(|s| s.description), Some("Rain".to_string()));

        assert!(store.find_latest_snapshot("melbourne", "Australia").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn equal_timestamps_favour_last_saved() {
        let store = MemoryStore::new();
        for description in ["Cloudy", "Clear", "Rain"] {
            store
                .save_snapshot(&WeatherSnapshot {
                    city: "Melbourne".into(),
                    country: "Australia".into(),
                    description: description.into(),
                    updated_on: at(3, 0),
                })
                .await
                .unwrap();
        }

        let latest = store
            .find_latest_snapshot("Melbourne", "Australia")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.description, "Rain");
    }
}
