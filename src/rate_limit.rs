use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::metrics::{RATE_LIMITED, REQUEST_TOTAL};
use crate::models::{User, WeatherQuery};
use crate::state::AppState;
use crate::store::RecordStore;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Sliding-window quota backed by the request log in the record store.
///
/// The current call is logged before the window is counted, so it counts
/// against its own quota. Concurrent calls for one key may each miss the
/// other's entry; the quota is advisory.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RecordStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RecordStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub async fn check_and_record(
        &self,
        api_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<User, AppError> {
        let Some(api_key) = api_key else {
            return Err(AppError::InvalidCredential);
        };
        let user = self
            .store
            .find_enabled_user_by_api_key(api_key)
            .await?
            .ok_or(AppError::InvalidCredential)?;

        self.store.append_request_log(&user, now).await?;

        let window_start = now - self.config.window();
        let total = self.store.count_request_log_since(&user, window_start).await?;
        if total >= u64::from(self.config.max_requests) {
            RATE_LIMITED.inc();
            tracing::warn!(user_id = user.id, total, "Rate limit exceeded");
            return Err(AppError::QuotaExceeded {
                max_requests: self.config.max_requests,
                window_minutes: self.config.window_minutes,
            });
        }

        Ok(user)
    }
}

// Middleware in front of the weather route. Malformed queries are turned
// away before anything is logged, so they never use up the quota.
pub async fn enforce(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    REQUEST_TOTAL.inc();

    if let Err(rejection) = Query::<WeatherQuery>::try_from_uri(req.uri()) {
        return AppError::BadRequest(rejection.body_text()).into_response();
    }

    let api_key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let checked = state
        .rate_limiter
        .check_and_record(api_key.as_deref(), Utc::now())
        .await;
    match checked {
        Ok(user) => {
            tracing::debug!(user_id = user.id, "Request accepted");
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::models::WeatherSnapshot;
    use crate::store::{MemoryStore, StoreError};

    const LIMIT: RateLimitConfig = RateLimitConfig {
        max_requests: 5,
        window_minutes: 2,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    // Store double reporting a fixed window count, like a mocked repository
    struct FixedCountStore {
        user: Option<User>,
        window_count: u64,
        appended: Mutex<Vec<DateTime<Utc>>>,
        count_since: Mutex<Option<DateTime<Utc>>>,
    }

    impl FixedCountStore {
        fn new(user: Option<User>, window_count: u64) -> Arc<Self> {
            Arc::new(Self {
                user,
                window_count,
                appended: Mutex::new(Vec::new()),
                count_since: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl RecordStore for FixedCountStore {
        async fn find_enabled_user_by_api_key(
            &self,
            api_key: &str,
        ) -> Result<Option<User>, StoreError> {
            Ok(self
                .user
                .clone()
                .filter(|u| u.enabled && u.api_key == api_key))
        }

        async fn append_request_log(
            &self,
            _user: &User,
            requested_on: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.appended.lock().unwrap().push(requested_on);
            Ok(())
        }

        async fn count_request_log_since(
            &self,
            _user: &User,
            since: DateTime<Utc>,
        ) -> Result<u64, StoreError> {
            *self.count_since.lock().unwrap() = Some(since);
            Ok(self.window_count)
        }

        async fn find_latest_snapshot(
            &self,
            _city: &str,
            _country: &str,
        ) -> Result<Option<WeatherSnapshot>, StoreError> {
            Ok(None)
        }

        async fn save_snapshot(&self, _snapshot: &WeatherSnapshot) -> Result<(), StoreError> {
            Ok(())
        }

        async fn add_user(&self, _api_key: &str, _enabled: bool) -> Result<User, StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    fn user(enabled: bool) -> User {
        User {
            id: 1,
            api_key: "123456789".into(),
            enabled,
        }
    }

    #[tokio::test]
    async fn allows_when_window_count_below_max() {
        let store = FixedCountStore::new(Some(user(true)), 4);
        let limiter = RateLimiter::new(store.clone(), LIMIT);

        let accepted = limiter.check_and_record(Some("123456789"), now()).await.unwrap();

        assert_eq!(accepted, user(true));
        assert_eq!(store.appended.lock().unwrap().as_slice(), &[now()]);
        assert_eq!(
            *store.count_since.lock().unwrap(),
            Some(now() - Duration::minutes(2))
        );
    }

    #[tokio::test]
    async fn rejects_when_window_count_reaches_max() {
        let store = FixedCountStore::new(Some(user(true)), 5);
        let limiter = RateLimiter::new(store.clone(), LIMIT);

        let err = limiter
            .check_and_record(Some("123456789"), now())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Maximum 5 requests per 2 minutes");
        // The rejected attempt is still on record
        assert_eq!(store.appended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_or_missing_key_short_circuits() {
        let store = FixedCountStore::new(Some(user(true)), 0);
        let limiter = RateLimiter::new(store.clone(), LIMIT);

        for key in [Some("nope"), None] {
            let err = limiter.check_and_record(key, now()).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCredential));
        }
        assert!(store.appended.lock().unwrap().is_empty());
        assert!(store.count_since.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn disabled_user_is_invalid_credential() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("123456789", false).await.unwrap();
        let limiter = RateLimiter::new(store.clone(), LIMIT);

        let err = limiter
            .check_and_record(Some("123456789"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential));
    }

    #[tokio::test]
    async fn current_call_counts_toward_its_own_quota() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("123456789", true).await.unwrap();
        for seconds in [10, 20, 30] {
            store
                .append_request_log(&user, now() - Duration::seconds(seconds))
                .await
                .unwrap();
        }
        let limiter = RateLimiter::new(store.clone(), LIMIT);

        // 3 earlier + this one = 4 < 5
        limiter.check_and_record(Some("123456789"), now()).await.unwrap();
        // 4 earlier + this one = 5
        let err = limiter
            .check_and_record(Some("123456789"), now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::QuotaExceeded {
                max_requests: 5,
                window_minutes: 2
            }
        ));
        assert_eq!(
            store
                .count_request_log_since(&user, now() - Duration::minutes(2))
                .await
                .unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn entry_exactly_at_window_start_is_not_counted() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("123456789", true).await.unwrap();
        let window_start = now() - Duration::minutes(2);
        for _ in 0..4 {
            store.append_request_log(&user, window_start).await.unwrap();
        }
        store
            .append_request_log(&user, window_start + Duration::seconds(1))
            .await
            .unwrap();
        let limiter = RateLimiter::new(store.clone(), LIMIT);

        // Only the entry one second inside the window plus this call are counted
        limiter.check_and_record(Some("123456789"), now()).await.unwrap();
    }
}
