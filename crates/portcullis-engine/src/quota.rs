//! API-key quota enforcer (spec §4.6): per-minute rate limiting, per-IP
//! concurrency, and daily/monthly/lifetime request and cost ceilings.
//!
//! Applied per downstream request, after API-key validation and before
//! dispatch. `ConcurrencySlotCounter` and `RateWindow` are the two
//! in-memory maps named in the data model; everything else is DB-backed
//! aggregation via [`portcullis_storage::Storage`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tokio::sync::Mutex;

use portcullis_common::QuotaCeilings;
use portcullis_storage::{Storage, UsageAggregateFilter};

const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDenialReason {
    Expired,
    ConcurrencyCeiling,
    RateCeiling,
    DailyRequestCeiling,
    MonthlyRequestCeiling,
    LifetimeRequestCeiling,
    DailyCostCeiling,
    MonthlyCostCeiling,
    LifetimeCostCeiling,
}

impl QuotaDenialReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expired => "key_expired",
            Self::ConcurrencyCeiling => "concurrency_ceiling",
            Self::RateCeiling => "rate_ceiling",
            Self::DailyRequestCeiling => "daily_request_ceiling",
            Self::MonthlyRequestCeiling => "monthly_request_ceiling",
            Self::LifetimeRequestCeiling => "lifetime_request_ceiling",
            Self::DailyCostCeiling => "daily_cost_ceiling",
            Self::MonthlyCostCeiling => "monthly_cost_ceiling",
            Self::LifetimeCostCeiling => "lifetime_cost_ceiling",
        }
    }
}

/// `(api-key-id, client-ip) -> in-flight count`.
#[derive(Default)]
struct ConcurrencySlotCounter {
    slots: HashMap<(i64, String), i64>,
}

/// `api-key-id -> request timestamps within the last 60s`.
#[derive(Default)]
struct RateWindow {
    windows: HashMap<i64, VecDeque<Instant>>,
}

pub struct QuotaEnforcer {
    storage: Arc<dyn Storage>,
    concurrency: Mutex<ConcurrencySlotCounter>,
    rate: Mutex<RateWindow>,
}

/// Held for the lifetime of one downstream request. Releasing the slot is
/// the caller's responsibility via `release`; `Drop` also releases as a
/// backstop so a forgotten guard cannot leak a slot forever.
pub struct ConcurrencyGuard {
    enforcer: Arc<QuotaEnforcer>,
    key: (i64, String),
    released: bool,
}

impl ConcurrencyGuard {
    pub async fn release(mut self) {
        self.release_inner().await;
    }

    async fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut guard = self.enforcer.concurrency.lock().await;
        if let Some(count) = guard.slots.get_mut(&self.key) {
            *count -= 1;
            if *count <= 0 {
                guard.slots.remove(&self.key);
            }
        }
    }
}

impl Drop for ConcurrencyGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let enforcer = self.enforcer.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            let mut guard = enforcer.concurrency.lock().await;
            if let Some(count) = guard.slots.get_mut(&key) {
                *count -= 1;
                if *count <= 0 {
                    guard.slots.remove(&key);
                }
            }
        });
    }
}

impl QuotaEnforcer {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            concurrency: Mutex::new(ConcurrencySlotCounter::default()),
            rate: Mutex::new(RateWindow::default()),
        }
    }

    /// Runs the §4.6 check chain in order, short-circuiting on the first
    /// failure. On success, returns the concurrency slot guard (if a
    /// concurrency ceiling applies) that the caller must release exactly
    /// once when the request completes.
    pub async fn admit(
        self: &Arc<Self>,
        user_key_id: i64,
        client_ip: Option<&str>,
        created_at: OffsetDateTime,
        ceilings: &QuotaCeilings,
    ) -> Result<Option<ConcurrencyGuard>, QuotaDenialReason> {
        // 1. Expiry.
        if let Some(validity_days) = ceilings.validity_days
            && validity_days > 0
        {
            let deadline = created_at + time::Duration::days(validity_days);
            if OffsetDateTime::now_utc() > deadline {
                return Err(QuotaDenialReason::Expired);
            }
        }

        // 2. Concurrency.
        let guard = if let Some(ceiling) = ceilings.per_ip_concurrency_ceiling
            && ceiling > 0
        {
            let ip = client_ip.unwrap_or("unknown").to_string();
            let key = (user_key_id, ip);
            let mut slots = self.concurrency.lock().await;
            let count = slots.slots.entry(key.clone()).or_insert(0);
            if *count >= ceiling {
                return Err(QuotaDenialReason::ConcurrencyCeiling);
            }
            *count += 1;
            drop(slots);
            Some(ConcurrencyGuard {
                enforcer: self.clone(),
                key,
                released: false,
            })
        } else {
            None
        };

        // 3. Rate.
        if let Some(ceiling) = ceilings.per_minute_ceiling
            && ceiling > 0
        {
            let mut rate = self.rate.lock().await;
            let window = rate.windows.entry(user_key_id).or_default();
            let now = Instant::now();
            while let Some(front) = window.front() {
                if now.duration_since(*front) > RATE_WINDOW {
                    window.pop_front();
                } else {
                    break;
                }
            }
            if window.len() as i64 >= ceiling {
                drop(rate);
                self.release_concurrency(guard).await;
                return Err(QuotaDenialReason::RateCeiling);
            }
            window.push_back(now);
        }

        // 4. Request ceilings (daily/monthly/lifetime), cheapest-DB-check first.
        let now = OffsetDateTime::now_utc();
        if let Some(ceiling) = ceilings.daily_request_ceiling
            && ceiling > 0
        {
            let since = now - time::Duration::hours(24);
            if self.count_since(user_key_id, since).await >= ceiling {
                self.release_concurrency(guard).await;
                return Err(QuotaDenialReason::DailyRequestCeiling);
            }
        }
        if let Some(ceiling) = ceilings.monthly_request_ceiling
            && ceiling > 0
        {
            let since = now - time::Duration::days(30);
            if self.count_since(user_key_id, since).await >= ceiling {
                self.release_concurrency(guard).await;
                return Err(QuotaDenialReason::MonthlyRequestCeiling);
            }
        }
        if let Some(ceiling) = ceilings.lifetime_request_ceiling
            && ceiling > 0
        {
            let since = created_at;
            if self.count_since(user_key_id, since).await >= ceiling {
                self.release_concurrency(guard).await;
                return Err(QuotaDenialReason::LifetimeRequestCeiling);
            }
        }

        // 5. Cost ceilings.
        if let Some(ceiling) = ceilings.daily_cost_ceiling
            && ceiling > 0.0
        {
            let since = now - time::Duration::hours(24);
            if self.cost_since(user_key_id, since, now).await >= ceiling {
                self.release_concurrency(guard).await;
                return Err(QuotaDenialReason::DailyCostCeiling);
            }
        }
        if let Some(ceiling) = ceilings.monthly_cost_ceiling
            && ceiling > 0.0
        {
            let since = now - time::Duration::days(30);
            if self.cost_since(user_key_id, since, now).await >= ceiling {
                self.release_concurrency(guard).await;
                return Err(QuotaDenialReason::MonthlyCostCeiling);
            }
        }
        if let Some(ceiling) = ceilings.lifetime_cost_ceiling
            && ceiling > 0.0
        {
            if self.cost_since(user_key_id, created_at, now).await >= ceiling {
                self.release_concurrency(guard).await;
                return Err(QuotaDenialReason::LifetimeCostCeiling);
            }
        }

        Ok(guard)
    }

    async fn release_concurrency(&self, guard: Option<ConcurrencyGuard>) {
        if let Some(mut guard) = guard {
            guard.release_inner().await;
        }
    }

    async fn count_since(&self, user_key_id: i64, since: OffsetDateTime) -> i64 {
        self.storage
            .count_downstream_requests(user_key_id, since)
            .await
            .unwrap_or(0)
    }

    async fn cost_since(&self, user_key_id: i64, since: OffsetDateTime, to: OffsetDateTime) -> f64 {
        let by_model = self
            .storage
            .aggregate_usage_by_model(user_key_id, since, to)
            .await
            .unwrap_or_default();
        by_model
            .into_iter()
            .map(|row| {
                portcullis_storage::pricing::cost_usd(
                    &row.model,
                    row.aggregate.input_tokens,
                    row.aggregate.output_tokens,
                    row.aggregate.cache_read_input_tokens,
                    row.aggregate.cache_creation_input_tokens,
                )
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_storage::{
        LogQueryFilter, LogQueryResult, ModelUsageAggregate, StorageResult, UsageAggregate,
    };

    struct FakeStorage {
        request_count: i64,
        usage: Vec<ModelUsageAggregate>,
    }

    #[async_trait::async_trait]
    impl Storage for FakeStorage {
        async fn sync(&self) -> StorageResult<()> {
            Ok(())
        }
        async fn load_global_config(
            &self,
        ) -> StorageResult<Option<portcullis_storage::GlobalConfigRow>> {
            Ok(None)
        }
        async fn upsert_global_config(
            &self,
            _config: &portcullis_common::GlobalConfig,
        ) -> StorageResult<()> {
            Ok(())
        }
        async fn load_snapshot(&self) -> StorageResult<portcullis_storage::StorageSnapshot> {
            unimplemented!()
        }
        async fn upsert_provider(
            &self,
            _name: &str,
            _config_json: &serde_json::Value,
            _enabled: bool,
        ) -> StorageResult<i64> {
            unimplemented!()
        }
        async fn delete_provider(&self, _name: &str) -> StorageResult<()> {
            unimplemented!()
        }
        async fn insert_credential(
            &self,
            _provider_name: &str,
            _name: Option<&str>,
            _settings_json: &serde_json::Value,
            _secret_json: &serde_json::Value,
            _enabled: bool,
        ) -> StorageResult<i64> {
            unimplemented!()
        }
        async fn update_credential(
            &self,
            _credential_id: i64,
            _name: Option<&str>,
            _settings_json: &serde_json::Value,
            _secret_json: &serde_json::Value,
        ) -> StorageResult<()> {
            unimplemented!()
        }
        async fn set_credential_enabled(&self, _id: i64, _enabled: bool) -> StorageResult<()> {
            unimplemented!()
        }
        async fn delete_credential(&self, _id: i64) -> StorageResult<()> {
            unimplemented!()
        }
        async fn upsert_user_by_id(
            &self,
            _user_id: i64,
            _name: &str,
            _enabled: bool,
        ) -> StorageResult<()> {
            unimplemented!()
        }
        async fn set_user_enabled(&self, _user_id: i64, _enabled: bool) -> StorageResult<()> {
            unimplemented!()
        }
        async fn delete_user(&self, _user_id: i64) -> StorageResult<()> {
            unimplemented!()
        }
        async fn insert_user_key(
            &self,
            _user_id: i64,
            _api_key: &str,
            _key_prefix: Option<&str>,
            _label: Option<&str>,
            _enabled: bool,
            _ceilings: QuotaCeilings,
        ) -> StorageResult<i64> {
            unimplemented!()
        }
        async fn set_user_key_ceilings(
            &self,
            _user_key_id: i64,
            _ceilings: QuotaCeilings,
        ) -> StorageResult<()> {
            unimplemented!()
        }
        async fn set_user_key_enabled(&self, _id: i64, _enabled: bool) -> StorageResult<()> {
            unimplemented!()
        }
        async fn update_user_key_label(
            &self,
            _id: i64,
            _label: Option<&str>,
        ) -> StorageResult<()> {
            unimplemented!()
        }
        async fn delete_user_key(&self, _id: i64) -> StorageResult<()> {
            unimplemented!()
        }
        async fn append_event(&self, _event: &portcullis_core::Event) -> StorageResult<()> {
            Ok(())
        }
        async fn aggregate_usage_tokens(
            &self,
            _filter: UsageAggregateFilter,
        ) -> StorageResult<UsageAggregate> {
            unimplemented!()
        }
        async fn aggregate_usage_by_model(
            &self,
            _user_key_id: i64,
            _from: OffsetDateTime,
            _to: OffsetDateTime,
        ) -> StorageResult<Vec<ModelUsageAggregate>> {
            Ok(self.usage.clone())
        }
        async fn count_downstream_requests(
            &self,
            _user_key_id: i64,
            _since: OffsetDateTime,
        ) -> StorageResult<i64> {
            Ok(self.request_count)
        }
        async fn query_logs(&self, _filter: LogQueryFilter) -> StorageResult<LogQueryResult> {
            unimplemented!()
        }
        async fn delete_logs_older_than(&self, _cutoff: OffsetDateTime) -> StorageResult<u64> {
            unimplemented!()
        }
    }

    fn storage(request_count: i64, usage: Vec<ModelUsageAggregate>) -> Arc<dyn Storage> {
        Arc::new(FakeStorage {
            request_count,
            usage,
        })
    }

    #[tokio::test]
    async fn denies_on_concurrency_before_checking_daily_ceiling() {
        // Reproduces the "quota denial ordering" scenario: concurrencyCeiling=1 with
        // one slot already in flight, dailyLimit=10 with only 5 used so far. The
        // concurrency check must fire first even though the daily ceiling would pass.
        let enforcer = Arc::new(QuotaEnforcer::new(storage(5, Vec::new())));
        let ceilings = QuotaCeilings {
            per_ip_concurrency_ceiling: Some(1),
            daily_request_ceiling: Some(10),
            ..Default::default()
        };
        let created_at = OffsetDateTime::now_utc() - time::Duration::days(1);

        let first = enforcer
            .admit(1, Some("1.2.3.4"), created_at, &ceilings)
            .await
            .expect("first request admitted");
        assert!(first.is_some());

        let second = enforcer.admit(1, Some("1.2.3.4"), created_at, &ceilings).await;
        assert_eq!(second.unwrap_err(), QuotaDenialReason::ConcurrencyCeiling);
    }

    #[tokio::test]
    async fn releasing_guard_frees_the_slot() {
        let enforcer = Arc::new(QuotaEnforcer::new(storage(0, Vec::new())));
        let ceilings = QuotaCeilings {
            per_ip_concurrency_ceiling: Some(1),
            ..Default::default()
        };
        let created_at = OffsetDateTime::now_utc();

        let guard = enforcer
            .admit(7, Some("5.6.7.8"), created_at, &ceilings)
            .await
            .unwrap()
            .unwrap();
        guard.release().await;

        let second = enforcer
            .admit(7, Some("5.6.7.8"), created_at, &ceilings)
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn rejects_expired_key() {
        let enforcer = Arc::new(QuotaEnforcer::new(storage(0, Vec::new())));
        let ceilings = QuotaCeilings {
            validity_days: Some(1),
            ..Default::default()
        };
        let created_at = OffsetDateTime::now_utc() - time::Duration::days(2);

        let result = enforcer.admit(3, None, created_at, &ceilings).await;
        assert_eq!(result.unwrap_err(), QuotaDenialReason::Expired);
    }

    #[tokio::test]
    async fn rejects_on_cost_ceiling() {
        let usage = vec![ModelUsageAggregate {
            model: "claude-opus-4-20250514".to_string(),
            aggregate: UsageAggregate {
                matched_rows: 1,
                input_tokens: 1_000_000,
                output_tokens: 0,
                cache_read_input_tokens: 0,
                cache_creation_input_tokens: 0,
                total_tokens: 1_000_000,
            },
        }];
        let enforcer = Arc::new(QuotaEnforcer::new(storage(0, usage)));
        let ceilings = QuotaCeilings {
            daily_cost_ceiling: Some(1.0),
            ..Default::default()
        };
        let created_at = OffsetDateTime::now_utc();

        let result = enforcer.admit(9, None, created_at, &ceilings).await;
        assert_eq!(result.unwrap_err(), QuotaDenialReason::DailyCostCeiling);
    }
}
