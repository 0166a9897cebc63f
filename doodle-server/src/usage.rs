use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::sync::Mutex;

/// Key-value counter used for the daily stylization allowance.
#[async_trait]
pub trait UsageCounter: Send + Sync {
    /// Current value, zero when absent or expired.
    async fn get(&self, key: &str) -> anyhow::Result<u64>;
    /// Increment and return the new value.
    async fn incr(&self, key: &str) -> anyhow::Result<u64>;
    /// Drop `key` once `at` has passed.
    async fn expire_at(&self, key: &str, at: DateTime<Utc>) -> anyhow::Result<()>;
}

/// Counter key for the UTC day containing `now`.
pub fn day_key(now: DateTime<Utc>) -> String {
    format!("stylize:{}", now.format("%Y-%m-%d"))
}

/// Start of the UTC day after `now`.
pub fn end_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let next = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(now.date_naive());
    next.and_time(NaiveTime::MIN).and_utc()
}

/// Remaining allowance reported by `GET /limit-status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct LimitStatus {
    /// Stylizations still allowed today.
    pub remaining: u64,
    /// Daily ceiling.
    pub limit: u64,
    /// Stylizations used today.
    pub used: u64,
}

impl LimitStatus {
    /// Status for `used` out of `limit`.
    pub fn new(used: u64, limit: u64) -> Self {
        Self {
            remaining: limit.saturating_sub(used),
            limit,
            used,
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: u64,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Process-local [`UsageCounter`].
#[derive(Debug, Default)]
pub struct InMemoryUsageCounter {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryUsageCounter {
    /// Empty counter.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageCounter for InMemoryUsageCounter {
    async fn get(&self, key: &str) -> anyhow::Result<u64> {
        let now = Utc::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map_or(0, |e| e.value))
    }

    async fn incr(&self, key: &str) -> anyhow::Result<u64> {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        // Earlier days' keys are dead once their expiry passes.
        entries.retain(|_, e| e.is_live(now));
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });
        entry.value += 1;
        Ok(entry.value)
    }

    async fn expire_at(&self, key: &str, at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(entry) = self.entries.lock().await.get_mut(key) {
            entry.expires_at = Some(at);
        }
        Ok(())
    }
}
