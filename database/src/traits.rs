use std::time::Duration;

use async_trait::async_trait;
use stats_types::{LeaderboardEntry, PlayerRecord, RankResult, StatKey};

use crate::error::StoreError;

/// How long a player may stay away before their record is purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeCutoff {
    Disabled,
    OlderThan(Duration),
}

impl PurgeCutoff {
    /// Length of a purge month in seconds.
    pub const MONTH_SECS: u64 = 2_630_000;

    /// Negative month counts disable purging.
    pub fn months(months: i64) -> Self {
        match u64::try_from(months) {
            Ok(months) => {
                PurgeCutoff::OlderThan(Duration::from_secs(months.saturating_mul(Self::MONTH_SECS)))
            }
            Err(_) => PurgeCutoff::Disabled,
        }
    }

    /// Oldest `last_login` that survives a purge run at `now` (epoch
    /// seconds). Records logged in strictly before it are purged.
    pub fn threshold(self, now: i64) -> Option<i64> {
        match self {
            PurgeCutoff::Disabled => None,
            PurgeCutoff::OlderThan(age) => {
                let age = i64::try_from(age.as_secs()).unwrap_or(i64::MAX);
                Some(now.saturating_sub(age))
            }
        }
    }
}

/// The persistence contract shared by every backend.
///
/// Only `load_record` reports errors. Every other operation absorbs backend
/// trouble: it is logged and the caller gets an empty, `false` or unranked
/// result.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Load a record by name (case-insensitive). With `create` an absent
    /// record is created zero-valued, persisted and returned.
    async fn load_record(&self, name: &str, create: bool) -> Result<PlayerRecord, StoreError>;

    /// Overwrite the whole stored record, inserting it if absent.
    async fn save_record(&self, record: &PlayerRecord) -> bool;

    /// Store a fresh zero-valued record. An existing name is logged and
    /// left untouched.
    async fn create_record(&self, name: &str);

    async fn remove_record(&self, name: &str) -> bool;

    /// One 1-based page of a leaderboard. Out-of-range pages are empty.
    async fn read_leaderboard(
        &self,
        stat: StatKey,
        page: usize,
        page_size: usize,
    ) -> Vec<LeaderboardEntry>;

    async fn read_rank(&self, name: &str) -> RankResult;

    /// Delete every record whose levels are all zero, returning the names.
    async fn purge_powerless(&self) -> Vec<String>;

    async fn purge_older_than(&self, cutoff: PurgeCutoff) -> Vec<String>;

    async fn health_check(&self) -> bool;

    async fn stored_names(&self) -> Vec<String>;
}
