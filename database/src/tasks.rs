//! Background helpers for the slow store operations.
//!
//! Reads run on a tokio task and hand their result to a callback, so the
//! caller never waits on a full scan or a multi-query rank lookup.

use std::sync::Arc;

use stats_types::{LeaderboardEntry, RankResult, StatKey};
use tokio::task::JoinHandle;

use crate::traits::{PurgeCutoff, StatsStore};

pub fn spawn_read_leaderboard<F>(
    store: Arc<dyn StatsStore>,
    stat: StatKey,
    page: usize,
    page_size: usize,
    callback: F,
) -> JoinHandle<()>
where
    F: FnOnce(Vec<LeaderboardEntry>) + Send + 'static,
{
    tokio::spawn(async move {
        let entries = store.read_leaderboard(stat, page, page_size).await;
        callback(entries);
    })
}

pub fn spawn_read_rank<F>(store: Arc<dyn StatsStore>, name: String, callback: F) -> JoinHandle<()>
where
    F: FnOnce(RankResult) + Send + 'static,
{
    tokio::spawn(async move {
        let ranks = store.read_rank(&name).await;
        callback(ranks);
    })
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeSummary {
    pub powerless: Vec<String>,
    pub old: Vec<String>,
}

impl PurgeSummary {
    pub fn total(&self) -> usize {
        self.powerless.len() + self.old.len()
    }
}

/// Purge powerless users, then users older than `cutoff` unless it is
/// disabled.
pub async fn run_user_purge(store: &dyn StatsStore, cutoff: PurgeCutoff) -> PurgeSummary {
    let powerless = store.purge_powerless().await;
    let old = match cutoff {
        PurgeCutoff::Disabled => Vec::new(),
        cutoff => store.purge_older_than(cutoff).await,
    };
    let summary = PurgeSummary { powerless, old };
    tracing::info!("User purge removed {} records", summary.total());
    summary
}

/// Copy every record from one store into another. Returns how many were
/// written.
pub async fn convert_users(from: &dyn StatsStore, to: &dyn StatsStore) -> usize {
    let names = from.stored_names().await;
    let mut converted = 0;
    for name in &names {
        match from.load_record(name, false).await {
            Ok(record) => {
                if to.save_record(&record).await {
                    converted += 1;
                } else {
                    tracing::warn!("Could not write {} to the target store", name);
                }
            }
            Err(err) => tracing::warn!("Skipping {} during conversion: {}", name, err),
        }
        if converted > 0 && converted % 1000 == 0 {
            tracing::info!("Converted {}/{} users", converted, names.len());
        }
    }
    tracing::info!("Converted {} of {} users", converted, names.len());
    converted
}
