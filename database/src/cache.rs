//! TTL-guarded snapshot of sorted leaderboard lists.
//!
//! A snapshot is built off to the side and swapped in whole, so readers
//! either see the previous complete snapshot or the new complete one. Only
//! one rebuild runs at a time; callers that queue behind it reuse its result.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::StoreError;

#[derive(Debug)]
pub struct Snapshot<K, E> {
    lists: HashMap<K, Vec<E>>,
    built_at: Instant,
}

impl<K: Eq + Hash, E: Clone> Snapshot<K, E> {
    pub fn new(lists: HashMap<K, Vec<E>>, built_at: Instant) -> Self {
        Self { lists, built_at }
    }

    pub fn list(&self, key: &K) -> &[E] {
        self.lists.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One page of a list; `page` is 1-based and 0 is read as 1.
    pub fn page(&self, key: &K, page: usize, page_size: usize) -> Vec<E> {
        let list = self.list(key);
        let start = page.max(1).saturating_sub(1).saturating_mul(page_size);
        let end = start.saturating_add(page_size).min(list.len());
        if start >= end {
            return Vec::new();
        }
        list[start..end].to_vec()
    }

    /// 1-based position of the first entry matching `pred`.
    pub fn position(&self, key: &K, pred: impl Fn(&E) -> bool) -> Option<usize> {
        self.list(key).iter().position(pred).map(|index| index + 1)
    }

    pub fn built_at(&self) -> Instant {
        self.built_at
    }
}

pub struct LeaderboardCache<K, E> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<Arc<Snapshot<K, E>>>>,
    rebuild_gate: Mutex<()>,
}

impl<K: Eq + Hash, E: Clone> LeaderboardCache<K, E> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            current: RwLock::new(None),
            rebuild_gate: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The current snapshot if it is younger than the TTL.
    pub fn fresh(&self) -> Option<Arc<Snapshot<K, E>>> {
        let current = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        current
            .as_ref()
            .filter(|snapshot| self.clock.now().duration_since(snapshot.built_at) < self.ttl)
            .cloned()
    }

    /// Return a fresh snapshot, running `build` to replace a stale one.
    pub async fn get_or_rebuild<F, Fut>(&self, build: F) -> Result<Arc<Snapshot<K, E>>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HashMap<K, Vec<E>>, StoreError>>,
    {
        if let Some(snapshot) = self.fresh() {
            return Ok(snapshot);
        }

        let _gate = self.rebuild_gate.lock().await;
        // Someone else may have rebuilt while we waited.
        if let Some(snapshot) = self.fresh() {
            return Ok(snapshot);
        }

        let started = self.clock.now();
        let lists = build().await?;
        let snapshot = Arc::new(Snapshot::new(lists, started));
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot.clone());
        tracing::debug!("Leaderboard snapshot rebuilt");
        Ok(snapshot)
    }

    /// Drop the snapshot so the next read rebuilds.
    pub fn invalidate(&self) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
