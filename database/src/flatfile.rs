//! Store backed by one colon-delimited text file, one player per line.
//!
//! Every mutation is a read-modify-write of the whole file, serialized by a
//! per-store lock and committed with a rename so readers never see a
//! partially written file. Leaderboards and ranks come from a
//! [`LeaderboardCache`] rebuilt from a full scan once its TTL runs out.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stats_types::{LeaderboardEntry, MobHealthbarType, PlayerRecord, RankResult, StatKey};
use tokio::sync::Mutex;

use crate::cache::LeaderboardCache;
use crate::clock::{epoch_seconds, Clock};
use crate::codec::{line_name, RecordCodec};
use crate::error::StoreError;
use crate::hooks::StoreHooks;
use crate::traits::{PurgeCutoff, StatsStore};

pub struct FlatfileStore {
    path: PathBuf,
    codec: RecordCodec,
    file_lock: Mutex<()>,
    cache: LeaderboardCache<StatKey, LeaderboardEntry>,
    hooks: Arc<dyn StoreHooks>,
}

impl FlatfileStore {
    pub fn new(
        path: impl Into<PathBuf>,
        mob_healthbar_default: MobHealthbarType,
        leaderboard_ttl: Duration,
        clock: Arc<dyn Clock>,
        hooks: Arc<dyn StoreHooks>,
    ) -> Self {
        Self {
            path: path.into(),
            codec: RecordCodec::new(mob_healthbar_default),
            file_lock: Mutex::new(()),
            cache: LeaderboardCache::new(leaderboard_ttl, clock),
            hooks,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_contents(&self) -> Result<String, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_lines(&self, lines: &[String]) -> Result<(), StoreError> {
        let mut contents = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            contents.push_str(line);
            contents.push('\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        tokio::fs::write(&temp_path, contents.as_bytes())
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {e}", temp_path.display())))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }

    fn split_lines(contents: &str) -> Vec<String> {
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    fn find_record(&self, contents: &str, name: &str) -> Result<Option<PlayerRecord>, StoreError> {
        let Some(line) = contents
            .lines()
            .find(|line| line_name(line).is_some_and(|n| n.eq_ignore_ascii_case(name)))
        else {
            return Ok(None);
        };
        self.codec
            .decode(line)
            .map(Some)
            .map_err(|e| StoreError::MalformedRecord(format!("{name}: {e}")))
    }

    /// Append a new record under the lock unless one already exists, in
    /// which case the stored one is returned instead.
    async fn insert_new(&self, name: &str) -> Result<(PlayerRecord, bool), StoreError> {
        let _guard = self.file_lock.lock().await;
        let contents = self.read_contents().await?;
        if let Some(existing) = self.find_record(&contents, name)? {
            return Ok((existing, false));
        }

        let record = PlayerRecord::new(name, self.codec.mob_healthbar_default(), epoch_seconds());
        let mut lines = Self::split_lines(&contents);
        lines.push(self.codec.encode(&record));
        self.write_lines(&lines).await?;
        Ok((record, true))
    }

    async fn try_load(&self, name: &str, create: bool) -> Result<PlayerRecord, StoreError> {
        let contents = self.read_contents().await?;
        if let Some(record) = self.find_record(&contents, name)? {
            return Ok(record);
        }
        if !create {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let (record, _) = self.insert_new(name).await?;
        Ok(record)
    }

    async fn try_save(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        let _guard = self.file_lock.lock().await;
        let contents = self.read_contents().await?;
        let encoded = self.codec.encode(record);

        let mut replaced = false;
        let mut lines = Vec::new();
        for line in Self::split_lines(&contents) {
            let matches = line_name(&line).is_some_and(|n| n.eq_ignore_ascii_case(&record.name));
            if !matches {
                lines.push(line);
            } else if !replaced {
                lines.push(encoded.clone());
                replaced = true;
            } else {
                tracing::warn!("Dropping duplicate line for {}", record.name);
            }
        }
        if !replaced {
            lines.push(encoded);
        }
        self.write_lines(&lines).await
    }

    async fn try_remove(&self, name: &str) -> Result<bool, StoreError> {
        let _guard = self.file_lock.lock().await;
        let contents = self.read_contents().await?;
        let lines = Self::split_lines(&contents);
        let before = lines.len();
        let kept: Vec<String> = lines
            .into_iter()
            .filter(|line| !line_name(line).is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .collect();

        if kept.len() == before {
            return Ok(false);
        }
        self.write_lines(&kept).await?;
        Ok(true)
    }

    /// Rewrite the file without the records `doomed` selects. Lines that
    /// are not records are kept verbatim.
    async fn try_purge(
        &self,
        doomed: impl Fn(&PlayerRecord) -> bool,
    ) -> Result<Vec<String>, StoreError> {
        let _guard = self.file_lock.lock().await;
        let contents = self.read_contents().await?;

        let mut removed = Vec::new();
        let mut kept = Vec::new();
        for line in Self::split_lines(&contents) {
            match self.codec.decode(&line) {
                Ok(record) if doomed(&record) => removed.push(record.name),
                _ => kept.push(line),
            }
        }

        if !removed.is_empty() {
            self.write_lines(&kept).await?;
        }
        Ok(removed)
    }

    async fn build_lists(&self) -> Result<HashMap<StatKey, Vec<LeaderboardEntry>>, StoreError> {
        let contents = self.read_contents().await?;
        let mut lists: HashMap<StatKey, Vec<LeaderboardEntry>> =
            StatKey::all().map(|key| (key, Vec::new())).collect();

        for line in contents.lines() {
            let Ok(record) = self.codec.decode(line) else {
                continue;
            };
            for key in StatKey::all() {
                let value = match key {
                    StatKey::Skill(skill) => record.level(skill),
                    StatKey::PowerLevel => record.power_level(),
                };
                if value > 0 {
                    if let Some(list) = lists.get_mut(&key) {
                        list.push(LeaderboardEntry::new(&record.name, value));
                    }
                }
            }
        }

        for list in lists.values_mut() {
            list.sort_by(LeaderboardEntry::ranking_order);
        }
        Ok(lists)
    }

    fn cleanup_profiles(&self, names: &[String]) {
        for name in names {
            self.hooks.profile_cleanup(name);
        }
    }
}

#[async_trait]
impl StatsStore for FlatfileStore {
    async fn load_record(&self, name: &str, create: bool) -> Result<PlayerRecord, StoreError> {
        self.try_load(name, create).await
    }

    async fn save_record(&self, record: &PlayerRecord) -> bool {
        match self.try_save(record).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("Failed to save {}: {}", record.name, err);
                false
            }
        }
    }

    async fn create_record(&self, name: &str) {
        match self.insert_new(name).await {
            Ok((_, true)) => tracing::debug!("Created record for {}", name),
            Ok((_, false)) => tracing::warn!("Record for {} already exists", name),
            Err(err) => tracing::error!("Failed to create record for {}: {}", name, err),
        }
    }

    async fn remove_record(&self, name: &str) -> bool {
        let removed = match self.try_remove(name).await {
            Ok(removed) => removed,
            Err(err) => {
                tracing::error!("Failed to remove {}: {}", name, err);
                false
            }
        };
        self.hooks.profile_cleanup(name);
        removed
    }

    async fn read_leaderboard(
        &self,
        stat: StatKey,
        page: usize,
        page_size: usize,
    ) -> Vec<LeaderboardEntry> {
        if page_size == 0 {
            return Vec::new();
        }
        match self.cache.get_or_rebuild(|| self.build_lists()).await {
            Ok(snapshot) => snapshot.page(&stat, page, page_size),
            Err(err) => {
                tracing::error!("Failed to build leaderboards: {}", err);
                Vec::new()
            }
        }
    }

    async fn read_rank(&self, name: &str) -> RankResult {
        let mut ranks = RankResult::new();
        let snapshot = match self.cache.get_or_rebuild(|| self.build_lists()).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!("Failed to build leaderboards: {}", err);
                return ranks;
            }
        };
        for key in StatKey::all() {
            if let Some(position) =
                snapshot.position(&key, |entry| entry.name.eq_ignore_ascii_case(name))
            {
                ranks.insert(key, u32::try_from(position).unwrap_or(u32::MAX));
            }
        }
        ranks
    }

    async fn purge_powerless(&self) -> Vec<String> {
        match self.try_purge(PlayerRecord::is_powerless).await {
            Ok(removed) => {
                tracing::info!("Purged {} powerless users", removed.len());
                self.cleanup_profiles(&removed);
                if !removed.is_empty() {
                    self.cache.invalidate();
                }
                removed
            }
            Err(err) => {
                tracing::error!("Failed to purge powerless users: {}", err);
                Vec::new()
            }
        }
    }

    async fn purge_older_than(&self, cutoff: PurgeCutoff) -> Vec<String> {
        let Some(threshold) = cutoff.threshold(epoch_seconds()) else {
            return Vec::new();
        };
        // A zero login time means "never recorded", not 1970.
        let result = self
            .try_purge(|record| record.last_login > 0 && record.last_login < threshold)
            .await;
        match result {
            Ok(removed) => {
                tracing::info!("Purged {} old users", removed.len());
                self.cleanup_profiles(&removed);
                if !removed.is_empty() {
                    self.cache.invalidate();
                }
                removed
            }
            Err(err) => {
                tracing::error!("Failed to purge old users: {}", err);
                Vec::new()
            }
        }
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn stored_names(&self) -> Vec<String> {
        match self.read_contents().await {
            Ok(contents) => contents
                .lines()
                .filter_map(line_name)
                .map(str::to_string)
                .collect(),
            Err(err) => {
                tracing::error!("Failed to read {}: {}", self.path.display(), err);
                Vec::new()
            }
        }
    }
}
