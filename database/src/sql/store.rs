use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Connection, Executor, Row, SqliteConnection};
use stats_types::{
    AbilityType, HudType, LeaderboardEntry, MobHealthbarType, PlayerRecord, RankResult, SkillType,
    StatKey,
};
use tokio::sync::{Mutex, MutexGuard};

use super::connector::SqliteConnector;
use super::migrator::SchemaMigrator;
use super::statements::Statements;
use crate::clock::{epoch_seconds, Clock};
use crate::error::StoreError;
use crate::hooks::StoreHooks;
use crate::retry::BackoffPolicy;
use crate::supervisor::{ConnectionSupervisor, Connector, EnsureOutcome};
use crate::traits::{PurgeCutoff, StatsStore};

struct Session<C: Connector> {
    supervisor: ConnectionSupervisor<C>,
    migrated: bool,
}

impl<C: Connector<Handle = SqliteConnection>> Session<C> {
    fn conn(&mut self) -> Result<&mut SqliteConnection, StoreError> {
        self.supervisor
            .handle_mut()
            .ok_or(StoreError::BackendUnavailable)
    }
}

/// Store over the five-table relational schema.
///
/// The single connection lives inside a [`ConnectionSupervisor`] behind an
/// async mutex, so statements never run concurrently on it. Statements go
/// through the [`Executor`] methods of `&mut SqliteConnection`, whose boxed
/// futures keep the trait futures `Send`.
pub struct RelationalStore<C: Connector<Handle = SqliteConnection> = SqliteConnector> {
    session: Mutex<Session<C>>,
    /// Outcome of the last connection check, answered while a statement
    /// holds the session.
    reachable: AtomicBool,
    statements: Statements,
    mob_healthbar_default: MobHealthbarType,
    hooks: Arc<dyn StoreHooks>,
}

impl<C: Connector<Handle = SqliteConnection>> RelationalStore<C> {
    /// Build the store and try to connect. An unreachable backend is not an
    /// error here: the schema check runs on the first successful connection.
    pub async fn open(
        connector: C,
        policy: BackoffPolicy,
        clock: Arc<dyn Clock>,
        table_prefix: &str,
        mob_healthbar_default: MobHealthbarType,
        hooks: Arc<dyn StoreHooks>,
    ) -> Result<Self, StoreError> {
        let statements = Statements::new(table_prefix)?;
        let store = Self {
            session: Mutex::new(Session {
                supervisor: ConnectionSupervisor::new(connector, policy, clock),
                migrated: false,
            }),
            reachable: AtomicBool::new(false),
            statements,
            mob_healthbar_default,
            hooks,
        };

        if let Err(err) = store.session().await {
            tracing::warn!("Database unavailable at startup, schema check deferred: {}", err);
        }
        Ok(store)
    }

    async fn session(&self) -> Result<MutexGuard<'_, Session<C>>, StoreError> {
        let session = self.session.lock().await;
        self.prepare(session).await
    }

    /// Make sure the locked session has a live, migrated connection.
    async fn prepare<'a>(
        &'a self,
        mut session: MutexGuard<'a, Session<C>>,
    ) -> Result<MutexGuard<'a, Session<C>>, StoreError> {
        let outcome = match session.supervisor.ensure_connected().await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.reachable.store(false, Ordering::Relaxed);
                return Err(err);
            }
        };
        self.reachable.store(true, Ordering::Relaxed);
        if outcome == (EnsureOutcome::Reconnected { after_outage: true }) {
            tracing::info!("Scheduling a full save after database outage");
            self.hooks.schedule_resave();
        }

        if !session.migrated {
            let conn = session.conn()?;
            let migrator = SchemaMigrator::new(&self.statements.prefix, self.mob_healthbar_default);
            if let Err(err) = migrator.run(conn).await {
                tracing::error!("Schema check failed, continuing with existing schema: {}", err);
            }
            session.migrated = true;
        }
        Ok(session)
    }

    async fn user_id(&self, conn: &mut SqliteConnection, name: &str) -> Result<Option<i64>, StoreError> {
        let row = conn
            .fetch_optional(sqlx::query(&self.statements.user_id).bind(name))
            .await?;
        Ok(row.map(|row| row.try_get(0)).transpose()?)
    }

    /// Insert any child row the user is missing.
    async fn ensure_children(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<(), StoreError> {
        for statement in &self.statements.ensure_children {
            conn.execute(sqlx::query(statement).bind(user_id)).await?;
        }
        conn.execute(
            sqlx::query(&self.statements.ensure_huds)
                .bind(user_id)
                .bind(self.mob_healthbar_default.to_string()),
        )
        .await?;
        Ok(())
    }

    async fn insert_user(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
        last_login: i64,
    ) -> Result<i64, StoreError> {
        let user_id = conn
            .execute(
                sqlx::query(&self.statements.insert_user)
                    .bind(name)
                    .bind(last_login),
            )
            .await?
            .last_insert_rowid();
        self.ensure_children(conn, user_id).await?;
        Ok(user_id)
    }

    async fn fetch_record(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
    ) -> Result<Option<PlayerRecord>, StoreError> {
        let Some(row) = conn
            .fetch_optional(sqlx::query(&self.statements.load).bind(name))
            .await?
        else {
            return Ok(None);
        };
        self.record_from_row(&row).map(Some)
    }

    fn record_from_row(&self, row: &SqliteRow) -> Result<PlayerRecord, StoreError> {
        let stored_name: String = row.try_get("name")?;
        let last_login: i64 = row.try_get("lastlogin")?;
        let mut record = PlayerRecord::new(&stored_name, self.mob_healthbar_default, last_login);

        for skill in SkillType::non_child_skills() {
            let column = skill.column();
            let level: i64 = row.try_get(format!("skill_{column}").as_str())?;
            record.set_level(skill, u32::try_from(level.max(0)).unwrap_or(u32::MAX));
            let xp: f64 = row.try_get(format!("xp_{column}").as_str())?;
            record.set_xp(skill, xp as f32);
        }
        for ability in AbilityType::ALL {
            let cooldown: i64 = row.try_get(format!("cd_{}", ability.cooldown_column()).as_str())?;
            record.set_cooldown(ability, cooldown);
        }

        let hud: String = row.try_get("hudtype")?;
        record.hud_type = hud.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown hud type {:?} for {}, using default", hud, stored_name);
            HudType::default()
        });
        let healthbar: String = row.try_get("mobhealthbar")?;
        record.mob_healthbar = healthbar.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Unknown mob healthbar type {:?} for {}, using default",
                healthbar,
                stored_name
            );
            self.mob_healthbar_default
        });
        Ok(record)
    }

    async fn try_load(&self, name: &str, create: bool) -> Result<PlayerRecord, StoreError> {
        let mut session = self.session().await?;
        let conn = session.conn()?;
        if let Some(record) = self.fetch_record(conn, name).await? {
            return Ok(record);
        }

        match self.user_id(conn, name).await? {
            Some(user_id) => {
                tracing::warn!("Repairing missing rows for {}", name);
                self.ensure_children(conn, user_id).await?;
            }
            None if create => {
                let mut tx = conn.begin().await?;
                self.insert_user(&mut tx, name, epoch_seconds()).await?;
                tx.commit().await?;
            }
            None => return Err(StoreError::NotFound(name.to_string())),
        }

        self.fetch_record(conn, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn try_create(&self, name: &str) -> Result<bool, StoreError> {
        let mut session = self.session().await?;
        let conn = session.conn()?;
        if self.user_id(conn, name).await?.is_some() {
            return Ok(false);
        }
        let mut tx = conn.begin().await?;
        self.insert_user(&mut tx, name, epoch_seconds()).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn try_save(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        let mut session = self.session().await?;
        let conn = session.conn()?;
        let mut tx = conn.begin().await?;

        let user_id = match self.user_id(&mut tx, &record.name).await? {
            Some(user_id) => {
                tx.execute(
                    sqlx::query(&self.statements.update_login)
                        .bind(record.last_login)
                        .bind(user_id),
                )
                .await?;
                user_id
            }
            None => self.insert_user(&mut tx, &record.name, record.last_login).await?,
        };

        let mut skills = sqlx::query(&self.statements.upsert_skills).bind(user_id);
        for skill in SkillType::non_child_skills() {
            skills = skills.bind(i64::from(record.level(skill)));
        }
        tx.execute(skills).await?;

        let mut experience = sqlx::query(&self.statements.upsert_experience).bind(user_id);
        for skill in SkillType::non_child_skills() {
            experience = experience.bind(f64::from(record.xp(skill)));
        }
        tx.execute(experience).await?;

        let mut cooldowns = sqlx::query(&self.statements.upsert_cooldowns).bind(user_id);
        for ability in AbilityType::ALL {
            cooldowns = cooldowns.bind(record.cooldown(ability));
        }
        tx.execute(cooldowns).await?;

        tx.execute(
            sqlx::query(&self.statements.upsert_huds)
                .bind(user_id)
                .bind(record.hud_type.to_string())
                .bind(record.mob_healthbar.to_string()),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn try_remove(&self, name: &str) -> Result<bool, StoreError> {
        let mut session = self.session().await?;
        let conn = session.conn()?;
        let mut tx = conn.begin().await?;

        let Some(user_id) = self.user_id(&mut tx, name).await? else {
            return Ok(false);
        };
        tx.execute(sqlx::query(&self.statements.delete_user).bind(user_id))
            .await?;
        for statement in &self.statements.delete_children {
            tx.execute(sqlx::query(statement).bind(user_id)).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn try_read_leaderboard(
        &self,
        stat: StatKey,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let Some(statement) = self.statements.leaderboard(stat) else {
            return Ok(Vec::new());
        };
        let offset = page.max(1).saturating_sub(1).saturating_mul(page_size);
        let limit = i64::try_from(page_size).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let mut session = self.session().await?;
        let conn = session.conn()?;
        let rows = conn
            .fetch_all(sqlx::query(statement).bind(limit).bind(offset))
            .await?;

        rows.iter()
            .map(|row| -> Result<LeaderboardEntry, StoreError> {
                let name: String = row.try_get("name")?;
                let value: i64 = row.try_get("value")?;
                Ok(LeaderboardEntry::new(
                    &name,
                    u32::try_from(value).unwrap_or(u32::MAX),
                ))
            })
            .collect()
    }

    async fn try_read_rank(&self, name: &str) -> Result<RankResult, StoreError> {
        let mut ranks = RankResult::new();
        let mut session = self.session().await?;
        let conn = session.conn()?;

        let Some(row) = conn
            .fetch_optional(sqlx::query(&self.statements.player_levels).bind(name))
            .await?
        else {
            return Ok(ranks);
        };

        let mut values = Vec::new();
        let mut power_level = 0;
        for (index, skill) in SkillType::non_child_skills().enumerate() {
            let level: i64 = row.try_get(index)?;
            power_level += level;
            values.push((StatKey::Skill(skill), level));
        }
        values.push((StatKey::PowerLevel, power_level));

        for (stat, value) in values {
            if value <= 0 {
                continue;
            }
            let (Some(ahead_sql), Some(ties_sql)) =
                (self.statements.rank_ahead(stat), self.statements.rank_ties(stat))
            else {
                continue;
            };

            let ahead: i64 = conn
                .fetch_one(sqlx::query(ahead_sql).bind(value))
                .await?
                .try_get(0)?;
            let tied = conn.fetch_all(sqlx::query(ties_sql).bind(value)).await?;

            let mut position = None;
            for (index, row) in tied.iter().enumerate() {
                let tied_name: String = row.try_get(0)?;
                if tied_name.eq_ignore_ascii_case(name) {
                    position = Some(index);
                    break;
                }
            }
            if let Some(position) = position {
                let rank = ahead + position as i64 + 1;
                ranks.insert(stat, u32::try_from(rank).unwrap_or(u32::MAX));
            }
        }
        Ok(ranks)
    }

    /// Delete the users a `RETURNING name` statement selects, then sweep
    /// the child rows they left behind, all in one transaction.
    async fn try_purge(&self, statement: &str, threshold: Option<i64>) -> Result<Vec<String>, StoreError> {
        let mut session = self.session().await?;
        let conn = session.conn()?;
        let mut tx = conn.begin().await?;

        let mut purge = sqlx::query(statement);
        if let Some(threshold) = threshold {
            purge = purge.bind(threshold);
        }
        let names = tx
            .fetch_all(purge)
            .await?
            .iter()
            .map(|row| row.try_get(0))
            .collect::<Result<Vec<String>, _>>()?;

        for sweep in &self.statements.sweep_orphans {
            tx.execute(sqlx::query(sweep)).await?;
        }
        tx.commit().await?;
        Ok(names)
    }

    async fn try_stored_names(&self) -> Result<Vec<String>, StoreError> {
        let mut session = self.session().await?;
        let conn = session.conn()?;
        let rows = conn
            .fetch_all(sqlx::query(&self.statements.stored_names))
            .await?;
        Ok(rows
            .iter()
            .map(|row| row.try_get(0))
            .collect::<Result<Vec<String>, _>>()?)
    }

    pub async fn shutdown(&self) {
        self.session.lock().await.supervisor.shutdown().await;
    }
}

fn log_failure(action: &str, err: &StoreError) {
    if err.is_connection_loss() {
        tracing::debug!("{} skipped, database unavailable", action);
    } else {
        tracing::error!("{} failed: {}", action, err);
    }
}

#[async_trait]
impl<C> StatsStore for RelationalStore<C>
where
    C: Connector<Handle = SqliteConnection> + 'static,
{
    async fn load_record(&self, name: &str, create: bool) -> Result<PlayerRecord, StoreError> {
        self.try_load(name, create).await
    }

    async fn save_record(&self, record: &PlayerRecord) -> bool {
        match self.try_save(record).await {
            Ok(()) => true,
            Err(err) => {
                log_failure(&format!("Saving {}", record.name), &err);
                false
            }
        }
    }

    async fn create_record(&self, name: &str) {
        match self.try_create(name).await {
            Ok(true) => tracing::debug!("Created record for {}", name),
            Ok(false) => tracing::warn!("Record for {} already exists", name),
            Err(err) => log_failure(&format!("Creating {name}"), &err),
        }
    }

    async fn remove_record(&self, name: &str) -> bool {
        let removed = match self.try_remove(name).await {
            Ok(removed) => removed,
            Err(err) => {
                log_failure(&format!("Removing {name}"), &err);
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
        self.try_read_leaderboard(stat, page, page_size)
            .await
            .unwrap_or_else(|err| {
                log_failure(&format!("Reading {stat} leaderboard"), &err);
                Vec::new()
            })
    }

    async fn read_rank(&self, name: &str) -> RankResult {
        self.try_read_rank(name).await.unwrap_or_else(|err| {
            log_failure(&format!("Reading ranks of {name}"), &err);
            RankResult::new()
        })
    }

    async fn purge_powerless(&self) -> Vec<String> {
        match self.try_purge(&self.statements.purge_powerless, None).await {
            Ok(removed) => {
                tracing::info!("Purged {} powerless users", removed.len());
                for name in &removed {
                    self.hooks.profile_cleanup(name);
                }
                removed
            }
            Err(err) => {
                log_failure("Purging powerless users", &err);
                Vec::new()
            }
        }
    }

    async fn purge_older_than(&self, cutoff: PurgeCutoff) -> Vec<String> {
        let Some(threshold) = cutoff.threshold(epoch_seconds()) else {
            return Vec::new();
        };
        match self
            .try_purge(&self.statements.purge_old, Some(threshold))
            .await
        {
            Ok(removed) => {
                tracing::info!("Purged {} old users", removed.len());
                for name in &removed {
                    self.hooks.profile_cleanup(name);
                }
                removed
            }
            Err(err) => {
                log_failure("Purging old users", &err);
                Vec::new()
            }
        }
    }

    async fn health_check(&self) -> bool {
        match self.session.try_lock() {
            Ok(session) => self.prepare(session).await.is_ok(),
            // A statement holds the connection, so answer from the last check.
            Err(_) => self.reachable.load(Ordering::Relaxed),
        }
    }

    async fn stored_names(&self) -> Vec<String> {
        self.try_stored_names().await.unwrap_or_else(|err| {
            log_failure("Listing users", &err);
            Vec::new()
        })
    }
}
