//! Idempotent schema setup, run before the store issues any statement.

use itertools::Itertools;
use sqlx::{Executor, Row, SqliteConnection};
use stats_types::MobHealthbarType;

use super::statements::{cooldown_columns, skill_columns, CHILD_TABLES};
use crate::error::StoreError;

/// What one migrator run changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<&'static str>,
    pub indexed: bool,
    pub orphans_removed: u64,
}

pub struct SchemaMigrator<'a> {
    prefix: &'a str,
    mob_healthbar_default: MobHealthbarType,
}

impl<'a> SchemaMigrator<'a> {
    pub fn new(prefix: &'a str, mob_healthbar_default: MobHealthbarType) -> Self {
        Self {
            prefix,
            mob_healthbar_default,
        }
    }

    pub async fn run(&self, conn: &mut SqliteConnection) -> Result<MigrationReport, StoreError> {
        let mut report = MigrationReport::default();
        self.create_tables(conn).await?;
        self.apply_column_migrations(conn, &mut report).await?;
        report.indexed = self.ensure_indices(conn).await?;
        report.orphans_removed = self.remove_orphans(conn).await?;
        tracing::info!(
            "Schema checked: {} migrations applied, {} orphan rows removed",
            report.applied.len(),
            report.orphans_removed
        );
        Ok(report)
    }

    async fn create_tables(&self, conn: &mut SqliteConnection) -> Result<(), StoreError> {
        let p = self.prefix;
        let skills = skill_columns();
        let experience = skills
            .iter()
            .map(|c| format!("{c} REAL NOT NULL DEFAULT 0"))
            .join(", ");

        let tables = [
            format!(
                "CREATE TABLE IF NOT EXISTS {p}users (\
                 id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 name TEXT NOT NULL UNIQUE COLLATE NOCASE, \
                 lastlogin INTEGER NOT NULL DEFAULT 0)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {p}skills (user_id INTEGER PRIMARY KEY, {})",
                integer_columns(&skills)
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {p}experience (user_id INTEGER PRIMARY KEY, {experience})"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {p}cooldowns (user_id INTEGER PRIMARY KEY, {})",
                integer_columns(&cooldown_columns())
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {p}huds (\
                 user_id INTEGER PRIMARY KEY, \
                 hudtype TEXT NOT NULL DEFAULT 'STANDARD', \
                 mobhealthbar TEXT NOT NULL DEFAULT '{}')",
                self.mob_healthbar_default
            ),
        ];

        for ddl in &tables {
            conn.execute(sqlx::query(ddl))
                .await
                .map_err(|e| StoreError::SchemaMigrationFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Whether a column can be selected. Failure is the expected answer on
    /// an old schema and is not an error.
    async fn has_column(&self, conn: &mut SqliteConnection, table: &str, column: &str) -> bool {
        let probe = format!("SELECT {column} FROM {}{table} LIMIT 1", self.prefix);
        match conn.fetch_optional(sqlx::query(&probe)).await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!("Probe for {}.{} failed: {}", table, column, err);
                false
            }
        }
    }

    async fn alter(&self, conn: &mut SqliteConnection, statement: String) -> Result<(), StoreError> {
        conn.execute(sqlx::query(&statement))
            .await
            .map_err(|e| StoreError::SchemaMigrationFailed(format!("{statement}: {e}")))?;
        Ok(())
    }

    async fn apply_column_migrations(
        &self,
        conn: &mut SqliteConnection,
        report: &mut MigrationReport,
    ) -> Result<(), StoreError> {
        let p = self.prefix;

        if !self.has_column(conn, "cooldowns", "blast_mining").await {
            tracing::info!("Updating database for Blast Mining");
            self.alter(
                conn,
                format!("ALTER TABLE {p}cooldowns ADD COLUMN blast_mining INTEGER NOT NULL DEFAULT 0"),
            )
            .await?;
            report.applied.push("blast_mining");
        }

        if !self.has_column(conn, "skills", "fishing").await {
            tracing::info!("Updating database for Fishing");
            self.alter(
                conn,
                format!("ALTER TABLE {p}skills ADD COLUMN fishing INTEGER NOT NULL DEFAULT 0"),
            )
            .await?;
            self.alter(
                conn,
                format!("ALTER TABLE {p}experience ADD COLUMN fishing REAL NOT NULL DEFAULT 0"),
            )
            .await?;
            report.applied.push("fishing");
        }

        if !self.has_column(conn, "huds", "mobhealthbar").await {
            tracing::info!("Updating database for mob healthbars");
            self.alter(
                conn,
                format!(
                    "ALTER TABLE {p}huds ADD COLUMN mobhealthbar TEXT NOT NULL DEFAULT '{}'",
                    self.mob_healthbar_default
                ),
            )
            .await?;
            report.applied.push("mobhealthbar");
        }

        // The party column moved out of this table long ago.
        if self.has_column(conn, "users", "party").await {
            tracing::info!("Removing party name from users table");
            self.alter(conn, format!("ALTER TABLE {p}users DROP COLUMN party"))
                .await?;
            report.applied.push("drop_party");
        }

        Ok(())
    }

    /// Create the per-skill indices if they are not all present. Returns
    /// whether the index batch ran.
    async fn ensure_indices(&self, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
        let p = self.prefix;
        let skills = skill_columns();
        let expected: Vec<String> = skills.iter().map(|c| format!("{p}idx_{c}")).collect();

        let placeholders = std::iter::repeat("?").take(expected.len()).join(", ");
        let count_sql = format!(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name IN ({placeholders})"
        );
        let mut count_query = sqlx::query(&count_sql);
        for name in &expected {
            count_query = count_query.bind(name);
        }
        let count: i64 = conn
            .fetch_one(count_query)
            .await
            .and_then(|row| row.try_get(0))
            .map_err(|e| StoreError::SchemaMigrationFailed(e.to_string()))?;

        if usize::try_from(count).ok() == Some(expected.len()) {
            return Ok(false);
        }

        tracing::info!("Indexing tables, this may take a while on larger databases");
        let batch = skills
            .iter()
            .zip(&expected)
            .map(|(column, index)| {
                format!("CREATE INDEX IF NOT EXISTS {index} ON {p}skills({column});")
            })
            .join("\n");
        conn.execute(sqlx::raw_sql(&batch))
            .await
            .map_err(|e| StoreError::SchemaMigrationFailed(e.to_string()))?;
        Ok(true)
    }

    async fn remove_orphans(&self, conn: &mut SqliteConnection) -> Result<u64, StoreError> {
        let p = self.prefix;
        let mut removed = 0;
        for table in CHILD_TABLES {
            let sweep =
                format!("DELETE FROM {p}{table} WHERE user_id NOT IN (SELECT id FROM {p}users)");
            removed += conn
                .execute(sqlx::query(&sweep))
                .await
                .map_err(|e| StoreError::SchemaMigrationFailed(e.to_string()))?
                .rows_affected();
        }
        if removed > 0 {
            tracing::info!("Removed {} orphaned rows", removed);
        }
        Ok(removed)
    }
}

fn integer_columns(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{c} INTEGER NOT NULL DEFAULT 0"))
        .join(", ")
}
