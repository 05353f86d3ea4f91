use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use stats_types::MobHealthbarType;

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::flatfile::FlatfileStore;
use crate::hooks::StoreHooks;
use crate::retry::BackoffPolicy;
use crate::sql::{RelationalStore, SqliteConnector};
use crate::traits::{PurgeCutoff, StatsStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Flatfile,
    Sqlite,
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flatfile" => Ok(BackendKind::Flatfile),
            "sqlite" | "sql" => Ok(BackendKind::Sqlite),
            other => Err(StoreError::Config(format!("unknown backend {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub flatfile_path: PathBuf,
    pub database_url: String,
    pub table_prefix: String,
    /// Months of inactivity before a user is purged; `-1` disables.
    pub purge_cutoff_months: i64,
    pub leaderboard_ttl_secs: u64,
    pub mob_healthbar_default: MobHealthbarType,
    pub backoff: BackoffPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Flatfile,
            flatfile_path: PathBuf::from("mcmmo.users"),
            database_url: "sqlite://mcmmo.db".to_string(),
            table_prefix: "mcmmo_".to_string(),
            purge_cutoff_months: -1,
            leaderboard_ttl_secs: 600,
            mob_healthbar_default: MobHealthbarType::Hearts,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Settings from YAML text (or defaults), then the `STATS_BACKEND` and
    /// `STATS_DATABASE_URL` environment variables, then a CLI database url.
    pub fn from_cli_or_env_or_yaml(
        cli_arg: Option<String>,
        yaml_config: Option<String>,
    ) -> Result<Self, StoreError> {
        let mut config = match yaml_config {
            Some(yaml) => Self::from_yaml_str(&yaml)?,
            None => Self::default(),
        };

        if let Ok(backend) = std::env::var("STATS_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Ok(url) = std::env::var("STATS_DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(arg) = cli_arg {
            config.database_url = arg;
        }
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, StoreError> {
        serde_yaml::from_str(yaml).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn purge_cutoff(&self) -> PurgeCutoff {
        PurgeCutoff::months(self.purge_cutoff_months)
    }

    pub fn leaderboard_ttl(&self) -> Duration {
        Duration::from_secs(self.leaderboard_ttl_secs)
    }

    pub fn create_connector(&self) -> Result<SqliteConnector, StoreError> {
        SqliteConnector::new(&self.database_url)
    }
}

/// Build the one backend this process will use.
pub async fn open_store(
    config: &StoreConfig,
    hooks: Arc<dyn StoreHooks>,
) -> Result<Arc<dyn StatsStore>, StoreError> {
    open_store_with_clock(config, hooks, Arc::new(SystemClock)).await
}

pub async fn open_store_with_clock(
    config: &StoreConfig,
    hooks: Arc<dyn StoreHooks>,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn StatsStore>, StoreError> {
    match config.backend {
        BackendKind::Flatfile => {
            tracing::info!("Using flatfile store at {}", config.flatfile_path.display());
            Ok(Arc::new(FlatfileStore::new(
                config.flatfile_path.clone(),
                config.mob_healthbar_default,
                config.leaderboard_ttl(),
                clock,
                hooks,
            )))
        }
        BackendKind::Sqlite => {
            tracing::info!("Using SQLite store at {}", config.database_url);
            let store = RelationalStore::open(
                config.create_connector()?,
                config.backoff.clone(),
                clock,
                &config.table_prefix,
                config.mob_healthbar_default,
                hooks,
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, BackendKind::Flatfile);
        assert_eq!(config.table_prefix, "mcmmo_");
        assert_eq!(config.purge_cutoff(), PurgeCutoff::Disabled);
        assert_eq!(config.leaderboard_ttl(), Duration::from_secs(600));
        assert_eq!(config.backoff.min_wait_ms, 500);
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let config = StoreConfig::from_yaml_str(
            r#"
backend: sqlite
table_prefix: "mc_"
purge_cutoff_months: 6
mob_healthbar_default: BAR
backoff:
  scaling_factor: 2.0
"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.table_prefix, "mc_");
        assert_eq!(config.purge_cutoff(), PurgeCutoff::months(6));
        assert_eq!(config.mob_healthbar_default, MobHealthbarType::Bar);
        assert_eq!(config.backoff.scaling_factor, 2.0);
        assert_eq!(config.backoff.max_wait_ms, 300_000);
        assert_eq!(config.leaderboard_ttl_secs, 600);
    }

    #[test]
    fn test_bad_yaml_is_a_config_error() {
        assert!(matches!(
            StoreConfig::from_yaml_str("backend: [oops"),
            Err(StoreError::Config(_))
        ));
        assert!(matches!(
            StoreConfig::from_yaml_str("backend: mongodb"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_cli_url_wins() {
        let config = StoreConfig::from_cli_or_env_or_yaml(
            Some("sqlite://cli.db".to_string()),
            Some("database_url: sqlite://yaml.db".to_string()),
        )
        .unwrap();
        assert_eq!(config.database_url, "sqlite://cli.db");
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("SQLite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert_eq!("flatfile".parse::<BackendKind>().unwrap(), BackendKind::Flatfile);
        assert!("redis".parse::<BackendKind>().is_err());
    }
}
