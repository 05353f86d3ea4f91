use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, SqliteConnection};

use crate::error::StoreError;
use crate::supervisor::Connector;

/// Opens single SQLite connections for the supervisor.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    options: SqliteConnectOptions,
}

impl SqliteConnector {
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Config(format!("invalid database url {url:?}: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        Ok(Self { options })
    }

    pub fn from_options(options: SqliteConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    type Handle = SqliteConnection;

    async fn open(&self) -> Result<SqliteConnection, StoreError> {
        Ok(SqliteConnection::connect_with(&self.options).await?)
    }

    async fn is_valid(&self, handle: &mut SqliteConnection, timeout: Duration) -> bool {
        matches!(tokio::time::timeout(timeout, handle.ping()).await, Ok(Ok(())))
    }

    async fn close(&self, handle: SqliteConnection) {
        if let Err(err) = handle.close().await {
            tracing::debug!("Error closing database connection: {}", err);
        }
    }
}
