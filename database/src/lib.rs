pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod flatfile;
pub mod hooks;
pub mod retry;
pub mod sql;
pub mod supervisor;
pub mod tasks;
pub mod traits;

#[cfg(test)]
mod tests;

pub use cache::LeaderboardCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::RecordCodec;
pub use config::{open_store, open_store_with_clock, BackendKind, StoreConfig};
pub use error::StoreError;
pub use flatfile::FlatfileStore;
pub use hooks::{ChannelHooks, StoreEvent, StoreHooks};
pub use retry::BackoffPolicy;
pub use sql::{RelationalStore, SchemaMigrator, SqliteConnector};
pub use supervisor::{ConnectionState, ConnectionSupervisor, Connector, EnsureOutcome};
pub use traits::{PurgeCutoff, StatsStore};

// NoopHooks for when no session layer is listening
pub struct NoopHooks;

impl StoreHooks for NoopHooks {
    fn profile_cleanup(&self, _name: &str) {}

    fn schedule_resave(&self) {}
}
