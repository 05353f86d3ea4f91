//! Relational backend over SQLite.

pub mod connector;
pub mod migrator;
pub mod statements;
pub mod store;

pub use connector::SqliteConnector;
pub use migrator::{MigrationReport, SchemaMigrator};
pub use statements::Statements;
pub use store::RelationalStore;
