//! PostgreSQL storage adapter.
//!
//! This module implements the repository traits defined in
//! `meridian-core` using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgRepositories`] - Composite repository implementing `Repositories`
//! - Individual repos: `PgBalanceEventRepository`, `PgCursorRepository`
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_indexer(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let repositories = PgRepositories::new(Arc::new(db));
//! ```

mod cursor_repo;
mod database;
mod event_repo;
mod helpers;

pub use cursor_repo::PgCursorRepository;
pub use database::{Database, DatabaseConfig, PurgeStats};
pub use event_repo::PgBalanceEventRepository;

use std::sync::Arc;

use meridian_core::ports::{BalanceEventRepository, CursorRepository, Repositories};

// =============================================================================
// Composite Repository
// =============================================================================

/// Aggregated PostgreSQL repositories implementing the `Repositories`
/// trait.
///
/// Each shard batch is one conflict-ignore transaction inside
/// [`PgBalanceEventRepository::insert_events`]; there is no
/// cross-table atomicity to coordinate beyond that, so this type is a
/// plain aggregate.
pub struct PgRepositories {
    balance_events: PgBalanceEventRepository,
    cursor: PgCursorRepository,
}

impl PgRepositories {
    /// Create a new repository aggregate from a database connection.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            balance_events: PgBalanceEventRepository::new(db.pool().clone()),
            cursor: PgCursorRepository::new(&db),
        }
    }
}

impl Repositories for PgRepositories {
    fn balance_events(&self) -> &dyn BalanceEventRepository {
        &self.balance_events
    }

    fn cursor(&self) -> &dyn CursorRepository {
        &self.cursor
    }
}
