//! Storage layer for the Meridian indexer.
//!
//! This crate provides PostgreSQL implementations of the repository
//! traits defined in `meridian-core`. It handles all database
//! interactions including connection pooling, migrations, and the
//! idempotent ledger writes.
//!
//! # Architecture
//!
//! The storage layer follows the repository pattern:
//!
//! - [`postgres::Database`] - Connection pool management
//! - [`postgres::PgRepositories`] - Composite repository
//! - Individual repositories for balance events and the cursor
//!
//! # Usage
//!
//! ```ignore
//! use meridian_storage::{Database, DatabaseConfig, PgRepositories};
//!
//! // Connect to the database
//! let config = DatabaseConfig::for_indexer(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! // Run migrations
//! db.migrate().await?;
//!
//! // Create repositories
//! let repositories = Arc::new(PgRepositories::new(Arc::new(db)));
//! ```

pub mod postgres;

pub use postgres::{Database, DatabaseConfig, PgRepositories, PurgeStats};
