//! # sqlite-pg-migrate
//!
//! Batch migration of the movie catalogue from a legacy SQLite file into a
//! PostgreSQL `content` schema.
//!
//! This library provides:
//!
//! - **Paged transfer** with `LIMIT`/`OFFSET` windows of a configured size
//! - **Idempotent writes** that skip rows whose primary key already exists
//! - **Consistency checks** of structure, row counts and row contents
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> sqlite_pg_migrate::Result<()> {
//!     let config = Config::from_env()?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run().await?;
//!     println!("Inserted {} rows", result.rows_inserted);
//!     orchestrator.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod schema;
pub mod source;
pub mod target;
pub mod transfer;
pub mod verify;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use crate::core::{Page, PageSink, PageSource, Row, SqlValue};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationResult, Orchestrator};
pub use schema::{FieldType, SchemaRegistry, TableDescriptor, EXCLUDED_COLUMN};
pub use source::SqliteSource;
pub use target::PgTarget;
pub use transfer::{migrate_table, MigrationCursor, TableStats};
pub use verify::{ConsistencyChecker, VerifyResult};
