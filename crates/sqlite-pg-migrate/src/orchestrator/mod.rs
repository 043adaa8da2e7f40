//! Migration orchestrator - main workflow coordinator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::schema::SchemaRegistry;
use crate::source::SqliteSource;
use crate::target::PgTarget;
use crate::transfer::{migrate_table, TableStats};
use crate::verify::{ConsistencyChecker, VerifyResult};

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    registry: SchemaRegistry,
    source: SqliteSource,
    target: PgTarget,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: `completed` or `completed_with_errors`.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total tables processed.
    pub tables_total: usize,

    /// Total rows read from the source.
    pub rows_read: u64,

    /// Total rows inserted into the destination.
    pub rows_inserted: u64,

    /// Pages rolled back across all tables.
    pub pages_failed: u64,

    /// Per-table statistics in migration order.
    pub tables: Vec<TableStats>,

    /// Consistency check outcome, when it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerifyResult>,
}

impl Orchestrator {
    /// Open both stores.
    pub async fn new(config: Config) -> Result<Self> {
        let source = SqliteSource::open(&config.source.path).await?;
        let target = match PgTarget::connect(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self {
            config,
            registry: SchemaRegistry::builtin(),
            source,
            target,
        })
    }

    /// Migrate every registered table in dependency order.
    ///
    /// A source failure stops the run with `Err`. Page write failures are
    /// counted in the result and do not stop it.
    pub async fn run(&self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let batch_size = self.config.migration.batch_size;
        let tables = self.registry.migration_order();

        info!(
            "Starting migration run {}: {} tables, batch size {}",
            run_id,
            tables.len(),
            batch_size
        );

        let mut stats = Vec::with_capacity(tables.len());
        for descriptor in tables {
            stats.push(migrate_table(&self.source, &self.target, descriptor, batch_size).await?);
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let pages_failed: u64 = stats.iter().map(|s| s.pages_failed).sum();

        let status = if pages_failed > 0 {
            warn!(
                "Migration finished with {} failed pages; affected rows are missing from the destination",
                pages_failed
            );
            "completed_with_errors"
        } else {
            info!("Migration finished in {:.1}s", duration);
            "completed"
        };

        Ok(MigrationResult {
            run_id,
            status: status.to_string(),
            duration_seconds: duration,
            started_at,
            completed_at,
            tables_total: stats.len(),
            rows_read: stats.iter().map(|s| s.rows_read).sum(),
            rows_inserted: stats.iter().map(|s| s.rows_inserted).sum(),
            pages_failed,
            tables: stats,
            verification: None,
        })
    }

    /// Run the consistency checks over every registered table.
    pub async fn verify(&self) -> Result<VerifyResult> {
        ConsistencyChecker::new(&self.source, &self.target)
            .verify(self.registry.migration_order())
            .await
    }

    /// Release both stores.
    pub async fn close(self) {
        self.source.close().await;
        self.target.close();
    }
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// True when every page was written and verification, if run, passed.
    pub fn is_success(&self) -> bool {
        self.pages_failed == 0
            && self
                .verification
                .as_ref()
                .map_or(true, VerifyResult::is_consistent)
    }
}
