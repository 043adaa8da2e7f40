//! Post-migration consistency checks.
//!
//! Three independent checks run over the same table list:
//!
//! - **Structure**: source columns (minus the excluded column) equal the
//!   destination columns as sets
//! - **Count**: row counts match
//! - **Content**: rows read through the table descriptor match as sets once
//!   normalized
//!
//! The `compare_*` functions hold the comparison logic and work on plain
//! values; [`ConsistencyChecker`] gathers those values from the live stores.

pub mod normalize;
pub mod types;

pub use types::{CheckFailure, CheckKind, VerifyResult};

use std::collections::BTreeSet;

use tracing::{error, info};

use crate::core::traits::PageSource;
use crate::core::value::Row;
use crate::error::{MigrateError, Result};
use crate::schema::{strip_excluded, TableDescriptor};
use crate::source::SqliteSource;
use crate::target::PgTarget;

use normalize::row_set;

/// Compare source and destination column sets.
pub fn compare_columns(table: &str, source_cols: &[String], target_cols: &[String]) -> Result<()> {
    let source: BTreeSet<String> = strip_excluded(source_cols).into_iter().collect();
    let target: BTreeSet<String> = target_cols.iter().cloned().collect();

    if source == target {
        return Ok(());
    }

    Err(MigrateError::SchemaMismatch {
        table: table.to_string(),
        missing_in_target: source.difference(&target).cloned().collect(),
        missing_in_source: target.difference(&source).cloned().collect(),
    })
}

/// Compare row counts.
pub fn compare_counts(table: &str, source_count: i64, target_count: i64) -> Result<()> {
    if source_count == target_count {
        Ok(())
    } else {
        Err(MigrateError::RowCountMismatch {
            table: table.to_string(),
            source_count,
            target_count,
        })
    }
}

/// Compare rows as sets after normalization.
pub fn compare_rows(table: &str, source_rows: Vec<Row>, target_rows: Vec<Row>) -> Result<()> {
    let source = row_set(source_rows);
    let target = row_set(target_rows);

    let missing_in_target = source.difference(&target).count();
    let missing_in_source = target.difference(&source).count();

    if missing_in_target == 0 && missing_in_source == 0 {
        return Ok(());
    }

    Err(MigrateError::RecordMismatch {
        table: table.to_string(),
        missing_in_target,
        missing_in_source,
    })
}

/// Runs the consistency checks against a live source and destination.
pub struct ConsistencyChecker<'a> {
    source: &'a SqliteSource,
    target: &'a PgTarget,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(source: &'a SqliteSource, target: &'a PgTarget) -> Self {
        Self { source, target }
    }

    async fn structure(&self, table: &TableDescriptor) -> Result<()> {
        let source_cols = self.source.columns(table.name).await?;
        let target_cols = self.target.columns(table.name).await?;
        compare_columns(table.name, &source_cols, &target_cols)
    }

    async fn counts(&self, table: &TableDescriptor) -> Result<()> {
        let source_count = self.source.row_count(table.name).await?;
        let target_count = self.target.row_count(table.name).await?;
        compare_counts(table.name, source_count, target_count)
    }

    async fn content(&self, table: &TableDescriptor) -> Result<()> {
        let source_rows = self.source.fetch_all(table.name, table.fields).await?;
        let target_rows = self.target.fetch_all(table).await?;
        compare_rows(table.name, source_rows, target_rows)
    }

    /// Structure check over every table; returns the first failure.
    pub async fn check_structure(&self, tables: &[&TableDescriptor]) -> Result<()> {
        for table in tables {
            self.structure(table).await?;
        }
        Ok(())
    }

    /// Count check over every table; returns the first failure.
    pub async fn check_counts(&self, tables: &[&TableDescriptor]) -> Result<()> {
        for table in tables {
            self.counts(table).await?;
        }
        Ok(())
    }

    /// Content check over every table; returns the first failure.
    pub async fn check_content(&self, tables: &[&TableDescriptor]) -> Result<()> {
        for table in tables {
            self.content(table).await?;
        }
        Ok(())
    }

    /// Run all three checks for every table and collect the failures.
    ///
    /// Database errors still abort with `Err`; only check failures are
    /// collected.
    pub async fn verify(&self, tables: &[&TableDescriptor]) -> Result<VerifyResult> {
        let mut result = VerifyResult::default();

        for table in tables {
            result.tables_checked += 1;
            let before = result.failures.len();

            record(&mut result, table.name, CheckKind::Structure, self.structure(table).await)?;
            record(&mut result, table.name, CheckKind::Count, self.counts(table).await)?;
            record(&mut result, table.name, CheckKind::Content, self.content(table).await)?;

            if result.failures.len() == before {
                result.tables_consistent += 1;
                info!("{}: consistent", table.name);
            }
        }

        info!(
            "Verification: {}/{} tables consistent, {} failures",
            result.tables_consistent,
            result.tables_checked,
            result.failures.len()
        );

        Ok(result)
    }
}

fn record(
    result: &mut VerifyResult,
    table: &str,
    check: CheckKind,
    outcome: Result<()>,
) -> Result<()> {
    match outcome {
        Ok(()) => Ok(()),
        Err(e) if e.is_consistency_failure() => {
            error!("{}", e);
            result.failures.push(CheckFailure {
                table: table.to_string(),
                check,
                message: e.to_string(),
            });
            Ok(())
        }
        Err(e) => Err(e),
    }
}
