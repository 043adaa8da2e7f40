//! Batch migration driver.
//!
//! Copies one table page by page: fetch a window of `batch_size` rows at the
//! cursor offset, write it, advance, and stop at the first empty page. One
//! page is fully written before the next is fetched.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::validate_batch_size;
use crate::core::traits::{PageSink, PageSource};
use crate::error::Result;
use crate::schema::TableDescriptor;

/// Position of the driver within one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationCursor {
    pub table: String,
    pub offset: i64,
    pub batch_size: i64,
}

impl MigrationCursor {
    pub fn new(table: impl Into<String>, batch_size: i64) -> Self {
        Self {
            table: table.into(),
            offset: 0,
            batch_size,
        }
    }

    /// Move to the next window.
    pub fn advance(&mut self) {
        self.offset += self.batch_size;
    }
}

/// Statistics from migrating one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableStats {
    /// Table name.
    pub table: String,

    /// Fetches issued, including the terminating empty one.
    pub fetches: u64,

    /// Pages committed to the destination.
    pub pages_written: u64,

    /// Pages whose write was rolled back.
    pub pages_failed: u64,

    /// Rows read from the source.
    pub rows_read: u64,

    /// Rows actually inserted (excludes rows skipped on key conflict).
    pub rows_inserted: u64,

    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

/// Copy every row of one table from `source` to `sink`.
///
/// A failed page write is logged, counted in `pages_failed` and skipped; the
/// loop carries on with the next window. A failed read ends the table with
/// `Err`.
pub async fn migrate_table(
    source: &dyn PageSource,
    sink: &dyn PageSink,
    descriptor: &TableDescriptor,
    batch_size: i64,
) -> Result<TableStats> {
    validate_batch_size(batch_size)?;

    let started = Instant::now();
    let mut stats = TableStats {
        table: descriptor.name.to_string(),
        ..Default::default()
    };

    info!(
        "Migrating {} from {} to {} (batch size {})",
        descriptor.name,
        source.db_type(),
        sink.db_type(),
        batch_size
    );

    let source_columns = source.columns(descriptor.name).await?;
    let fields = descriptor.align(&source_columns)?;

    let mut cursor = MigrationCursor::new(descriptor.name, batch_size);
    loop {
        let page = source
            .fetch_page(descriptor.name, fields, cursor.offset, cursor.batch_size)
            .await?;
        stats.fetches += 1;

        if page.is_empty() {
            debug!("{}: empty page at offset {}, done", descriptor.name, cursor.offset);
            break;
        }
        stats.rows_read += page.len() as u64;

        match sink.write_page(descriptor, &page.rows).await {
            Ok(inserted) => {
                stats.pages_written += 1;
                stats.rows_inserted += inserted;
            }
            Err(e) => {
                stats.pages_failed += 1;
                error!(
                    "{}: page at offset {} ({} rows) not written: {}",
                    descriptor.name,
                    cursor.offset,
                    page.len(),
                    e
                );
            }
        }

        cursor.advance();
    }

    stats.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "{}: {} rows read, {} inserted, {} pages written, {} failed in {}ms",
        descriptor.name,
        stats.rows_read,
        stats.rows_inserted,
        stats.pages_written,
        stats.pages_failed,
        stats.duration_ms
    );

    Ok(stats)
}
