//! Core traits for the batch migration loop.
//!
//! - [`PageSource`]: reads column metadata and bounded pages from a source store
//! - [`PageSink`]: writes a page into a target store
//!
//! The SQLite reader and the PostgreSQL writer implement these; the driver
//! in [`crate::transfer`] only sees the traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::{Field, TableDescriptor};

use super::value::{Page, Row};

/// Read data from a source database.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// List the physical columns of a table in their declared order.
    async fn columns(&self, table: &str) -> Result<Vec<String>>;

    /// Fetch one page of rows projected onto `fields`.
    ///
    /// Returns fewer than `batch_size` rows, possibly none, when the window
    /// runs past the end of the table. A failed query is an `Err`, never an
    /// empty page.
    async fn fetch_page(
        &self,
        table: &str,
        fields: &[Field],
        offset: i64,
        batch_size: i64,
    ) -> Result<Page>;

    /// Get the database type identifier.
    fn db_type(&self) -> &str;
}

/// Write data to a target database.
#[async_trait]
pub trait PageSink: Send + Sync {
    /// Insert a page of rows, silently skipping rows whose primary key
    /// already exists. The write is all-or-nothing for the page.
    ///
    /// Returns the number of rows actually inserted.
    async fn write_page(&self, descriptor: &TableDescriptor, rows: &[Row]) -> Result<u64>;

    /// Get the database type identifier.
    fn db_type(&self) -> &str;
}
