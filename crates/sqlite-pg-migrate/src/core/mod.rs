//! Core abstractions shared by the reader, writer and driver.
//!
//! - [`value`]: typed cell values, rows and pages
//! - [`traits`]: the page source and sink seams used by the migration driver

pub mod traits;
pub mod value;

pub use traits::{PageSink, PageSource};
pub use value::{parse_date, parse_timestamp, Page, Row, SqlValue};
