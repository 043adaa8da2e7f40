//! Verification result types.

use serde::Serialize;

/// Which of the three consistency checks produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Structure,
    Count,
    Content,
}

/// One failed check for one table.
#[derive(Debug, Clone, Serialize)]
pub struct CheckFailure {
    pub table: String,
    pub check: CheckKind,
    pub message: String,
}

/// Outcome of verifying a set of tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyResult {
    /// Tables examined.
    pub tables_checked: usize,

    /// Tables that passed every check.
    pub tables_consistent: usize,

    /// Every failed check, in table order.
    pub failures: Vec<CheckFailure>,
}

impl VerifyResult {
    /// True when no check failed.
    pub fn is_consistent(&self) -> bool {
        self.failures.is_empty()
    }
}
