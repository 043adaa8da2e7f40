//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for source (SQLite) failures.
pub const EXIT_SOURCE_ERROR: u8 = 2;
/// Exit code for target (PostgreSQL) failures.
pub const EXIT_TARGET_ERROR: u8 = 3;
/// Exit code for a failed consistency check.
pub const EXIT_VERIFY_ERROR: u8 = 4;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Missing or malformed configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration value that parsed but is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Table name has no registered row shape.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Source value could not be decoded into its field type.
    #[error("Cannot decode {table}.{column}: {message}")]
    Decode {
        table: String,
        column: String,
        message: String,
    },

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Column sets differ between source and target.
    #[error(
        "Structure mismatch in table {table}: missing in target {missing_in_target:?}, \
         missing in source {missing_in_source:?}"
    )]
    SchemaMismatch {
        table: String,
        missing_in_target: Vec<String>,
        missing_in_source: Vec<String>,
    },

    /// Row counts differ between source and target.
    #[error("Record count mismatch in table {table}: source={source_count}, target={target_count}")]
    RowCountMismatch {
        table: String,
        source_count: i64,
        target_count: i64,
    },

    /// Row contents differ between source and target.
    #[error(
        "Data mismatch in table {table}: {missing_in_target} source rows unmatched in target, \
         {missing_in_source} target rows unmatched in source"
    )]
    RecordMismatch {
        table: String,
        missing_in_target: usize,
        missing_in_source: usize,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Decode error
    pub fn decode(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MigrateError::Decode {
            table: table.into(),
            column: column.into(),
            message: message.into(),
        }
    }

    /// Whether this error is one of the consistency-check failures.
    pub fn is_consistency_failure(&self) -> bool {
        matches!(
            self,
            MigrateError::SchemaMismatch { .. }
                | MigrateError::RowCountMismatch { .. }
                | MigrateError::RecordMismatch { .. }
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::InvalidConfiguration(_)
            | MigrateError::UnknownTable(_) => EXIT_CONFIG_ERROR,
            MigrateError::Source(_) | MigrateError::Decode { .. } => EXIT_SOURCE_ERROR,
            MigrateError::Target(_) | MigrateError::Pool { .. } => EXIT_TARGET_ERROR,
            MigrateError::SchemaMismatch { .. }
            | MigrateError::RowCountMismatch { .. }
            | MigrateError::RecordMismatch { .. } => EXIT_VERIFY_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Json(_) => EXIT_CONFIG_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
