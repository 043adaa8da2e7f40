//! Static schema registry mapping table names to row shapes.
//!
//! The registry must agree with the physical schemas of both stores. It
//! does not enforce that itself; [`TableDescriptor::align`] catches the
//! common drift at the start of each table and the consistency checker
//! catches the rest.

pub mod tables;

use tracing::warn;

use crate::error::{MigrateError, Result};

pub use tables::{FILM_WORK, GENRE, GENRE_FILM_WORK, PERSON, PERSON_FILM_WORK};

/// Legacy local file reference present only in the source.
pub const EXCLUDED_COLUMN: &str = "file_path";

/// Semantic type of a field, driving decoding and SQL literal casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Primary key UUID.
    Identifier,
    /// Short string.
    String,
    /// Long free-form text.
    Text,
    /// Double precision number.
    Float,
    /// Calendar date.
    Date,
    /// Instant with time zone.
    Timestamp,
    /// String restricted to a fixed set of values.
    Enum,
    /// UUID referencing another table's primary key.
    ForeignKey,
}

impl FieldType {
    /// PostgreSQL type used for casts.
    pub fn pg_type(&self) -> &'static str {
        match self {
            FieldType::Identifier | FieldType::ForeignKey => "uuid",
            FieldType::String | FieldType::Text | FieldType::Enum => "text",
            FieldType::Float => "double precision",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamptz",
        }
    }
}

/// A named, typed column of a row shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: &'static str,
    pub field_type: FieldType,
}

impl Field {
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type }
    }
}

/// Table name plus its ordered field list.
#[derive(Debug, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl TableDescriptor {
    pub const fn new(name: &'static str, fields: &'static [Field]) -> Self {
        Self { name, fields }
    }

    /// Field names in row order.
    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.to_string()).collect()
    }

    /// Name of the primary key column (the first identifier field).
    pub fn primary_key(&self) -> &'static str {
        self.fields
            .iter()
            .find(|f| f.field_type == FieldType::Identifier)
            .map(|f| f.name)
            .unwrap_or("id")
    }

    /// Check the source's physical columns against this row shape.
    ///
    /// The excluded column is ignored. Every field must be present in the
    /// source; source columns this shape does not know are skipped with a
    /// warning. Returns the projection, which is always this shape's fields
    /// in declared order.
    pub fn align(&self, source_columns: &[String]) -> Result<&'static [Field]> {
        let columns = strip_excluded(source_columns);

        let missing: Vec<String> = self
            .fields
            .iter()
            .filter(|f| !columns.iter().any(|c| c == f.name))
            .map(|f| f.name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(MigrateError::SchemaMismatch {
                table: self.name.to_string(),
                missing_in_target: Vec::new(),
                missing_in_source: missing,
            });
        }

        let unknown: Vec<&String> = columns
            .iter()
            .filter(|c| !self.fields.iter().any(|f| f.name == c.as_str()))
            .collect();
        if !unknown.is_empty() {
            warn!(
                "Table {}: skipping source columns with no registered field: {:?}",
                self.name, unknown
            );
        }

        Ok(self.fields)
    }
}

/// Remove the excluded legacy column from a column list, keeping order.
pub fn strip_excluded(columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .filter(|c| c.as_str() != EXCLUDED_COLUMN)
        .cloned()
        .collect()
}

/// Lookup of row shapes by table name.
#[derive(Debug, Clone, Copy)]
pub struct SchemaRegistry {
    tables: &'static [&'static TableDescriptor],
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemaRegistry {
    /// Registry of the movie catalogue tables.
    pub fn builtin() -> Self {
        Self {
            tables: &tables::MIGRATION_ORDER,
        }
    }

    /// Row shape registered for a table.
    pub fn describe(&self, table_name: &str) -> Result<&'static TableDescriptor> {
        self.tables
            .iter()
            .copied()
            .find(|t| t.name == table_name)
            .ok_or_else(|| MigrateError::UnknownTable(table_name.to_string()))
    }

    /// Tables in the order they must be migrated.
    pub fn migration_order(&self) -> &'static [&'static TableDescriptor] {
        self.tables
    }

    /// Registered table names in migration order.
    pub fn table_names(&self) -> Vec<&'static str> {
        self.tables.iter().map(|t| t.name).collect()
    }
}
