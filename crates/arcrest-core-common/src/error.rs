//! Errors raised by destination containers.

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while creating, inspecting or writing to a
/// destination container.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The parent directory of the container could not be created.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// The container could not be opened or initialised.
    #[error("Failed to open container '{path}': {source}")]
    Open {
        /// The container path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A table with the requested name is already present.
    #[error("Table '{table}' already exists")]
    TableExists {
        /// The table name
        table: String,
    },

    /// The requested table does not exist.
    #[error("Table '{table}' not found")]
    TableNotFound {
        /// The table name
        table: String,
    },

    /// A column type has no representation in the container.
    #[error("Column '{column}' has unsupported type {data_type}")]
    UnsupportedColumn {
        /// The column name
        column: String,
        /// Description of the Arrow data type
        data_type: String,
    },

    /// A batch does not match the table it is written to.
    #[error("Batch does not match table '{table}': {message}")]
    SchemaMismatch {
        /// The table name
        table: String,
        /// Description of the mismatch
        message: String,
    },

    /// A statement against the container failed.
    #[error("{operation} failed for '{target}': {source}")]
    Statement {
        /// The operation being performed (e.g., "insert", "create table")
        operation: String,
        /// The table or container the statement targeted
        target: String,
        /// The underlying error
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl StoreError {
    /// Wraps an underlying error as a failed statement.
    pub fn statement(
        operation: impl Into<String>,
        target: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Statement {
            operation: operation.into(),
            target: target.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias that uses [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_error_names_operation_and_target() {
        let err = StoreError::statement(
            "insert",
            "Roads",
            std::io::Error::other("disk I/O error"),
        );
        assert_eq!(err.to_string(), "insert failed for 'Roads': disk I/O error");
        assert!(err.source().is_some());
    }

    #[test]
    fn open_error_displays_path() {
        let err = StoreError::Open {
            path: PathBuf::from("/data/out.gpkg"),
            source: Box::new(std::io::Error::other("file is not a database")),
        };
        assert!(err.to_string().contains("/data/out.gpkg"));
        assert!(err.to_string().contains("file is not a database"));
    }
}
