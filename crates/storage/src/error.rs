//! Storage error types

use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying database error
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    /// A dated table (or its template) could not be created
    #[error("failed to create table '{table}': {source}")]
    TableCreate {
        /// Table that failed
        table: String,
        /// Underlying database error
        #[source]
        source: sqlx::Error,
    },

    /// A quote envelope could not be serialized back to JSON
    #[error("failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}
