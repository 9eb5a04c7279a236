//! Error handling for stageload
//!
//! This module defines the error type shared by every stage of an export.
//! Variants follow the order in which a failure can occur: naming problems
//! are found before any I/O, configuration problems before any statement is
//! issued, and remote failures last.
//!
//! The module uses thiserror to minimize boilerplate code and create
//! a consistent error handling approach throughout the codebase.

use thiserror::Error;

/// StageError represents all possible errors that can occur in stageload
#[derive(Error, Debug)]
pub enum StageError {
    /// A column name collides with a warehouse reserved word
    #[error("column name '{column}' is a reserved word in the warehouse")]
    NameConflict { column: String },

    /// Two columns normalize to the same lowercase name
    #[error("column name '{column}' appears more than once after normalization")]
    DuplicateColumn { column: String },

    /// Invalid combination of options, layout hints or credentials
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The warehouse rejected a statement or the connection failed
    #[error("Warehouse error: {0}")]
    RemoteExecution(#[from] sqlx::Error),

    /// The object store rejected a transfer
    #[error("Object store error: {0}")]
    Transfer(#[from] object_store::Error),

    /// An object key could not be turned into a store path
    #[error("Invalid object key: {0}")]
    ObjectKey(#[from] object_store::path::Error),

    /// Error while encoding or decoding delimited data
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error during file system operations (local copies, CSV input)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A SQL script could not be split into statements
    #[error("SQL tokenizer error: {0}")]
    Tokenize(String),

    /// A row does not match the shape of its table
    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

impl From<sqlparser::tokenizer::TokenizerError> for StageError {
    fn from(err: sqlparser::tokenizer::TokenizerError) -> Self {
        StageError::Tokenize(err.to_string())
    }
}

/// Result type alias for operations that can produce a StageError
pub type StageResult<T> = std::result::Result<T, StageError>;
