//! Core error types for tea-progress-core.
//!
//! The engine distinguishes missing entities, rejected input and store
//! failures. "Not enough data" is never an error; the algorithms degrade to
//! neutral values instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::tier::Tier;

/// Core error type for tea-progress-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Referenced child, activity or row does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Input rejected before any state change
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn child_not_found(id: i64) -> Self {
        CoreError::NotFound { entity: "child", id }
    }

    pub fn activity_not_found(id: i64) -> Self {
        CoreError::NotFound { entity: "activity", id }
    }

    /// True for input errors the caller can fix.
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored value could not be decoded
    #[error("Corrupt value in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home/config directory could not be resolved
    #[error("Could not resolve data directory")]
    NoDataDir,
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Tier name outside the progression ladder
    #[error("Invalid tier '{0}'")]
    InvalidTier(String),

    /// Category name outside the fixed skill set
    #[error("Invalid category '{0}'")]
    InvalidCategory(String),

    /// Starting tier can only be set before the first completed activity
    #[error("Initial tier cannot be changed after {completed} completed activities")]
    InitialTierLocked { completed: u32 },

    /// Starting tier can be configured exactly once
    #[error("Initial tier was already configured as '{0}'")]
    InitialTierAlreadyConfigured(Tier),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity() {
        let err = CoreError::child_not_found(42);
        assert_eq!(err.to_string(), "child 42 not found");
        assert!(!err.is_validation());
    }

    #[test]
    fn validation_converts_into_core_error() {
        let err: CoreError = ValidationError::InitialTierLocked { completed: 3 }.into();
        assert!(err.is_validation());
        assert!(err.to_string().contains("3 completed activities"));
    }

    #[test]
    fn busy_sqlite_maps_to_locked() {
        let raw = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(DatabaseError::from(raw), DatabaseError::Locked));
    }
}
