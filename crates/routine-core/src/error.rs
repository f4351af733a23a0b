//! Core error types for routine-core.
//!
//! Run transitions fail with [`RunError`]; everything that touches the disk
//! (config, templates, database) has its own enum, and [`CoreError`] wraps
//! them all for callers that don't care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::run::{RunStatus, TaskStatus};

/// Core error type for routine-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Run state machine errors
    #[error("Run error: {0}")]
    Run(#[from] RunError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Template loading errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by run transitions.
///
/// These are caller errors: the UI is expected to gate actions on the run's
/// state, so none of them is retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("Run has already been started (status: {status})")]
    AlreadyStarted { status: RunStatus },

    #[error("Run is not running (status: {status})")]
    NotRunning { status: RunStatus },

    #[error("Run is not paused (status: {status})")]
    NotPaused { status: RunStatus },

    #[error("Run has already finished (status: {status})")]
    RunFinished { status: RunStatus },

    #[error("Run has no active task")]
    NoActiveTask,

    #[error("Task '{task_id}' is not pending (status: {status})")]
    TaskNotPending { task_id: String, status: TaskStatus },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Subtask '{subtask_id}' not found in task '{task_id}'")]
    SubtaskNotFound { task_id: String, subtask_id: String },
}

impl RunError {
    /// True for the "operation addresses an id that isn't there" family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RunError::TaskNotFound(_) | RunError::SubtaskNotFound { .. }
        )
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

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Stored run could not be decoded
    #[error("Stored run is corrupt: {0}")]
    CorruptRun(#[from] serde_json::Error),
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

    /// Unknown key in a dot-path lookup
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// No usable config directory
    #[error("Could not determine data directory: {0}")]
    DataDir(String),
}

/// Template store errors.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read templates from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse templates in {path}: {message}")]
    ParseFailed { path: PathBuf, message: String },

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Duplicate template id: {0}")]
    DuplicateId(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_family() {
        assert!(RunError::TaskNotFound("t1".into()).is_not_found());
        assert!(RunError::SubtaskNotFound {
            task_id: "t1".into(),
            subtask_id: "s1".into(),
        }
        .is_not_found());
        assert!(!RunError::NoActiveTask.is_not_found());
    }

    #[test]
    fn run_error_messages_name_the_status() {
        let err = RunError::NotPaused {
            status: RunStatus::Running,
        };
        assert_eq!(err.to_string(), "Run is not paused (status: running)");
    }

    #[test]
    fn run_error_converts_into_core_error() {
        let core: CoreError = RunError::NoActiveTask.into();
        assert!(matches!(core, CoreError::Run(RunError::NoActiveTask)));
    }
}
