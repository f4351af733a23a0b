mod config;
pub mod database;
pub mod templates;

pub use config::{Config, DefaultsConfig, SpeechConfig};
pub use database::{Database, RunRecord, RunStats};
pub use templates::TemplateStore;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/routine-runner[-dev]/` based on ROUTINE_RUNNER_ENV.
///
/// Set ROUTINE_RUNNER_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("ROUTINE_RUNNER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("routine-runner-dev")
    } else {
        base_dir.join("routine-runner")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
