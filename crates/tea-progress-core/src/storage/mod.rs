mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, DatabaseConfig};
pub use database::Database;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/tea-progress[-dev]/` based on TEA_PROGRESS_ENV.
///
/// Set TEA_PROGRESS_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .ok_or(ConfigError::NoDataDir)?
        .join(".config");

    let env = std::env::var("TEA_PROGRESS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tea-progress-dev")
    } else {
        base_dir.join("tea-progress")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
