pub mod catalog;
pub mod child;
pub mod config;
pub mod progress;
pub mod session;

use serde::Serialize;
use tea_progress_core::{Config, CoreError, ProgressionEngine};

/// Engine over the configured store.
pub fn open_engine() -> Result<ProgressionEngine, CoreError> {
    let config = Config::load()?;
    ProgressionEngine::open(config)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
