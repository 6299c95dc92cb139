// src/utils/env.rs
use log::{debug, info};

/// Loads a `.env` file from the working directory (or a parent) if present.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env file loaded: {}", e),
    }
}

/// Reads and parses an environment variable, falling back to `default` when
/// it is unset or unparsable.
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
