// src/utils/progress_config.rs

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::utils::env::env_or;

/// Configuration for progress tracking during scoring runs
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressConfig {
    /// Whether to show a progress bar at all
    pub enabled: bool,
    /// Refresh rate for the spinner in milliseconds
    pub refresh_rate_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            refresh_rate_ms: 100,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_or("PROGRESS_ENABLED", defaults.enabled),
            refresh_rate_ms: env_or("PROGRESS_REFRESH_RATE_MS", defaults.refresh_rate_ms),
        }
    }

    /// Spinner counting scored chunks. The input may be an unbounded stream,
    /// so there is no known length. Hidden when progress is disabled.
    pub fn create_chunk_bar(&self) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} chunks scored {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(self.refresh_rate_ms.max(10)));
        pb
    }
}
