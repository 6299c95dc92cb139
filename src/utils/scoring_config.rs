// src/utils/scoring_config.rs
use log::info;
use once_cell::sync::Lazy;

use crate::utils::env::env_or;
use crate::utils::progress_config::ProgressConfig;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

static DEFAULT_WORKER_COUNT: Lazy<usize> = Lazy::new(|| num_cpus::get().max(1));

/// Runtime tunables of the parallel scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerConfig {
    /// Number of chunks scored concurrently
    pub worker_count: usize,
    /// Pairs per chunk
    pub chunk_size: usize,
    pub progress: ProgressConfig,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            worker_count: *DEFAULT_WORKER_COUNT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: ProgressConfig::default(),
        }
    }
}

impl ScorerConfig {
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Reads `SCORING_WORKERS`, `SCORING_CHUNK_SIZE` and `SCORING_PROGRESS`.
    pub fn from_env() -> Self {
        let mut progress = ProgressConfig::from_env();
        progress.enabled = env_or("SCORING_PROGRESS", progress.enabled);
        Self {
            worker_count: env_or("SCORING_WORKERS", *DEFAULT_WORKER_COUNT),
            chunk_size: env_or("SCORING_CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
            progress,
        }
    }

    pub fn log_config(&self) {
        info!("⚙️  Scoring configuration");
        info!("   Workers: {}", self.worker_count);
        info!("   Chunk size: {} pairs", self.chunk_size);
        info!(
            "   Progress bar: {}",
            if self.progress.enabled { "enabled" } else { "disabled" }
        );
    }
}
