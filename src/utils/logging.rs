// src/utils/logging.rs - Logging helpers for scoring runs
use log::{debug, error, info, warn};
use std::time::Instant;
use uuid::Uuid;

#[derive(Clone)]
pub struct ScoringLogger {
    run_id: Uuid,
    start_time: Instant,
}

impl ScoringLogger {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            start_time: Instant::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn log_start(&self, worker_count: usize, chunk_size: usize, dimension: usize) {
        info!(
            "[SCORING] 🚀 Starting run {} ({} workers, {} pairs per chunk, {} features)",
            self.run_id, worker_count, chunk_size, dimension
        );
    }

    pub fn log_chunk_done(&self, chunk_index: usize, pairs: usize) {
        debug!(
            "[SCORING] ✅ Chunk {} scored ({} pairs) [+{:.1}s]",
            chunk_index,
            pairs,
            self.start_time.elapsed().as_secs_f32()
        );
    }

    pub fn log_chunk_failed(&self, chunk_index: usize, cause: &str) {
        error!(
            "[SCORING] ❌ Chunk {} failed: {} [+{:.1}s]",
            chunk_index,
            cause,
            self.start_time.elapsed().as_secs_f32()
        );
    }

    pub fn log_draining(&self, in_flight: usize) {
        if in_flight > 0 {
            warn!(
                "[SCORING] ⏳ Draining {} in-flight chunks; their results will be discarded",
                in_flight
            );
        }
    }

    pub fn log_cancelled(&self, chunks_completed: usize) {
        warn!(
            "[SCORING] ⏹️  Run {} cancelled after {} chunks",
            self.run_id, chunks_completed
        );
    }

    pub fn log_complete(&self, pairs: usize, chunks: usize) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            pairs as f64 / elapsed
        } else {
            0.0
        };
        info!(
            "[SCORING] 🏁 Run {} complete: {} pairs in {} chunks, {:.2}s ({:.0} pairs/s)",
            self.run_id, pairs, chunks, elapsed, rate
        );
    }
}
