// src/scoring/scorer.rs
//
// Chunked, data-parallel scoring of record pairs. Each chunk is turned into a
// feature matrix and pushed through the logistic model on the blocking pool;
// the model itself is shared read-only behind an `Arc`.
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

use crate::errors::{FeatureError, ScoringError};
use crate::matching::features::build_features;
use crate::models::{DataModel, IdentifiedPair, RecordId};
use crate::scoring::logistic::predict_probabilities;
use crate::utils::logging::ScoringLogger;
use crate::utils::scoring_config::ScorerConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPair {
    pub id_a: RecordId,
    pub id_b: RecordId,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoringSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub pairs_scored: usize,
    pub chunks: usize,
    pub worker_count: usize,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone)]
pub struct ScoringRun {
    pub summary: ScoringSummary,
    pub scores: Vec<ScoredPair>,
}

// (chunk index, chunk length, scores or failure cause)
type ChunkOutcome = (usize, usize, Result<Vec<ScoredPair>, String>);

pub struct ParallelScorer {
    model: Arc<DataModel>,
    config: ScorerConfig,
}

impl ParallelScorer {
    pub fn new(model: Arc<DataModel>, config: ScorerConfig) -> Result<Self, ScoringError> {
        if config.worker_count == 0 {
            return Err(ScoringError::NoWorkers);
        }
        if config.chunk_size == 0 {
            return Err(ScoringError::EmptyChunkSize);
        }
        Ok(Self { model, config })
    }

    pub fn model(&self) -> &Arc<DataModel> {
        &self.model
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Scores every pair. Output order is unspecified.
    pub async fn score<I>(&self, pairs: I) -> Result<Vec<ScoredPair>, ScoringError>
    where
        I: IntoIterator<Item = IdentifiedPair>,
    {
        Ok(self.run(stream::iter(pairs), None).await?.scores)
    }

    /// Scores a (possibly unbounded) stream of pairs.
    pub async fn score_stream<S>(&self, pairs: S) -> Result<Vec<ScoredPair>, ScoringError>
    where
        S: Stream<Item = IdentifiedPair>,
    {
        Ok(self.run(pairs, None).await?.scores)
    }

    /// Like `score`, but stops early once `cancel` is raised.
    pub async fn score_with_cancel<I>(
        &self,
        pairs: I,
        cancel: Arc<AtomicBool>,
    ) -> Result<Vec<ScoredPair>, ScoringError>
    where
        I: IntoIterator<Item = IdentifiedPair>,
    {
        Ok(self.run(stream::iter(pairs), Some(&*cancel)).await?.scores)
    }

    /// Full scoring run with an optional cancellation flag.
    ///
    /// At most `worker_count` chunks are in flight at any time. When a chunk
    /// fails, or the flag is raised, no further chunks are dispatched; chunks
    /// already running are awaited and their results discarded, so no worker
    /// outlives the call and no partial result set is returned.
    pub async fn run<S>(
        &self,
        pairs: S,
        cancel: Option<&AtomicBool>,
    ) -> Result<ScoringRun, ScoringError>
    where
        S: Stream<Item = IdentifiedPair>,
    {
        let logger = ScoringLogger::new(Uuid::new_v4());
        let started_at = Utc::now();
        let started = Instant::now();
        logger.log_start(
            self.config.worker_count,
            self.config.chunk_size,
            self.model.dimension(),
        );
        let pb = self.config.progress.create_chunk_bar();

        let chunks = pairs.chunks(self.config.chunk_size).enumerate();
        futures::pin_mut!(chunks);

        let mut workers: JoinSet<ChunkOutcome> = JoinSet::new();
        let mut scores = Vec::new();
        let mut chunks_completed = 0usize;
        let mut failure: Option<ScoringError> = None;
        let mut cancelled = false;

        while let Some((chunk_index, chunk)) = chunks.next().await {
            if workers.len() >= self.config.worker_count {
                if let Some(joined) = workers.join_next().await {
                    match absorb(joined, &logger) {
                        Ok(batch) => {
                            chunks_completed += 1;
                            pb.inc(1);
                            scores.extend(batch);
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
            }
            if cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
                cancelled = true;
                break;
            }

            let model = Arc::clone(&self.model);
            workers.spawn_blocking(move || score_chunk_guarded(&model, chunk_index, chunk));
        }

        let stopping_early = failure.is_some() || cancelled;
        if stopping_early {
            logger.log_draining(workers.len());
        }
        while let Some(joined) = workers.join_next().await {
            match absorb(joined, &logger) {
                Ok(batch) => {
                    chunks_completed += 1;
                    pb.inc(1);
                    if !stopping_early {
                        scores.extend(batch);
                    }
                }
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        pb.finish_and_clear();

        if let Some(e) = failure {
            return Err(e);
        }
        if cancelled {
            logger.log_cancelled(chunks_completed);
            return Err(ScoringError::Cancelled { chunks_completed });
        }

        logger.log_complete(scores.len(), chunks_completed);
        Ok(ScoringRun {
            summary: ScoringSummary {
                run_id: logger.run_id(),
                started_at,
                pairs_scored: scores.len(),
                chunks: chunks_completed,
                worker_count: self.config.worker_count,
                elapsed_secs: started.elapsed().as_secs_f64(),
            },
            scores,
        })
    }
}

/// Scores one chunk on the calling thread.
pub fn score_chunk(
    model: &DataModel,
    chunk: Vec<IdentifiedPair>,
) -> Result<Vec<ScoredPair>, FeatureError> {
    let mut ids = Vec::with_capacity(chunk.len());
    let mut pairs = Vec::with_capacity(chunk.len());
    for identified in chunk {
        ids.push((identified.id_a, identified.id_b));
        pairs.push(identified.pair);
    }

    let features = build_features(&pairs, model)?;
    let probabilities = predict_probabilities(model, &features);

    Ok(ids
        .into_iter()
        .zip(probabilities)
        .map(|((id_a, id_b), probability)| ScoredPair {
            id_a,
            id_b,
            probability,
        })
        .collect())
}

/// Async entry point: scores `pairs` with `worker_count` parallel workers on
/// the current runtime.
pub async fn score_duplicates<I>(
    pairs: I,
    model: Arc<DataModel>,
    worker_count: usize,
) -> Result<Vec<ScoredPair>, ScoringError>
where
    I: IntoIterator<Item = IdentifiedPair>,
{
    ParallelScorer::new(model, ScorerConfig::with_workers(worker_count))?
        .score(pairs)
        .await
}

/// Synchronous entry point. Starts a runtime whose blocking pool holds exactly
/// `worker_count` threads, scores the pairs and shuts the runtime down before
/// returning. Called from inside another tokio runtime it fails with
/// `NestedRuntime`.
pub fn score_duplicates_blocking<I>(
    pairs: I,
    model: Arc<DataModel>,
    worker_count: usize,
) -> Result<Vec<ScoredPair>, ScoringError>
where
    I: IntoIterator<Item = IdentifiedPair>,
{
    if worker_count == 0 {
        return Err(ScoringError::NoWorkers);
    }
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(ScoringError::NestedRuntime);
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(worker_count)
        .thread_name("dedupe-scoring")
        .enable_all()
        .build()?;
    let result = runtime.block_on(score_duplicates(pairs, model, worker_count));
    drop(runtime);
    result
}

fn score_chunk_guarded(
    model: &DataModel,
    chunk_index: usize,
    chunk: Vec<IdentifiedPair>,
) -> ChunkOutcome {
    let chunk_len = chunk.len();
    let outcome = match catch_unwind(AssertUnwindSafe(|| score_chunk(model, chunk))) {
        Ok(Ok(scores)) => Ok(scores),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(payload)),
    };
    (chunk_index, chunk_len, outcome)
}

fn absorb(
    joined: Result<ChunkOutcome, JoinError>,
    logger: &ScoringLogger,
) -> Result<Vec<ScoredPair>, ScoringError> {
    match joined {
        Ok((chunk_index, chunk_len, Ok(scores))) => {
            logger.log_chunk_done(chunk_index, chunk_len);
            Ok(scores)
        }
        Ok((chunk_index, chunk_len, Err(cause))) => {
            logger.log_chunk_failed(chunk_index, &cause);
            Err(ScoringError::WorkerFailure {
                chunk_index,
                chunk_len,
                cause,
            })
        }
        Err(e) => Err(ScoringError::WorkerLost(e.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", msg)
    } else {
        "worker panicked".to_string()
    }
}
