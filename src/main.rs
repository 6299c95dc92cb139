// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dedupe_lib::candidate_generation::{random_pairs, random_pairs_seeded};
use dedupe_lib::matching::ComparatorRegistry;
use dedupe_lib::models::{DataModel, DataModelConfig, IdentifiedPair, Record, RecordId};
use dedupe_lib::scoring::ParallelScorer;
use dedupe_lib::utils::env::load_env;
use dedupe_lib::utils::scoring_config::ScorerConfig;

#[derive(Parser)]
#[command(author, version, about = "Record-linkage pair sampling and scoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Draw unique candidate pairs from a population of items
    Sample {
        /// Number of items in the population
        #[arg(long)]
        items: u64,

        /// Number of pairs to draw
        #[arg(long)]
        size: usize,

        /// Seed for a reproducible sample
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the feature column layout of a data model
    Columns {
        /// Data model definition (JSON)
        #[arg(long)]
        model: PathBuf,
    },

    /// Score record pairs with a data model
    Score {
        /// Data model definition (JSON)
        #[arg(long)]
        model: PathBuf,

        /// Record pairs to score (JSON array)
        #[arg(long)]
        pairs: PathBuf,

        /// Parallel workers (defaults to SCORING_WORKERS or the CPU count)
        #[arg(long)]
        workers: Option<usize>,

        /// Pairs per chunk (defaults to SCORING_CHUNK_SIZE)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
}

/// One pair as read from the pairs file.
#[derive(Debug, Deserialize)]
struct PairInput {
    id_a: RecordId,
    id_b: RecordId,
    left: Record,
    right: Record,
}

#[derive(Serialize)]
struct SampledPairLine {
    i: u64,
    j: u64,
}

#[derive(Serialize)]
struct ColumnLine<'a> {
    index: usize,
    column: &'a str,
    weight: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    load_env();

    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match cli.command {
        Command::Sample { items, size, seed } => {
            let sample = match seed {
                Some(seed) => random_pairs_seeded(items, size, seed),
                None => random_pairs(items, size),
            }
            .context("Failed to sample pairs")?;
            info!(
                "Drew {} pairs from {} items (exhaustive: {})",
                sample.len(),
                items,
                sample.is_exhaustive()
            );
            for &(i, j) in sample.pairs() {
                write_line(&mut out, &SampledPairLine { i, j })?;
            }
        }
        Command::Columns { model } => {
            let model = load_model(&model)?;
            for (index, (column, weight)) in model
                .column_names()
                .iter()
                .zip(model.weights().iter())
                .enumerate()
            {
                write_line(
                    &mut out,
                    &ColumnLine {
                        index,
                        column,
                        weight: *weight,
                    },
                )?;
            }
        }
        Command::Score {
            model,
            pairs,
            workers,
            chunk_size,
        } => {
            let model = Arc::new(load_model(&model)?);
            let pairs = load_pairs(&pairs)?;

            let mut config = ScorerConfig::from_env();
            if let Some(workers) = workers {
                config.worker_count = workers;
            }
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size;
            }
            config.log_config();

            let scorer = ParallelScorer::new(model, config).context("Invalid scorer configuration")?;
            let run = scorer
                .run(futures::stream::iter(pairs), None)
                .await
                .context("Scoring run failed")?;
            for scored in &run.scores {
                write_line(&mut out, scored)?;
            }
            info!(
                "Run {} scored {} pairs in {:.2}s",
                run.summary.run_id, run.summary.pairs_scored, run.summary.elapsed_secs
            );
        }
    }

    out.flush().context("Failed to flush output")?;
    Ok(())
}

fn load_model(path: &Path) -> Result<DataModel> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file {}", path.display()))?;
    let config: DataModelConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse model file {}", path.display()))?;
    let model = DataModel::from_config(&config, &ComparatorRegistry::new())
        .context("Invalid data model")?;
    Ok(model)
}

fn load_pairs(path: &Path) -> Result<Vec<IdentifiedPair>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pairs file {}", path.display()))?;
    let inputs: Vec<PairInput> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse pairs file {}", path.display()))?;
    info!("Loaded {} pairs from {}", inputs.len(), path.display());
    Ok(inputs
        .into_iter()
        .map(|p| IdentifiedPair::new(p.id_a, p.left, p.id_b, p.right))
        .collect())
}

fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value).context("Failed to serialize output line")?;
    writeln!(out).context("Failed to write output")?;
    Ok(())
}
