// src/candidate_generation/random_pairs.rs
//
// Uniform sampling of distinct unordered index pairs without materialising
// the pair universe. Pairs are numbered row-major:
// (0,1), (0,2), ..., (0,n-1), (1,2), ...
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::SamplingError;
use crate::models::{IdentifiedPair, Record, RecordId, RecordPair};

/// Largest population accepted. Keeps `8 * T(n)` well inside `u128`.
pub const MAX_POPULATION: u64 = 1 << 48;

pub type IndexPair = (u64, u64);

/// Result of a sampling call. `Exhaustive` means the request covered the
/// whole universe and every pair was enumerated in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairSample {
    Sampled(Vec<IndexPair>),
    Exhaustive(Vec<IndexPair>),
}

impl PairSample {
    pub fn pairs(&self) -> &[IndexPair] {
        match self {
            PairSample::Sampled(pairs) | PairSample::Exhaustive(pairs) => pairs,
        }
    }

    pub fn into_pairs(self) -> Vec<IndexPair> {
        match self {
            PairSample::Sampled(pairs) | PairSample::Exhaustive(pairs) => pairs,
        }
    }

    pub fn is_exhaustive(&self) -> bool {
        matches!(self, PairSample::Exhaustive(_))
    }

    pub fn len(&self) -> usize {
        self.pairs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }
}

/// Number of unordered pairs among `n` items.
pub fn pair_count(n: u64) -> u128 {
    let n = n as u128;
    if n < 2 {
        0
    } else {
        n * (n - 1) / 2
    }
}

/// Linear index of `(i, j)`, `i < j < n`.
pub(crate) fn pair_index(n: u64, i: u64, j: u64) -> u128 {
    debug_assert!(i < j && j < n);
    row_offset(n, i) + (j - i - 1) as u128
}

/// Inverse of [`pair_index`]. `k` must be below `pair_count(n)`.
pub(crate) fn index_to_pair(n: u64, k: u128) -> IndexPair {
    let total = pair_count(n);
    debug_assert!(k < total);

    // Count pairs from the end: rows i..n hold T(n - i) pairs.
    let remaining = total - 1 - k;
    let m = (isqrt(8 * remaining + 1) - 1) / 2;
    let mut i = (n as u128).saturating_sub(2 + m) as u64;

    // Guard against any rounding in the row estimate.
    while i > 0 && row_offset(n, i) > k {
        i -= 1;
    }
    while i + 2 < n && row_offset(n, i + 1) <= k {
        i += 1;
    }

    let j = (k - row_offset(n, i)) as u64 + i + 1;
    debug_assert_eq!(pair_index(n, i, j), k);
    (i, j)
}

/// Draws `sample_size` distinct pairs from `n` items using a fresh OS-seeded RNG.
pub fn random_pairs(n: u64, sample_size: usize) -> Result<PairSample, SamplingError> {
    random_pairs_with_rng(n, sample_size, &mut StdRng::from_entropy())
}

/// Same as [`random_pairs`], reproducible for a given seed.
pub fn random_pairs_seeded(
    n: u64,
    sample_size: usize,
    seed: u64,
) -> Result<PairSample, SamplingError> {
    random_pairs_with_rng(n, sample_size, &mut StdRng::seed_from_u64(seed))
}

pub fn random_pairs_with_rng<R: Rng>(
    n: u64,
    sample_size: usize,
    rng: &mut R,
) -> Result<PairSample, SamplingError> {
    if n < 2 && sample_size > 0 {
        return Err(SamplingError::InvalidDomain { n, sample_size });
    }
    if n > MAX_POPULATION {
        return Err(SamplingError::PopulationTooLarge {
            n,
            max: MAX_POPULATION,
        });
    }

    let total = pair_count(n);
    if sample_size as u128 >= total {
        if (sample_size as u128) > total {
            warn!(
                "Requested {} pairs but only {} exist among {} items; returning all of them",
                sample_size, total, n
            );
        }
        return Ok(PairSample::Exhaustive(all_pairs(n)));
    }

    // Dense requests: draw indices without replacement instead of rejecting
    // an ever-growing share of repeats.
    if (sample_size as u128) * 2 > total {
        if let Ok(universe) = usize::try_from(total) {
            let pairs: Vec<IndexPair> = index::sample(rng, universe, sample_size)
                .into_iter()
                .map(|k| index_to_pair(n, k as u128))
                .collect();
            debug!(
                "Sampled {} of {} pairs from {} items without replacement",
                pairs.len(),
                total,
                n
            );
            return Ok(PairSample::Sampled(pairs));
        }
    }

    let mut seen: HashSet<u128> = HashSet::with_capacity(sample_size);
    let mut pairs = Vec::with_capacity(sample_size);
    let mut rejected = 0usize;
    while pairs.len() < sample_size {
        let k = rng.gen_range(0..total);
        if !seen.insert(k) {
            rejected += 1;
            continue;
        }
        pairs.push(index_to_pair(n, k));
    }

    debug!(
        "Sampled {} of {} pairs from {} items ({} duplicate draws rejected)",
        pairs.len(),
        total,
        n,
        rejected
    );
    Ok(PairSample::Sampled(pairs))
}

/// Looks up sampled indices in a record table. Indices outside the table are
/// skipped with a warning.
pub fn pairs_from_indices(
    records: &[(RecordId, Arc<Record>)],
    indices: &[IndexPair],
) -> Vec<IdentifiedPair> {
    indices
        .iter()
        .filter_map(|&(i, j)| {
            let left = records.get(usize::try_from(i).ok()?);
            let right = records.get(usize::try_from(j).ok()?);
            match (left, right) {
                (Some((id_a, a)), Some((id_b, b))) => Some(IdentifiedPair {
                    id_a: id_a.clone(),
                    id_b: id_b.clone(),
                    pair: RecordPair::new(Arc::clone(a), Arc::clone(b)),
                }),
                _ => {
                    warn!(
                        "Skipping pair ({}, {}): table only holds {} records",
                        i,
                        j,
                        records.len()
                    );
                    None
                }
            }
        })
        .collect()
}

fn all_pairs(n: u64) -> Vec<IndexPair> {
    let mut pairs = Vec::with_capacity(pair_count(n) as usize);
    for i in 0..n {
        for j in (i + 1)..n {
            pairs.push((i, j));
        }
    }
    pairs
}

/// Index of the first pair in row `i`: `T(n) - T(n - i)`.
fn row_offset(n: u64, i: u64) -> u128 {
    pair_count(n) - pair_count(n - i)
}

fn isqrt(value: u128) -> u128 {
    let mut root = (value as f64).sqrt() as u128;
    while root * root > value {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= value {
        root += 1;
    }
    root
}
