//! Reviewer selection
//!
//! Selection is a Fisher–Yates shuffle of the candidate pool truncated to the
//! requested cap. The shuffle draws indices from a [`RandomSource`]; production
//! code uses the operating system CSPRNG and tests inject a seeded generator.

use std::sync::{Arc, Mutex};

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, RngCore, SeedableRng};

use crate::{Error, Result};

/// Source of uniformly distributed indices
pub trait RandomSource: Send + Sync {
    /// Return a uniformly distributed index in `0..upper`
    ///
    /// `upper` must be non-zero.
    fn index_below(&self, upper: usize) -> Result<usize>;
}

/// Operating system CSPRNG
///
/// Fails closed: if the OS source cannot produce bytes the draw returns
/// [`Error::Unavailable`] instead of falling back to a weaker generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn index_below(&self, upper: usize) -> Result<usize> {
        if upper == 0 {
            return Err(Error::Unavailable(
                "cannot draw an index from an empty range".to_string(),
            ));
        }

        let upper = upper as u64;
        // Values below 2^64 mod upper would bias the low residues.
        let threshold = upper.wrapping_neg() % upper;
        let mut rng = OsRng;

        loop {
            let mut buf = [0u8; 8];
            rng.try_fill_bytes(&mut buf).map_err(|e| {
                Error::Unavailable(format!("secure random source failed: {}", e))
            })?;

            let value = u64::from_le_bytes(buf);
            if value >= threshold {
                return Ok((value % upper) as usize);
            }
        }
    }
}

/// Deterministic generator for tests and reproducible tooling
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn index_below(&self, upper: usize) -> Result<usize> {
        if upper == 0 {
            return Err(Error::Unavailable(
                "cannot draw an index from an empty range".to_string(),
            ));
        }

        let mut rng = self
            .rng
            .lock()
            .map_err(|_| Error::Unavailable("seeded random source poisoned".to_string()))?;
        Ok(rng.gen_range(0..upper))
    }
}

/// Pick up to `cap` elements of `candidates` uniformly at random
///
/// Every permutation of the pool is equally likely, so every candidate is
/// picked with probability `cap / len`. An empty pool yields an empty result.
pub fn select<T: Clone>(candidates: &[T], cap: usize, rng: &dyn RandomSource) -> Result<Vec<T>> {
    let mut pool = candidates.to_vec();

    for i in (1..pool.len()).rev() {
        let j = rng.index_below(i + 1)?;
        pool.swap(i, j);
    }

    pool.truncate(cap);
    Ok(pool)
}

/// Reviewer selector bound to a random source
#[derive(Clone)]
pub struct ReviewerSelector {
    rng: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for ReviewerSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewerSelector").finish_non_exhaustive()
    }
}

impl Default for ReviewerSelector {
    fn default() -> Self {
        Self::secure()
    }
}

impl ReviewerSelector {
    /// Selector backed by the OS CSPRNG
    pub fn secure() -> Self {
        Self::with_source(Arc::new(OsRandom))
    }

    /// Selector backed by a seeded generator
    pub fn seeded(seed: u64) -> Self {
        Self::with_source(Arc::new(SeededRandom::new(seed)))
    }

    pub fn with_source(rng: Arc<dyn RandomSource>) -> Self {
        Self { rng }
    }

    /// Pick up to `cap` candidates
    pub fn select<T: Clone>(&self, candidates: &[T], cap: usize) -> Result<Vec<T>> {
        select(candidates, cap, self.rng.as_ref())
    }

    /// Pick exactly one candidate, or `None` for an empty pool
    pub fn pick_one<T: Clone>(&self, candidates: &[T]) -> Result<Option<T>> {
        Ok(self.select(candidates, 1)?.into_iter().next())
    }
}
