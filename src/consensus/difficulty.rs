//! Difficulty↔hashrate conversions and the retarget rule.
//!
//! Two conversion forms exist side by side because the height at which the
//! chain switched forms differs depending on which direction you're
//! converting — see [`crate::constants::LEGACY_HASHRATE_CUTOVER`]. Do not
//! "fix" the asymmetry; it is load-bearing for historical blocks.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::amount::Difficulty;
use crate::constants::{BLOCKS_COUNT, BLOCK_TIME, LEGACY_HASHRATE_CUTOVER, START_DIFFICULTY_SCALED};
use crate::error::{CoreError, CoreResult};
use crate::storage::{BlockRecord, Storage};

/// Relative tolerance used when checking whether a hashrate is an exact
/// power of 16. An arbitrary-precision integer comparison would be exact;
/// here we're in `f64` so an exact equality test would be fragile.
const EXACT_POWER_EPSILON: f64 = 1e-9;

pub fn difficulty_to_hashrate_old(difficulty: Difficulty) -> f64 {
    let exponent = difficulty.integer_part();
    let frac_tenths = difficulty.fractional_part();
    let decimal = if frac_tenths == 0 { 1.0 / 16.0 } else { frac_tenths as f64 / 10.0 };
    16f64.powi(exponent as i32) * (16.0 * decimal)
}

pub fn difficulty_to_hashrate(difficulty: Difficulty) -> f64 {
    let exponent = difficulty.integer_part();
    let frac_tenths = difficulty.fractional_part();
    let decimal = frac_tenths as f64 / 10.0;
    16f64.powi(exponent as i32) * (16.0 / (16.0 * (1.0 - decimal)).ceil())
}

fn log16_floor(hashrate: f64) -> (u64, f64) {
    let exponent = (hashrate.ln() / 16f64.ln()).floor();
    let exponent_u = exponent.max(0.0) as u64;
    let power = 16f64.powi(exponent_u as i32);
    (exponent_u, power)
}

pub fn hashrate_to_difficulty_old(hashrate: f64) -> Difficulty {
    let (exponent, power) = log16_floor(hashrate);
    if (hashrate - power).abs() < power * EXACT_POWER_EPSILON {
        return Difficulty::from_scaled(exponent * 10);
    }
    let frac = (hashrate / power) / 16.0;
    Difficulty::truncate_from_f64(exponent as f64 + frac)
}

pub fn hashrate_to_difficulty(hashrate: f64) -> Difficulty {
    let (exponent, power) = log16_floor(hashrate);
    if (hashrate - power).abs() < power * EXACT_POWER_EPSILON {
        return Difficulty::from_scaled(exponent * 10);
    }
    let ratio = hashrate / power;
    let x = 16.0 / ratio / 16.0;
    let x = 1.0 - (x * 10.0).floor() / 10.0;
    Difficulty::truncate_from_f64(exponent as f64 + x)
}

/// Run the retarget rule against current storage state. Returns the
/// difficulty in effect for the next block along with the block it was
/// computed from (`None` only for the very first block ever).
pub async fn calculate_difficulty(
    storage: &dyn Storage,
) -> CoreResult<(Difficulty, Option<BlockRecord>)> {
    let last_block = match storage.get_last_block().await? {
        None => return Ok((Difficulty::from_scaled(START_DIFFICULTY_SCALED), None)),
        Some(b) => b,
    };

    if last_block.id < BLOCKS_COUNT {
        return Ok((Difficulty::from_scaled(START_DIFFICULTY_SCALED), Some(last_block)));
    }

    if last_block.id % BLOCKS_COUNT != 0 {
        let difficulty = last_block.difficulty;
        return Ok((difficulty, Some(last_block)));
    }

    let anchor = storage
        .get_block_by_id(last_block.id - BLOCKS_COUNT + 1)
        .await?
        .ok_or_else(|| CoreError::StorageFailure("missing retarget anchor block".to_string()))?;

    let elapsed = last_block.timestamp.saturating_sub(anchor.timestamp) as f64;
    let average_per_block = elapsed / BLOCKS_COUNT as f64;

    let hashrate = if last_block.id <= LEGACY_HASHRATE_CUTOVER {
        difficulty_to_hashrate_old(last_block.difficulty)
    } else {
        difficulty_to_hashrate(last_block.difficulty)
    };

    let ratio = BLOCK_TIME as f64 / average_per_block;
    let hashrate = hashrate * ratio;

    let new_difficulty = if last_block.id < LEGACY_HASHRATE_CUTOVER {
        hashrate_to_difficulty_old(hashrate)
    } else {
        hashrate_to_difficulty(hashrate)
    };
    let new_difficulty = Difficulty::truncate_from_f64(new_difficulty.as_f64());

    Ok((new_difficulty, Some(last_block)))
}

/// Process-wide cache of the current `(difficulty, last_block)` pair.
///
/// A single `ArcSwapOption` so reads never block a concurrent invalidation;
/// the cache is populated lazily on first read after an invalidation.
#[derive(Default)]
pub struct DifficultyCache {
    inner: ArcSwapOption<(Difficulty, Option<BlockRecord>)>,
}

impl DifficultyCache {
    pub fn new() -> Self {
        Self {
            inner: ArcSwapOption::from(None),
        }
    }

    /// Drop the cached value. The next call to [`Self::get`] recomputes it.
    pub fn invalidate(&self) {
        self.inner.store(None);
    }

    pub async fn get(&self, storage: &dyn Storage) -> CoreResult<(Difficulty, Option<BlockRecord>)> {
        if let Some(cached) = self.inner.load_full() {
            return Ok((*cached).clone());
        }
        let computed = calculate_difficulty(storage).await?;
        self.inner.store(Some(Arc::new(computed.clone())));
        Ok(computed)
    }
}
