//! Protocol constants. These are fixed for wire/consensus compatibility and
//! are never exposed through [`crate::config::NodeConfig`] — unlike the
//! ambient knobs there, changing one of these changes what the chain *is*.

/// Target seconds between blocks, used by the retarget calculation.
pub const BLOCK_TIME: u64 = 180;

/// Number of blocks between difficulty retargets.
pub const BLOCKS_COUNT: u64 = 500;

/// Difficulty assumed before the first retarget window closes, scaled x10 (60 == 6.0).
pub const START_DIFFICULTY_SCALED: u64 = 60;

/// Height at which the legacy/current hashrate conversion forms swap over.
///
/// Preserved verbatim per the source behavior: going difficulty -> hashrate
/// uses the legacy form for `id <= LEGACY_HASHRATE_CUTOVER`, while going
/// hashrate -> difficulty uses the legacy form for `id < LEGACY_HASHRATE_CUTOVER`.
/// The asymmetry is intentional, see DESIGN.md.
pub const LEGACY_HASHRATE_CUTOVER: u64 = 17_500;

/// Height at which the merkle construction switches from ordered to sorted.
pub const SORTED_MERKLE_CUTOVER: u64 = 22_500;

/// Chain-wide issuance cap, in whole coins scaled x1_000_000 (see [`crate::amount::Amount`]).
///
/// This is exactly the sum of [`crate::blockchain::reward::block_reward`] over
/// every 1-based height `n >= 1` at which the reward is nonzero; see the
/// `reward_sum_law` test. Summing from `n = 0` instead double-counts a height
/// that is never actually mined since block ids start at 1 — see DESIGN.md.
pub const MAX_SUPPLY: i64 = 30_061_905_000_000;

/// Upper bound on the sum of transaction hex-string lengths in a single block.
pub const MAX_BLOCK_SIZE_HEX: usize = 3_000_000;

/// Size, in hex-encoding bytes, of the reward halving era.
pub const REWARD_ERA_BLOCKS: u64 = 150_000;
