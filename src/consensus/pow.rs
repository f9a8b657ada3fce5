//! Proof-of-work acceptance test.
//!
//! The target is not a leading-zero-bits threshold like Bitcoin's; it's a
//! suffix-match against the previous block's hash, with an optional
//! fractional hex-digit constraint on the digit right after the matched
//! run. See [`crate::consensus::difficulty`] for how `difficulty` is derived.

const HEX_ALPHABET: &[u8] = b"0123456789abcdef";

/// `true` iff `candidate_hash` satisfies the PoW target implied by
/// `previous_hash` and `difficulty`. `previous_hash` is `None` only for the
/// very first block, which always passes.
pub fn check(candidate_hash: &str, previous_hash: Option<&str>, difficulty: crate::amount::Difficulty) -> bool {
    let previous_hash = match previous_hash {
        None => return true,
        Some(h) => h,
    };

    let whole_digits = difficulty.integer_part() as usize;
    let frac_tenths = difficulty.fractional_part();

    if whole_digits > previous_hash.len() {
        return false;
    }
    let suffix = &previous_hash[previous_hash.len() - whole_digits..];
    if !candidate_hash.starts_with(suffix) {
        return false;
    }

    if frac_tenths == 0 {
        return true;
    }

    let decimal = frac_tenths as f64 / 10.0;
    let count = (16.0 * (1.0 - decimal)).ceil() as usize;
    let allowed = &HEX_ALPHABET[..count.min(HEX_ALPHABET.len())];

    match candidate_hash.as_bytes().get(whole_digits) {
        Some(byte) => allowed.contains(byte),
        None => false,
    }
}
