//! Transaction merkle root.
//!
//! Both constructions below are a single-level hash of concatenated leaf
//! digests, not a binary tree — the format changed at height 22500 by
//! sorting the leaves first, nothing more.

use crate::crypto::hash::{sha256_hex, sha256_raw};

/// Ordered merkle root: leaves are hashed in the order they appear in the block.
/// Used for blocks with id < [`crate::constants::SORTED_MERKLE_CUTOVER`].
pub fn ordered_root<'a>(tx_hexes: impl Iterator<Item = &'a str>) -> String {
    let mut bytes = Vec::new();
    for hex_str in tx_hexes {
        let decoded = hex::decode(hex_str).unwrap_or_default();
        bytes.extend_from_slice(&sha256_raw(&decoded));
    }
    sha256_hex(&bytes)
}

/// Sorted merkle root: the decoded transaction bytes are sorted
/// lexicographically before hashing. Used for blocks with id >=
/// [`crate::constants::SORTED_MERKLE_CUTOVER`].
pub fn sorted_root<'a>(tx_hexes: impl Iterator<Item = &'a str>) -> String {
    let mut decoded: Vec<Vec<u8>> = tx_hexes.map(|h| hex::decode(h).unwrap_or_default()).collect();
    decoded.sort();
    let mut bytes = Vec::new();
    for tx_bytes in &decoded {
        bytes.extend_from_slice(&sha256_raw(tx_bytes));
    }
    sha256_hex(&bytes)
}

/// Picks the construction appropriate for `block_id` per the height cutover.
pub fn root_for_height<'a>(block_id: u64, tx_hexes: impl Iterator<Item = &'a str>) -> String {
    if block_id < crate::constants::SORTED_MERKLE_CUTOVER {
        ordered_root(tx_hexes)
    } else {
        sorted_root(tx_hexes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_root_is_order_sensitive() {
        let a = ordered_root(vec!["aa", "bb"].into_iter());
        let b = ordered_root(vec!["bb", "aa"].into_iter());
        assert_ne!(a, b);
    }

    #[test]
    fn sorted_root_is_order_insensitive() {
        let a = sorted_root(vec!["aa", "bb"].into_iter());
        let b = sorted_root(vec!["bb", "aa"].into_iter());
        assert_eq!(a, b);
    }

    #[test]
    fn ordered_and_sorted_differ_for_unsorted_input() {
        let a = ordered_root(vec!["bb", "aa"].into_iter());
        let b = sorted_root(vec!["bb", "aa"].into_iter());
        assert_ne!(a, b);
    }

    #[test]
    fn cutover_picks_ordered_below_threshold() {
        let txs = vec!["bb", "aa"];
        let at_boundary_minus_one = root_for_height(22_499, txs.clone().into_iter());
        assert_eq!(at_boundary_minus_one, ordered_root(txs.into_iter()));
    }

    #[test]
    fn cutover_picks_sorted_at_threshold() {
        let txs = vec!["bb", "aa"];
        let at_boundary = root_for_height(22_500, txs.clone().into_iter());
        assert_eq!(at_boundary, sorted_root(txs.into_iter()));
    }

    #[test]
    fn empty_transaction_list_hashes_consistently() {
        let empty: Vec<&str> = vec![];
        assert_eq!(ordered_root(empty.clone().into_iter()), sha256_hex(b""));
        assert_eq!(sorted_root(empty.into_iter()), sha256_hex(b""));
    }
}
