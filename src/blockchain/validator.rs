//! Block Validator: orchestrates the codec, PoW, merkle and transaction
//! checks into the single `validate` entry point the node calls for every
//! candidate block.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;

use crate::amount::Difficulty;
use crate::blockchain::transaction::Transaction;
use crate::codec::BlockHeader;
use crate::consensus::pow;
use crate::crypto::hash::sha256_hex;
use crate::crypto::merkle;
use crate::constants::MAX_BLOCK_SIZE_HEX;
use crate::error::{CoreError, CoreResult};
use crate::storage::{BlockRecord, OutputRef, Storage};

/// A block that has passed every check in [`validate`], ready for
/// [`crate::blockchain::chain::ChainWriter::commit`].
pub struct ValidatedBlock {
    pub header: BlockHeader,
    pub block_hash: String,
    pub new_id: u64,
    pub transactions: Vec<Arc<dyn Transaction>>,
}

fn dedup_sorted(mut refs: Vec<OutputRef>) -> Vec<OutputRef> {
    refs.sort_by(|a, b| (a.tx_hash.as_str(), a.index).cmp(&(b.tx_hash.as_str(), b.index)));
    refs.dedup();
    refs
}

/// Validate a candidate block against the current chain tip and difficulty.
///
/// `transactions` being a typed `Vec<Arc<dyn Transaction>>` already excludes
/// anything that isn't a transaction — there is no separate "drop raw
/// strings" step to perform here, the type system did it at the call site.
pub async fn validate(
    storage: &dyn Storage,
    header_bytes: &[u8],
    transactions: Vec<Arc<dyn Transaction>>,
    snapshot: (Difficulty, Option<BlockRecord>),
) -> CoreResult<ValidatedBlock> {
    let header = BlockHeader::deserialize(header_bytes)?;
    let candidate_hash = sha256_hex(header_bytes);
    let (difficulty, last_block) = snapshot;

    let prev_hash_hex = last_block.as_ref().map(|b| b.hash.as_str());
    if !pow::check(&candidate_hash, prev_hash_hex, difficulty) {
        return Err(CoreError::PowInsufficient);
    }

    if let Some(last) = &last_block {
        if hex::encode(header.previous_hash) != last.hash {
            return Err(CoreError::PreviousHashMismatch);
        }
    }

    if header.difficulty_scaled as u64 != difficulty.scaled() {
        return Err(CoreError::DifficultyMismatch);
    }

    let last_timestamp = last_block.as_ref().map(|b| b.timestamp).unwrap_or(0);
    if header.timestamp < last_timestamp {
        return Err(CoreError::TimestampRegression);
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32;
    if header.timestamp > now {
        return Err(CoreError::TimestampFuture);
    }

    let hex_total: usize = transactions.iter().map(|t| t.hex().len()).sum();
    if hex_total > MAX_BLOCK_SIZE_HEX {
        return Err(CoreError::BlockTooLarge);
    }

    let mut parents: HashMap<String, Arc<dyn Transaction>> = HashMap::new();
    if !transactions.is_empty() {
        let queried: Vec<OutputRef> = transactions
            .iter()
            .flat_map(|tx| {
                tx.inputs().iter().map(|i| OutputRef {
                    tx_hash: i.tx_hash.clone(),
                    index: i.index,
                })
            })
            .collect();

        let present = storage.get_unspent_outputs(&queried).await?;
        if dedup_sorted(present) != dedup_sorted(queried.clone()) {
            return Err(CoreError::UtxoMissingOrDoubleSpent);
        }

        let parent_hashes: Vec<String> = {
            let set: HashSet<String> = queried.iter().map(|o| o.tx_hash.clone()).collect();
            set.into_iter().collect()
        };
        parents = storage.get_transactions(&parent_hashes).await?;
    }

    let tx_for_blocking = transactions.clone();
    let parents_for_blocking = parents.clone();
    let verify_results = tokio::task::spawn_blocking(move || {
        tx_for_blocking
            .par_iter()
            .map(|tx| {
                let resolved = tx.resolve_inputs(&parents_for_blocking);
                let ok = tx.verify(&resolved, false);
                (ok, resolved)
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| CoreError::StorageFailure(format!("validation task panicked: {e}")))?;

    let mut used_inputs: HashSet<OutputRef> = HashSet::new();
    for (tx, (ok, resolved)) in transactions.iter().zip(verify_results.iter()) {
        if !*ok {
            return Err(CoreError::TransactionVerifyFailed);
        }
        for r in resolved {
            let key = OutputRef {
                tx_hash: r.input.tx_hash.clone(),
                index: r.input.index,
            };
            if !used_inputs.insert(key) {
                let _ = storage.remove_pending_transaction(&tx.hash()).await;
                return Err(CoreError::IntraBlockDoubleSpend);
            }
        }
    }

    let new_id = last_block.as_ref().map(|b| b.id + 1).unwrap_or(1);
    let tx_hexes: Vec<&str> = transactions.iter().map(|t| t.hex()).collect();
    let recomputed = merkle::root_for_height(new_id, tx_hexes.into_iter());
    if recomputed != hex::encode(header.merkle_root) {
        return Err(CoreError::MerkleMismatch);
    }

    Ok(ValidatedBlock {
        header,
        block_hash: candidate_hash,
        new_id,
        transactions,
    })
}
