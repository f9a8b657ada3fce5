//! Mempool Janitor: a fixed-point sweep that evicts pending transactions
//! that can no longer commit — already mined, no longer valid against the
//! live UTXO set, or in conflict with another pending transaction.

use std::collections::HashSet;
use std::sync::Arc;

use crate::blockchain::transaction::TransactionParser;
use crate::error::CoreResult;
use crate::storage::{OutputRef, Storage};

pub struct MempoolJanitor {
    storage: Arc<dyn Storage>,
    parser: Arc<dyn TransactionParser>,
}

impl MempoolJanitor {
    pub fn new(storage: Arc<dyn Storage>, parser: Arc<dyn TransactionParser>) -> Self {
        Self { storage, parser }
    }

    /// Runs sweeps until a full pass evicts nothing. Returns the total
    /// number of pending transactions removed.
    pub async fn sweep(&self) -> CoreResult<usize> {
        let mut total_evicted = 0usize;

        loop {
            let pending = self.storage.get_pending_transactions_limit(1000).await?;
            if pending.is_empty() {
                break;
            }

            let pending_hashes: Vec<String> = pending.iter().map(|p| p.tx_hash.clone()).collect();
            let already_committed = self.storage.get_transactions(&pending_hashes).await?;

            let mut parent_hash_set: HashSet<String> = HashSet::new();
            let mut parsed = Vec::with_capacity(pending.len());
            for entry in &pending {
                let tx = self.parser.parse(&entry.tx_hex);
                if let Some(tx) = &tx {
                    for input in tx.inputs() {
                        parent_hash_set.insert(input.tx_hash.clone());
                    }
                }
                parsed.push((entry.clone(), tx));
            }
            let parent_hashes: Vec<String> = parent_hash_set.into_iter().collect();
            let parents = self.storage.get_transactions(&parent_hashes).await?;

            let mut used_inputs: HashSet<OutputRef> = HashSet::new();
            let mut to_evict = Vec::new();

            for (entry, tx) in &parsed {
                if already_committed.contains_key(&entry.tx_hash) {
                    to_evict.push(entry.tx_hash.clone());
                    continue;
                }
                let tx = match tx {
                    Some(t) => t,
                    None => {
                        to_evict.push(entry.tx_hash.clone());
                        continue;
                    }
                };
                let resolved = tx.resolve_inputs(&parents);
                if !tx.verify(&resolved, true) {
                    to_evict.push(entry.tx_hash.clone());
                    continue;
                }
                let keys: Vec<OutputRef> = resolved
                    .iter()
                    .map(|r| OutputRef {
                        tx_hash: r.input.tx_hash.clone(),
                        index: r.input.index,
                    })
                    .collect();
                if keys.iter().any(|key| used_inputs.contains(key)) {
                    to_evict.push(entry.tx_hash.clone());
                    continue;
                }
                used_inputs.extend(keys);
            }

            if to_evict.is_empty() {
                break;
            }

            for hash in &to_evict {
                log::debug!("mempool janitor evicting pending transaction {hash}");
            }
            total_evicted += to_evict.len();
            self.storage.remove_pending_transactions_by_hash(&to_evict).await?;
        }

        Ok(total_evicted)
    }
}
