//! Chain Writer: the single-writer critical section that turns a validated
//! block into committed state. No two blocks are ever mid-commit at once —
//! every `submit_block` call queues behind `commit_lock`.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::amount::{Amount, Difficulty};
use crate::blockchain::reward;
use crate::blockchain::transaction::{CoinbaseTransaction, Transaction};
use crate::blockchain::validator::{self, ValidatedBlock};
use crate::consensus::DifficultyCache;
use crate::error::CoreResult;
use crate::storage::{BlockRecord, OutputRef, Storage};

pub struct ChainWriter {
    storage: Arc<dyn Storage>,
    difficulty_cache: Arc<DifficultyCache>,
    commit_lock: Mutex<()>,
}

impl ChainWriter {
    pub fn new(storage: Arc<dyn Storage>, difficulty_cache: Arc<DifficultyCache>) -> Self {
        Self {
            storage,
            difficulty_cache,
            commit_lock: Mutex::new(()),
        }
    }

    /// Validate and commit a candidate block. The whole operation — fetching
    /// the difficulty snapshot, validating, and committing — runs under the
    /// commit mutex so the difficulty cache can never be read mid-retarget
    /// by two concurrent submissions.
    pub async fn submit_block(
        &self,
        header_bytes: &[u8],
        transactions: Vec<Arc<dyn Transaction>>,
    ) -> CoreResult<BlockRecord> {
        let _guard = self.commit_lock.lock().await;

        self.difficulty_cache.invalidate();
        let snapshot = self.difficulty_cache.get(self.storage.as_ref()).await?;

        let validated = match validator::validate(self.storage.as_ref(), header_bytes, transactions, snapshot).await {
            Ok(v) => v,
            Err(e) => {
                log::warn!("block rejected: {e}");
                return Err(e);
            }
        };
        let result = self.commit(validated).await;
        if result.is_ok() {
            self.difficulty_cache.invalidate();
        }
        result
    }

    async fn commit(&self, validated: ValidatedBlock) -> CoreResult<BlockRecord> {
        let ValidatedBlock {
            header,
            block_hash,
            new_id,
            transactions,
        } = validated;

        let reward = reward::block_reward(new_id);
        let fees: Amount = transactions.iter().map(|t| t.fees()).sum();
        let coinbase_amount = reward.checked_add(fees).unwrap_or(reward);

        // Address encoding belongs to the key/address module; the core only
        // ever sees already-decoded bytes, so the persisted form is hex.
        let address = hex::encode(&header.address);
        let coinbase: Arc<dyn Transaction> =
            Arc::new(CoinbaseTransaction::new(&block_hash, &address, coinbase_amount));

        let record = BlockRecord {
            id: new_id,
            hash: block_hash.clone(),
            address: address.clone(),
            random: header.nonce,
            difficulty: Difficulty::from_scaled(header.difficulty_scaled as u64),
            reward,
            timestamp: header.timestamp,
        };

        self.storage.add_block(record.clone()).await?;

        if let Err(e) = self.persist_transactions(&block_hash, &coinbase, &transactions).await {
            let _ = self.storage.delete_block(new_id).await;
            return Err(e);
        }

        let mut new_outputs = Vec::new();
        for index in 0..coinbase.outputs().len() {
            new_outputs.push(OutputRef {
                tx_hash: coinbase.hash(),
                index: index as u32,
            });
        }
        for tx in &transactions {
            for index in 0..tx.outputs().len() {
                new_outputs.push(OutputRef {
                    tx_hash: tx.hash(),
                    index: index as u32,
                });
            }
        }
        self.storage.add_unspent_transactions_outputs(new_outputs).await?;

        let committed_hashes: Vec<String> = transactions.iter().map(|t| t.hash()).collect();
        if !committed_hashes.is_empty() {
            self.storage.remove_pending_transactions_by_hash(&committed_hashes).await?;
        }

        let consumed: Vec<OutputRef> = transactions
            .iter()
            .flat_map(|t| {
                t.inputs().iter().map(|i| OutputRef {
                    tx_hash: i.tx_hash.clone(),
                    index: i.index,
                })
            })
            .collect();
        if !consumed.is_empty() {
            self.storage.remove_unspent_outputs(&consumed).await?;
        }

        log::info!(
            "committed block {} hash={} reward={} fees={}",
            new_id,
            block_hash,
            reward,
            fees
        );

        Ok(record)
    }

    async fn persist_transactions(
        &self,
        block_hash: &str,
        coinbase: &Arc<dyn Transaction>,
        transactions: &[Arc<dyn Transaction>],
    ) -> CoreResult<()> {
        self.storage.add_transaction(coinbase.clone(), block_hash).await?;
        for tx in transactions {
            self.storage.add_transaction(tx.clone(), block_hash).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::merkle;
    use crate::codec::BlockHeader;
    use crate::storage::memory::MemoryStorage;

    fn genesis_header_bytes() -> Vec<u8> {
        let merkle_root_hex = merkle::root_for_height(1, std::iter::empty());
        let merkle_root: [u8; 32] = hex::decode(&merkle_root_hex).unwrap().try_into().unwrap();
        BlockHeader::new([0u8; 32], vec![7u8; 33], merkle_root, 1000, 60, 0)
            .unwrap()
            .serialize()
            .unwrap()
    }

    #[tokio::test]
    async fn genesis_commit_produces_block_one_with_coinbase_utxo() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let cache = Arc::new(DifficultyCache::new());
        let writer = ChainWriter::new(storage.clone(), cache);

        let record = writer.submit_block(&genesis_header_bytes(), vec![]).await.unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.reward, Amount::from_whole(100));

        let coinbase = CoinbaseTransaction::new(&record.hash, &record.address, record.reward);
        let outputs = storage
            .get_unspent_outputs(&[OutputRef {
                tx_hash: coinbase.hash(),
                index: 0,
            }])
            .await
            .unwrap();
        assert_eq!(outputs.len(), 1);
    }

    #[tokio::test]
    async fn resubmitting_the_same_block_is_rejected() {
        // The chain tip advances past block 1 after the first commit, so a
        // second submission of the identical bytes is rejected — but not
        // necessarily with `PreviousHashMismatch`: the candidate's own hash
        // is now `last_block.hash`, so `pow::check`'s suffix-of-self test is
        // the first thing to fail in practice. Assert only that it's
        // rejected rather than naming a specific variant we haven't proven.
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let cache = Arc::new(DifficultyCache::new());
        let writer = ChainWriter::new(storage, cache);

        let bytes = genesis_header_bytes();
        writer.submit_block(&bytes, vec![]).await.unwrap();
        let second = writer.submit_block(&bytes, vec![]).await;
        assert!(second.is_err());
    }
}
