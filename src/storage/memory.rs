//! In-memory `Storage` adapter. The node's default in the absence of a
//! data directory, and what the test suite runs against.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::blockchain::transaction::Transaction;
use crate::error::CoreResult;

use super::{BlockRecord, OutputRef, PendingEntry, Storage};

#[derive(Debug, Clone)]
struct StoredTransaction {
    tx: Arc<dyn Transaction>,
    block_hash: String,
}

#[derive(Default)]
pub struct MemoryStorage {
    blocks_by_id: DashMap<u64, BlockRecord>,
    last_id: AtomicU64,
    transactions: DashMap<String, StoredTransaction>,
    pending: DashMap<String, PendingEntry>,
    unspent: DashMap<OutputRef, ()>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("blocks", &self.blocks_by_id.len())
            .field("transactions", &self.transactions.len())
            .field("pending", &self.pending.len())
            .field("unspent", &self.unspent.len())
            .finish()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_last_block(&self) -> CoreResult<Option<BlockRecord>> {
        let id = self.last_id.load(Ordering::SeqCst);
        if id == 0 {
            return Ok(None);
        }
        Ok(self.blocks_by_id.get(&id).map(|r| r.clone()))
    }

    async fn get_block_by_id(&self, id: u64) -> CoreResult<Option<BlockRecord>> {
        Ok(self.blocks_by_id.get(&id).map(|r| r.clone()))
    }

    async fn add_block(&self, record: BlockRecord) -> CoreResult<()> {
        let id = record.id;
        self.blocks_by_id.insert(id, record);
        self.last_id.fetch_max(id, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_block(&self, id: u64) -> CoreResult<()> {
        self.blocks_by_id.remove(&id);
        if self.last_id.load(Ordering::SeqCst) == id {
            let new_last = id.saturating_sub(1);
            self.last_id.store(
                if self.blocks_by_id.contains_key(&new_last) { new_last } else { 0 },
                Ordering::SeqCst,
            );
        }
        Ok(())
    }

    async fn add_transaction(&self, tx: Arc<dyn Transaction>, block_hash: &str) -> CoreResult<()> {
        let hash = tx.hash();
        self.transactions.insert(
            hash,
            StoredTransaction {
                tx,
                block_hash: block_hash.to_string(),
            },
        );
        Ok(())
    }

    async fn get_transactions(
        &self,
        hashes: &[String],
    ) -> CoreResult<HashMap<String, Arc<dyn Transaction>>> {
        let mut out = HashMap::new();
        for hash in hashes {
            if let Some(entry) = self.transactions.get(hash) {
                out.insert(hash.clone(), entry.tx.clone());
            }
        }
        Ok(out)
    }

    async fn get_pending_transactions_limit(&self, n: usize) -> CoreResult<Vec<PendingEntry>> {
        let mut entries: Vec<PendingEntry> = self.pending.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| b.fees.cmp(&a.fees));
        entries.truncate(n);
        Ok(entries)
    }

    async fn add_pending_transaction(&self, entry: PendingEntry) -> CoreResult<()> {
        self.pending.insert(entry.tx_hash.clone(), entry);
        Ok(())
    }

    async fn remove_pending_transactions_by_hash(&self, hashes: &[String]) -> CoreResult<()> {
        for hash in hashes {
            self.pending.remove(hash);
        }
        Ok(())
    }

    async fn get_unspent_outputs(&self, pairs: &[OutputRef]) -> CoreResult<Vec<OutputRef>> {
        Ok(pairs.iter().filter(|p| self.unspent.contains_key(p)).cloned().collect())
    }

    async fn add_unspent_transactions_outputs(&self, outputs: Vec<OutputRef>) -> CoreResult<()> {
        for output in outputs {
            self.unspent.insert(output, ());
        }
        Ok(())
    }

    async fn remove_unspent_outputs(&self, outputs: &[OutputRef]) -> CoreResult<()> {
        for output in outputs {
            self.unspent.remove(output);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{Amount, Difficulty};
    use crate::blockchain::transaction::CoinbaseTransaction;

    fn sample_block(id: u64, hash: &str) -> BlockRecord {
        BlockRecord {
            id,
            hash: hash.to_string(),
            address: "miner".to_string(),
            random: 0,
            difficulty: Difficulty::from_scaled(60),
            reward: Amount::from_whole(100),
            timestamp: 1000 + id as u32,
        }
    }

    #[test]
    fn add_then_get_last_block_round_trips_under_block_on() {
        // Exercises the same port as the `#[tokio::test]` cases below, but
        // driven with `tokio_test::block_on` rather than a runtime macro —
        // useful where a test wants a plain `#[test]` fn (e.g. to combine
        // with `#[rstest]` cases elsewhere in the crate).
        let storage = MemoryStorage::new();
        tokio_test::block_on(async {
            storage.add_block(sample_block(1, "hash1")).await.unwrap();
            let last = storage.get_last_block().await.unwrap().unwrap();
            assert_eq!(last.id, 1);
            assert_eq!(last.hash, "hash1");
        });
    }

    #[tokio::test]
    async fn add_then_get_last_block_round_trips() {
        let storage = MemoryStorage::new();
        storage.add_block(sample_block(1, "hash1")).await.unwrap();
        let last = storage.get_last_block().await.unwrap().unwrap();
        assert_eq!(last.id, 1);
        assert_eq!(last.hash, "hash1");
    }

    #[tokio::test]
    async fn delete_block_restores_previous_last() {
        let storage = MemoryStorage::new();
        storage.add_block(sample_block(1, "hash1")).await.unwrap();
        storage.add_block(sample_block(2, "hash2")).await.unwrap();
        storage.delete_block(2).await.unwrap();
        let last = storage.get_last_block().await.unwrap().unwrap();
        assert_eq!(last.id, 1);
    }

    #[tokio::test]
    async fn unspent_outputs_round_trip() {
        let storage = MemoryStorage::new();
        let out = OutputRef {
            tx_hash: "deadbeef".into(),
            index: 0,
        };
        storage.add_unspent_transactions_outputs(vec![out.clone()]).await.unwrap();
        let found = storage.get_unspent_outputs(&[out.clone()]).await.unwrap();
        assert_eq!(found, vec![out.clone()]);
        storage.remove_unspent_outputs(&[out.clone()]).await.unwrap();
        let found = storage.get_unspent_outputs(&[out]).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn pending_transactions_ordered_by_fees_descending() {
        let storage = MemoryStorage::new();
        storage
            .add_pending_transaction(PendingEntry {
                tx_hash: "low".into(),
                tx_hex: "aa".into(),
                input_addresses: vec![],
                fees: Amount::from_whole(1),
            })
            .await
            .unwrap();
        storage
            .add_pending_transaction(PendingEntry {
                tx_hash: "high".into(),
                tx_hex: "bb".into(),
                input_addresses: vec![],
                fees: Amount::from_whole(5),
            })
            .await
            .unwrap();
        let ordered = storage.get_pending_transactions_limit(10).await.unwrap();
        assert_eq!(ordered[0].tx_hash, "high");
        assert_eq!(ordered[1].tx_hash, "low");
    }

    #[tokio::test]
    async fn transactions_are_fetched_by_hash() {
        let storage = MemoryStorage::new();
        let tx: Arc<dyn Transaction> = Arc::new(CoinbaseTransaction::new("blk", "miner", Amount::from_whole(1)));
        let hash = tx.hash();
        storage.add_transaction(tx, "blk").await.unwrap();
        let found = storage.get_transactions(&[hash.clone()]).await.unwrap();
        assert!(found.contains_key(&hash));
    }
}
