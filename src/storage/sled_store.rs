//! Persistent `Storage` adapter backed by `sled`, gated behind the
//! `persistent` feature.
//!
//! Four trees mirror the four logical tables the port describes: blocks
//! (keyed by big-endian `id`), transactions (keyed by `tx_hash`), the
//! unspent set (keyed by `tx_hash:index`) and the pending pool (keyed by
//! `tx_hash`). Every value is a plain `bincode` blob with no extra checksum
//! wrapper: `sled` already guards each value with its own CRC on disk, so a
//! second one here would just be redundant bytes.
//!
//! `sled`'s API is synchronous; every call below is dispatched through
//! `tokio::task::spawn_blocking` so it never parks an async worker thread.
//!
//! A committed transaction is persisted as hex plus the block hash it
//! belongs to, not as a live `Arc<dyn Transaction>` — `bincode` has no way
//! to serialize a trait object. Reconstructing one on read is therefore
//! delegated to the same injected [`TransactionParser`] the Mempool
//! Janitor uses; a transaction hex this adapter cannot parse is silently
//! dropped from `get_transactions`, matching "not found" semantics for a
//! codec the core does not own.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::blockchain::transaction::{Transaction, TransactionParser};
use crate::error::{CoreError, CoreResult};

use super::{BlockRecord, OutputRef, PendingEntry, Storage};

#[derive(Debug, Serialize, Deserialize)]
struct StoredTransactionRecord {
    tx_hex: String,
    block_hash: String,
}

pub struct SledStorage {
    blocks: sled::Tree,
    meta: sled::Tree,
    transactions: sled::Tree,
    pending: sled::Tree,
    unspent: sled::Tree,
    parser: Arc<dyn TransactionParser>,
}

const LAST_ID_KEY: &[u8] = b"last_id";

impl SledStorage {
    pub fn open(path: impl AsRef<Path>, parser: Arc<dyn TransactionParser>) -> CoreResult<Self> {
        let db = sled::open(path).map_err(|e| CoreError::StorageFailure(e.to_string()))?;
        let open_tree = |name: &str| -> CoreResult<sled::Tree> {
            db.open_tree(name).map_err(|e| CoreError::StorageFailure(e.to_string()))
        };
        Ok(Self {
            blocks: open_tree("blocks")?,
            meta: open_tree("meta")?,
            transactions: open_tree("transactions")?,
            pending: open_tree("pending")?,
            unspent: open_tree("unspent")?,
            parser,
        })
    }

    fn encode<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
        bincode::serialize(value).map_err(|e| CoreError::StorageFailure(e.to_string()))
    }

    fn decode<T: for<'a> Deserialize<'a>>(bytes: &[u8]) -> CoreResult<T> {
        bincode::deserialize(bytes).map_err(|e| CoreError::StorageFailure(e.to_string()))
    }

    fn unspent_key(output: &OutputRef) -> Vec<u8> {
        format!("{}:{}", output.tx_hash, output.index).into_bytes()
    }
}

#[async_trait]
impl Storage for SledStorage {
    async fn get_last_block(&self) -> CoreResult<Option<BlockRecord>> {
        let blocks = self.blocks.clone();
        let meta = self.meta.clone();
        tokio::task::spawn_blocking(move || {
            let id = match meta
                .get(LAST_ID_KEY)
                .map_err(|e| CoreError::StorageFailure(e.to_string()))?
            {
                Some(bytes) => u64::from_be_bytes(bytes.as_ref().try_into().map_err(|_| {
                    CoreError::StorageFailure("corrupt last_id entry".to_string())
                })?),
                None => return Ok(None),
            };
            match blocks
                .get(id.to_be_bytes())
                .map_err(|e| CoreError::StorageFailure(e.to_string()))?
            {
                Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn get_block_by_id(&self, id: u64) -> CoreResult<Option<BlockRecord>> {
        let blocks = self.blocks.clone();
        tokio::task::spawn_blocking(move || {
            match blocks
                .get(id.to_be_bytes())
                .map_err(|e| CoreError::StorageFailure(e.to_string()))?
            {
                Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn add_block(&self, record: BlockRecord) -> CoreResult<()> {
        let blocks = self.blocks.clone();
        let meta = self.meta.clone();
        tokio::task::spawn_blocking(move || {
            let id = record.id;
            let encoded = Self::encode(&record)?;
            blocks
                .insert(id.to_be_bytes(), encoded)
                .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
            let current = match meta.get(LAST_ID_KEY).map_err(|e| CoreError::StorageFailure(e.to_string()))? {
                Some(bytes) => u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0; 8])),
                None => 0,
            };
            if id > current {
                meta.insert(LAST_ID_KEY, &id.to_be_bytes())
                    .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn delete_block(&self, id: u64) -> CoreResult<()> {
        let blocks = self.blocks.clone();
        let meta = self.meta.clone();
        tokio::task::spawn_blocking(move || {
            blocks
                .remove(id.to_be_bytes())
                .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
            let current = match meta.get(LAST_ID_KEY).map_err(|e| CoreError::StorageFailure(e.to_string()))? {
                Some(bytes) => u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0; 8])),
                None => 0,
            };
            if current == id {
                let new_last = id.saturating_sub(1);
                let still_present = new_last != 0
                    && blocks
                        .contains_key(new_last.to_be_bytes())
                        .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
                let next = if still_present { new_last } else { 0 };
                meta.insert(LAST_ID_KEY, &next.to_be_bytes())
                    .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn add_transaction(&self, tx: Arc<dyn Transaction>, block_hash: &str) -> CoreResult<()> {
        let transactions = self.transactions.clone();
        let hash = tx.hash();
        let record = StoredTransactionRecord {
            tx_hex: tx.hex().to_string(),
            block_hash: block_hash.to_string(),
        };
        tokio::task::spawn_blocking(move || {
            let encoded = Self::encode(&record)?;
            transactions
                .insert(hash.as_bytes(), encoded)
                .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn get_transactions(&self, hashes: &[String]) -> CoreResult<HashMap<String, Arc<dyn Transaction>>> {
        let transactions = self.transactions.clone();
        let hashes = hashes.to_vec();
        let parser = self.parser.clone();
        tokio::task::spawn_blocking(move || {
            let mut out = HashMap::new();
            for hash in hashes {
                if let Some(bytes) = transactions
                    .get(hash.as_bytes())
                    .map_err(|e| CoreError::StorageFailure(e.to_string()))?
                {
                    let record: StoredTransactionRecord = Self::decode(&bytes)?;
                    if let Some(tx) = parser.parse(&record.tx_hex) {
                        out.insert(hash, tx);
                    }
                }
            }
            Ok(out)
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn get_pending_transactions_limit(&self, n: usize) -> CoreResult<Vec<PendingEntry>> {
        let pending = self.pending.clone();
        tokio::task::spawn_blocking(move || {
            let mut entries = Vec::new();
            for item in pending.iter() {
                let (_, value) = item.map_err(|e| CoreError::StorageFailure(e.to_string()))?;
                entries.push(Self::decode::<PendingEntry>(&value)?);
            }
            entries.sort_by(|a, b| b.fees.cmp(&a.fees));
            entries.truncate(n);
            Ok(entries)
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn add_pending_transaction(&self, entry: PendingEntry) -> CoreResult<()> {
        let pending = self.pending.clone();
        tokio::task::spawn_blocking(move || {
            let key = entry.tx_hash.clone();
            let encoded = Self::encode(&entry)?;
            pending
                .insert(key.as_bytes(), encoded)
                .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn remove_pending_transactions_by_hash(&self, hashes: &[String]) -> CoreResult<()> {
        let pending = self.pending.clone();
        let hashes = hashes.to_vec();
        tokio::task::spawn_blocking(move || {
            for hash in hashes {
                pending
                    .remove(hash.as_bytes())
                    .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn get_unspent_outputs(&self, pairs: &[OutputRef]) -> CoreResult<Vec<OutputRef>> {
        let unspent = self.unspent.clone();
        let pairs = pairs.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut found = Vec::new();
            for pair in pairs {
                let key = Self::unspent_key(&pair);
                if unspent
                    .contains_key(&key)
                    .map_err(|e| CoreError::StorageFailure(e.to_string()))?
                {
                    found.push(pair);
                }
            }
            Ok(found)
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn add_unspent_transactions_outputs(&self, outputs: Vec<OutputRef>) -> CoreResult<()> {
        let unspent = self.unspent.clone();
        tokio::task::spawn_blocking(move || {
            for output in outputs {
                let key = Self::unspent_key(&output);
                unspent
                    .insert(key, &[][..])
                    .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }

    async fn remove_unspent_outputs(&self, outputs: &[OutputRef]) -> CoreResult<()> {
        let unspent = self.unspent.clone();
        let outputs = outputs.to_vec();
        tokio::task::spawn_blocking(move || {
            for output in outputs {
                let key = Self::unspent_key(&output);
                unspent
                    .remove(key)
                    .map_err(|e| CoreError::StorageFailure(e.to_string()))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| CoreError::StorageFailure(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{Amount, Difficulty};
    use crate::blockchain::transaction::fixtures::{SimpleTransaction, SimpleTransactionParser};
    use crate::blockchain::transaction::{CoinbaseTransaction, TxInput, TxOutput};

    fn open_temp() -> (tempfile::TempDir, SledStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SledStorage::open(dir.path(), Arc::new(SimpleTransactionParser)).unwrap();
        (dir, storage)
    }

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

    #[tokio::test]
    async fn add_then_get_last_block_round_trips_through_sled() {
        let (_dir, storage) = open_temp();
        storage.add_block(sample_block(1, "hash1")).await.unwrap();
        let last = storage.get_last_block().await.unwrap().unwrap();
        assert_eq!(last.id, 1);
        assert_eq!(last.hash, "hash1");
    }

    #[tokio::test]
    async fn delete_block_restores_previous_last() {
        let (_dir, storage) = open_temp();
        storage.add_block(sample_block(1, "hash1")).await.unwrap();
        storage.add_block(sample_block(2, "hash2")).await.unwrap();
        storage.delete_block(2).await.unwrap();
        let last = storage.get_last_block().await.unwrap().unwrap();
        assert_eq!(last.id, 1);
    }

    #[tokio::test]
    async fn unspent_outputs_round_trip_through_sled() {
        let (_dir, storage) = open_temp();
        let out = OutputRef {
            tx_hash: "deadbeef".into(),
            index: 0,
        };
        storage.add_unspent_transactions_outputs(vec![out.clone()]).await.unwrap();
        let found = storage.get_unspent_outputs(&[out.clone()]).await.unwrap();
        assert_eq!(found, vec![out.clone()]);
        storage.remove_unspent_outputs(&[out.clone()]).await.unwrap();
        assert!(storage.get_unspent_outputs(&[out]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transactions_round_trip_through_the_injected_parser() {
        let (_dir, storage) = open_temp();
        let tx: Arc<dyn Transaction> = Arc::new(CoinbaseTransaction::new("blk", "miner", Amount::from_whole(1)));
        let hash = tx.hash();
        storage.add_transaction(tx, "blk").await.unwrap();
        let found = storage.get_transactions(&[hash.clone()]).await.unwrap();
        assert!(found.contains_key(&hash));
    }

    #[tokio::test]
    async fn unparseable_stored_hex_is_dropped_like_not_found() {
        let (_dir, storage) = open_temp();
        let tx: Arc<dyn Transaction> = Arc::new(SimpleTransaction::new(
            vec![TxInput {
                tx_hash: "parent".into(),
                index: 0,
            }],
            vec![TxOutput {
                address: "bob".into(),
                amount: Amount::from_whole(1),
            }],
            Amount::default(),
        ));
        let hash = tx.hash();
        storage.add_transaction(tx, "blk").await.unwrap();
        let found = storage.get_transactions(&[hash]).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn pending_entries_survive_reopening_the_same_path() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = SledStorage::open(dir.path(), Arc::new(SimpleTransactionParser)).unwrap();
            storage
                .add_pending_transaction(PendingEntry {
                    tx_hash: "a".into(),
                    tx_hex: "aa".into(),
                    input_addresses: vec![],
                    fees: Amount::from_whole(1),
                })
                .await
                .unwrap();
        }
        let reopened = SledStorage::open(dir.path(), Arc::new(SimpleTransactionParser)).unwrap();
        let pending = reopened.get_pending_transactions_limit(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tx_hash, "a");
    }
}
