//! The storage port: the one trait every other module talks to when it
//! needs persisted chain state. Two adapters conform to it — [`memory`]
//! (the default, `dashmap`-backed) and [`sled_store`] (feature-gated behind
//! `persistent`).

pub mod memory;
#[cfg(feature = "persistent")]
pub mod sled_store;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::amount::{Amount, Difficulty};
use crate::blockchain::transaction::Transaction;
use crate::error::CoreResult;

/// A committed block row, as persisted and as handed to the Difficulty
/// Engine and PoW Validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: u64,
    pub hash: String,
    pub address: String,
    pub random: u32,
    pub difficulty: Difficulty,
    pub reward: Amount,
    pub timestamp: u32,
}

/// A reference to a transaction output: `(tx_hash, output_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    pub tx_hash: String,
    pub index: u32,
}

/// A pending-pool row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEntry {
    pub tx_hash: String,
    pub tx_hex: String,
    pub input_addresses: Vec<String>,
    pub fees: Amount,
}

/// The storage port required by the Block Validator, Chain Writer,
/// Difficulty Engine and Mempool Janitor.
///
/// Every method that can fail for a reason outside the caller's control
/// (an I/O error, a corrupt record) returns [`crate::error::CoreError::StorageFailure`];
/// "not found" is modeled as `Ok(None)`/an empty collection, never an error.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_last_block(&self) -> CoreResult<Option<BlockRecord>>;
    async fn get_block_by_id(&self, id: u64) -> CoreResult<Option<BlockRecord>>;
    async fn add_block(&self, record: BlockRecord) -> CoreResult<()>;
    async fn delete_block(&self, id: u64) -> CoreResult<()>;

    async fn add_transaction(&self, tx: Arc<dyn Transaction>, block_hash: &str) -> CoreResult<()>;
    async fn add_transactions(&self, txs: Vec<(Arc<dyn Transaction>, String)>) -> CoreResult<()> {
        for (tx, block_hash) in txs {
            self.add_transaction(tx, &block_hash).await?;
        }
        Ok(())
    }
    async fn get_transactions(
        &self,
        hashes: &[String],
    ) -> CoreResult<HashMap<String, Arc<dyn Transaction>>>;

    async fn get_pending_transactions_limit(&self, n: usize) -> CoreResult<Vec<PendingEntry>>;
    async fn add_pending_transaction(&self, entry: PendingEntry) -> CoreResult<()>;
    async fn remove_pending_transactions_by_hash(&self, hashes: &[String]) -> CoreResult<()>;
    async fn remove_pending_transaction(&self, hash: &str) -> CoreResult<()> {
        self.remove_pending_transactions_by_hash(&[hash.to_string()]).await
    }

    /// Returns the subset of `pairs` that are currently unspent.
    async fn get_unspent_outputs(&self, pairs: &[OutputRef]) -> CoreResult<Vec<OutputRef>>;
    async fn add_unspent_transactions_outputs(&self, outputs: Vec<OutputRef>) -> CoreResult<()>;
    async fn remove_unspent_outputs(&self, outputs: &[OutputRef]) -> CoreResult<()>;
}
