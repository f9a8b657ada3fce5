//! Demonstration miner: drives the real [`ChainWriter`]/[`validator::validate`]
//! path against the in-memory storage adapter, the way `miner.py` drives
//! `check_block_is_valid`/`push_block` in the reference implementation. It
//! stands in for a production miner (a real one would talk to a remote node
//! over RPC and use a wallet-managed address) — see SPEC_FULL.md §1.
//!
//! ```bash
//! cargo run --bin denarite-miner -- --address <66-hex-char-v2-address> --blocks 5
//! ```

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use denarite_core::amount::Difficulty;
use denarite_core::blockchain::chain::ChainWriter;
use denarite_core::blockchain::transaction::fixtures::SimpleTransactionParser;
use denarite_core::blockchain::transaction::{Transaction, TransactionParser};
use denarite_core::codec::BlockHeader;
use denarite_core::consensus::{pow, DifficultyCache};
use denarite_core::crypto::hash::sha256_hex;
use denarite_core::crypto::merkle;
use denarite_core::storage::memory::MemoryStorage;
use denarite_core::storage::Storage;

#[derive(Parser, Debug)]
#[command(about = "Mines candidate blocks against an in-memory chain, for demonstration only")]
struct Args {
    /// Miner address as hex: 66 chars (33 bytes, v2 header) or 128 chars (64 bytes, v1 header).
    #[arg(long, default_value_t = "02".repeat(33))]
    address: String,

    /// Number of blocks to mine before exiting.
    #[arg(long, default_value_t = 5)]
    blocks: u64,

    /// Abort a single block's search after this many nonces, to bound a demo run.
    #[arg(long, default_value_t = 20_000_000)]
    max_nonce: u32,
}

fn now_secs() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as u32
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let address = hex::decode(&args.address)?;

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let difficulty_cache = Arc::new(DifficultyCache::new());
    let writer = ChainWriter::new(storage.clone(), difficulty_cache.clone());
    let parser = SimpleTransactionParser;

    for _ in 0..args.blocks {
        let (difficulty, last_block) = difficulty_cache.get(storage.as_ref()).await?;
        let previous_hash: [u8; 32] = match &last_block {
            Some(b) => hex::decode(&b.hash)?.try_into().map_err(|_| anyhow::anyhow!("corrupt previous hash"))?,
            // No genesis anchor exists yet; any 32 bytes are accepted (see §4.4).
            None => [0u8; 32],
        };
        let new_id = last_block.as_ref().map(|b| b.id + 1).unwrap_or(1);

        let pending = storage.get_pending_transactions_limit(1000).await?;
        let transactions: Vec<Arc<dyn Transaction>> = pending
            .iter()
            .filter_map(|entry| parser.parse(&entry.tx_hex))
            .collect();
        let tx_hexes: Vec<&str> = transactions.iter().map(|t| t.hex()).collect();
        let merkle_root_hex = merkle::root_for_height(new_id, tx_hexes.into_iter());
        let merkle_root: [u8; 32] = hex::decode(&merkle_root_hex)?
            .try_into()
            .map_err(|_| anyhow::anyhow!("corrupt merkle root"))?;

        let timestamp = last_block.as_ref().map(|b| b.timestamp.max(now_secs())).unwrap_or_else(now_secs);
        let difficulty_scaled = difficulty.scaled() as u16;
        let prev_hash_hex = last_block.as_ref().map(|b| b.hash.as_str());

        log::info!("mining block {new_id} at difficulty {difficulty}");
        let mut nonce = 0u32;
        let header_bytes = loop {
            let header = BlockHeader::new(previous_hash, address.clone(), merkle_root, timestamp, difficulty_scaled, nonce)?;
            let bytes = header.serialize()?;
            let candidate_hash = sha256_hex(&bytes);
            if pow::check(&candidate_hash, prev_hash_hex, Difficulty::from_scaled(difficulty_scaled as u64)) {
                break bytes;
            }
            nonce = nonce.checked_add(1).ok_or_else(|| anyhow::anyhow!("exhausted the nonce space"))?;
            if nonce > args.max_nonce {
                anyhow::bail!("gave up mining block {new_id} after {} nonces", args.max_nonce);
            }
        };

        let record = writer.submit_block(&header_bytes, transactions).await?;
        log::info!(
            "mined block {} hash={} nonce={} reward={}",
            record.id,
            record.hash,
            record.random,
            record.reward
        );
    }

    Ok(())
}
