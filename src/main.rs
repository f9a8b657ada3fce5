//! Node binary: wires the storage adapter, Chain Writer and Mempool Janitor
//! together and runs the janitor on a fixed interval until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;

use denarite_core::blockchain::transaction::fixtures::SimpleTransactionParser;
use denarite_core::blockchain::MempoolJanitor;
use denarite_core::config::NodeConfig;
use denarite_core::storage::memory::MemoryStorage;
use denarite_core::storage::Storage;

// Peer-to-peer block ingestion is out of scope (see SPEC_FULL.md); this
// binary only keeps the mempool clean against whatever storage backend it
// is pointed at. `bin/miner.rs` is what actually drives `ChainWriter`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = NodeConfig::load()?;
    log::info!(
        "starting node (data_dir={}, janitor_interval={}s)",
        config.data_dir.display(),
        config.janitor_interval_secs
    );

    let storage = build_storage(&config)?;
    // No real transaction codec is wired into the node binary; the
    // demonstration miner and test suite both stand in with SimpleTransaction.
    let janitor = Arc::new(MempoolJanitor::new(storage, Arc::new(SimpleTransactionParser)));

    let janitor_for_task = janitor.clone();
    let interval_secs = config.janitor_interval_secs;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            match janitor_for_task.sweep().await {
                Ok(evicted) if evicted > 0 => {
                    log::info!("mempool janitor evicted {evicted} pending transaction(s)");
                }
                Ok(_) => log::debug!("mempool janitor sweep: nothing to evict"),
                Err(e) => log::warn!("mempool janitor sweep failed: {e}"),
            }
        }
    });

    log::info!("node running, press Ctrl+C to stop");
    signal::ctrl_c().await?;
    log::info!("shutdown signal received, exiting");
    Ok(())
}

#[cfg(not(feature = "persistent"))]
fn build_storage(_config: &NodeConfig) -> anyhow::Result<Arc<dyn Storage>> {
    Ok(Arc::new(MemoryStorage::new()))
}

#[cfg(feature = "persistent")]
fn build_storage(config: &NodeConfig) -> anyhow::Result<Arc<dyn Storage>> {
    use denarite_core::storage::sled_store::SledStorage;
    std::fs::create_dir_all(&config.data_dir)?;
    let storage = SledStorage::open(&config.data_dir, Arc::new(SimpleTransactionParser))?;
    Ok(Arc::new(storage))
}
