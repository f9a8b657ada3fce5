//! Block-level orchestration: transactions, validation, commit, reward
//! schedule and mempool hygiene.

pub mod chain;
pub mod mempool;
pub mod reward;
pub mod transaction;
pub mod validator;

pub use chain::ChainWriter;
pub use mempool::MempoolJanitor;
pub use transaction::Transaction;
