//! Crate-wide error hierarchy.
//!
//! Every rejection the core can produce is recoverable: a candidate block is
//! simply not accepted, the caller is told why, and no side effect survives.
//! `StorageFailure` is the one variant that can occur mid-commit; the
//! [`crate::blockchain::chain::ChainWriter`] is responsible for undoing
//! whatever partial state it left behind before propagating it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("header has an unrecognized byte length")]
    BadHeaderShape,

    #[error("header version byte is not supported")]
    UnsupportedVersion,

    #[error("address does not encode to 33 or 64 bytes")]
    BadAddressLength,

    #[error("proof of work does not satisfy the current difficulty")]
    PowInsufficient,

    #[error("header.previous_hash does not match the chain tip")]
    PreviousHashMismatch,

    #[error("header.difficulty_scaled does not match the expected difficulty")]
    DifficultyMismatch,

    #[error("header.timestamp is older than the previous block")]
    TimestampRegression,

    #[error("header.timestamp is in the future")]
    TimestampFuture,

    #[error("sum of transaction hex lengths exceeds the maximum block size")]
    BlockTooLarge,

    #[error("a referenced output is missing from the UTXO set or already spent")]
    UtxoMissingOrDoubleSpent,

    #[error("two transactions in the same block spend the same output")]
    IntraBlockDoubleSpend,

    #[error("transaction failed signature/balance verification")]
    TransactionVerifyFailed,

    #[error("recomputed merkle root does not match header.merkle_root")]
    MerkleMismatch,

    #[error("storage operation failed: {0}")]
    StorageFailure(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
