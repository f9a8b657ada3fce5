//! The transaction capability set the core depends on.
//!
//! The real transaction codec and signature verifier are external
//! collaborators (see SPEC_FULL.md §1) — the core only ever touches a
//! transaction through this trait. [`fixtures::SimpleTransaction`] is a
//! minimal stand-in used by the unit and scenario tests and by the
//! demonstration miner; it is not meant to be a production verifier.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::amount::Amount;
use crate::crypto::hash::sha256_hex;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxInput {
    pub tx_hash: String,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub address: String,
    pub amount: Amount,
}

/// One of a transaction's inputs, paired with the output it claims to spend
/// (`None` if that output could not be found among the fetched parents).
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub input: TxInput,
    pub source_output: Option<TxOutput>,
}

/// Common capability set for both ordinary and coinbase transactions.
///
/// The Block Validator and Chain Writer work exclusively through this trait
/// so that raw hex strings and other non-transaction list entries never get
/// mixed into size/merkle/verify computations (see SPEC_FULL.md §4.5 step 6).
pub trait Transaction: Send + Sync + fmt::Debug {
    /// Stable hex encoding of the transaction.
    fn hex(&self) -> &str;

    /// `sha256(hex)`, lower-case hex.
    fn hash(&self) -> String {
        sha256_hex(self.hex().as_bytes())
    }

    fn inputs(&self) -> &[TxInput];
    fn outputs(&self) -> &[TxOutput];
    fn fees(&self) -> Amount;

    /// Resolve each input against already-fetched parent transactions.
    fn resolve_inputs(&self, parents: &HashMap<String, Arc<dyn Transaction>>) -> Vec<ResolvedInput> {
        self.inputs()
            .iter()
            .map(|input| {
                let source_output = parents
                    .get(&input.tx_hash)
                    .and_then(|parent| parent.outputs().get(input.index as usize).cloned());
                ResolvedInput {
                    input: input.clone(),
                    source_output,
                }
            })
            .collect()
    }

    /// Verify signatures and input/output balance against already-resolved
    /// inputs. `check_double_spend` additionally asks the implementation to
    /// recheck UTXO availability itself; the Block Validator always calls
    /// this with `false` because it has already checked UTXO membership for
    /// the whole block, but the Mempool Janitor calls it with `true` since
    /// it has no such external guarantee.
    fn verify(&self, resolved: &[ResolvedInput], check_double_spend: bool) -> bool;
}

/// Parses a pending pool's `tx_hex` back into a live `Transaction`.
///
/// This is the other half of the transaction codec collaborator (the first
/// half, `hex()`/`hash()`, lives on [`Transaction`] itself). The Mempool
/// Janitor needs to re-verify a pending transaction against the live UTXO
/// set, which means it needs the parsed object, not just its hex string —
/// so a parser is injected rather than hard-coded.
pub trait TransactionParser: Send + Sync {
    fn parse(&self, hex: &str) -> Option<Arc<dyn Transaction>>;
}

/// The synthesized per-block reward payout. No inputs; contributes outputs
/// to the UTXO set like any other transaction.
#[derive(Debug, Clone)]
pub struct CoinbaseTransaction {
    hex: String,
    outputs: Vec<TxOutput>,
}

impl CoinbaseTransaction {
    pub fn new(block_hash: &str, miner_address: &str, amount: Amount) -> Self {
        let canonical = format!("{block_hash}:{miner_address}:{}", amount.scaled());
        let hex = hex::encode(canonical.as_bytes());
        Self {
            hex,
            outputs: vec![TxOutput {
                address: miner_address.to_string(),
                amount,
            }],
        }
    }
}

impl Transaction for CoinbaseTransaction {
    fn hex(&self) -> &str {
        &self.hex
    }

    fn inputs(&self) -> &[TxInput] {
        &[]
    }

    fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    fn fees(&self) -> Amount {
        Amount::default()
    }

    fn verify(&self, _resolved: &[ResolvedInput], _check_double_spend: bool) -> bool {
        true
    }
}

/// Minimal stand-in for a real signed transaction: hex-encodes
/// `inputs|outputs|fee` and considers itself valid whenever every input
/// resolves to a present source output and the ledger balances.
pub mod fixtures {
    use super::*;

    #[derive(Debug, Clone)]
    pub struct SimpleTransaction {
        hex: String,
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        fees: Amount,
    }

    impl SimpleTransaction {
        pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>, fees: Amount) -> Self {
            let mut hex = String::new();
            for input in &inputs {
                hex.push_str(&format!("{}:{}|", input.tx_hash, input.index));
            }
            hex.push_str("->");
            for output in &outputs {
                hex.push_str(&format!("{}:{}|", output.address, output.amount.scaled()));
            }
            hex.push_str(&format!("#{}", fees.scaled()));
            let hex = hex::encode(hex.as_bytes());
            Self {
                hex,
                inputs,
                outputs,
                fees,
            }
        }
    }

    impl Transaction for SimpleTransaction {
        fn hex(&self) -> &str {
            &self.hex
        }

        fn inputs(&self) -> &[TxInput] {
            &self.inputs
        }

        fn outputs(&self) -> &[TxOutput] {
            &self.outputs
        }

        fn fees(&self) -> Amount {
            self.fees
        }

        fn verify(&self, resolved: &[ResolvedInput], _check_double_spend: bool) -> bool {
            if resolved.len() != self.inputs.len() {
                return false;
            }
            let mut total_in = Amount::default();
            for r in resolved {
                match &r.source_output {
                    Some(out) => total_in = total_in + out.amount,
                    None => return false,
                }
            }
            let total_out: Amount = self.outputs.iter().map(|o| o.amount).sum();
            total_in.scaled() == total_out.scaled() + self.fees.scaled()
        }
    }

    /// Parses hex produced by [`SimpleTransaction::new`] back into a
    /// `SimpleTransaction`. Returns `None` on any malformed input.
    pub fn parse(hex_str: &str) -> Option<SimpleTransaction> {
        let decoded = hex::decode(hex_str).ok()?;
        let text = String::from_utf8(decoded).ok()?;
        let (inputs_part, rest) = text.split_once("->")?;
        let (outputs_part, fee_part) = rest.split_once('#')?;

        let mut inputs = Vec::new();
        for entry in inputs_part.split('|').filter(|s| !s.is_empty()) {
            let (tx_hash, index_str) = entry.rsplit_once(':')?;
            inputs.push(TxInput {
                tx_hash: tx_hash.to_string(),
                index: index_str.parse().ok()?,
            });
        }

        let mut outputs = Vec::new();
        for entry in outputs_part.split('|').filter(|s| !s.is_empty()) {
            let (address, amount_str) = entry.rsplit_once(':')?;
            outputs.push(TxOutput {
                address: address.to_string(),
                amount: Amount::from_scaled(amount_str.parse().ok()?),
            });
        }

        let fees = Amount::from_scaled(fee_part.parse().ok()?);
        Some(SimpleTransaction::new(inputs, outputs, fees))
    }

    /// A [`TransactionParser`] backed by [`SimpleTransaction::parse`], used
    /// by the Mempool Janitor and the demonstration miner in the absence of
    /// a real transaction codec.
    #[derive(Debug, Default)]
    pub struct SimpleTransactionParser;

    impl TransactionParser for SimpleTransactionParser {
        fn parse(&self, hex: &str) -> Option<Arc<dyn Transaction>> {
            SimpleTransaction::parse(hex).map(|tx| Arc::new(tx) as Arc<dyn Transaction>)
        }
    }
}
