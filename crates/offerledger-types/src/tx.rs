//! Transactions, outputs, and blocks.
//!
//! A transaction consumes inputs (existing outputs, or fresh issuance) and
//! creates outputs. Its [`TxHash`] commits to everything except witnesses,
//! so signatures can be attached after the hash is fixed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::script::hex_bytes;
use crate::{AssetAmount, AssetDefinition, AssetId, Outpoint, Script, TxHash, constants};

/// A spendable output: an amount of one asset locked by a script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    pub asset_id: AssetId,
    pub amount: u64,
    pub script: Script,
    /// Opaque caller data; committed to by the tx hash.
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<u8>,
}

impl TxOutput {
    #[must_use]
    pub fn new(asset_amount: AssetAmount, script: Script) -> Self {
        Self {
            asset_id: asset_amount.asset_id,
            amount: asset_amount.amount,
            script,
            metadata: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Vec<u8>) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn asset_amount(&self) -> AssetAmount {
        AssetAmount::new(self.asset_id, self.amount)
    }
}

/// What an input draws value from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum InputKind {
    /// Spend an existing ledger output. `prev_out` is the output as the
    /// builder saw it; the ledger checks it against its own copy.
    Spend { outpoint: Outpoint, prev_out: TxOutput },
    /// Create new units of an asset. Authorised by the issuer key; the
    /// nonce keeps otherwise identical issuances distinct.
    Issue {
        definition: AssetDefinition,
        amount: u64,
        nonce: [u8; 16],
    },
}

/// Contract-specific part of a witness for orderbook inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "clause")]
pub enum ContractClause {
    /// Buy from the offer at `tier_index`. The seller is paid by output
    /// `payment_output`; an unsold remainder, if any, re-locks into
    /// `remainder_output`.
    Redeem {
        tier_index: u16,
        payment_output: u32,
        remainder_output: Option<u32>,
    },
    /// Seller withdraws the offer.
    Cancel,
}

/// Data that satisfies the script of the input's source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Witness {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause: Option<ContractClause>,
}

/// One transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    pub kind: InputKind,
    #[serde(default)]
    pub witness: Witness,
}

impl TxInput {
    #[must_use]
    pub fn spend(outpoint: Outpoint, prev_out: TxOutput) -> Self {
        Self {
            kind: InputKind::Spend { outpoint, prev_out },
            witness: Witness::default(),
        }
    }

    #[must_use]
    pub fn issue(definition: AssetDefinition, amount: u64, nonce: [u8; 16]) -> Self {
        Self {
            kind: InputKind::Issue {
                definition,
                amount,
                nonce,
            },
            witness: Witness::default(),
        }
    }

    /// The outpoint consumed, or `None` for issuance.
    #[must_use]
    pub fn outpoint(&self) -> Option<&Outpoint> {
        match &self.kind {
            InputKind::Spend { outpoint, .. } => Some(outpoint),
            InputKind::Issue { .. } => None,
        }
    }

    #[must_use]
    pub fn asset_amount(&self) -> AssetAmount {
        match &self.kind {
            InputKind::Spend { prev_out, .. } => prev_out.asset_amount(),
            InputKind::Issue {
                definition, amount, ..
            } => AssetAmount::new(definition.asset_id(), *amount),
        }
    }

    #[must_use]
    pub fn is_issuance(&self) -> bool {
        matches!(self.kind, InputKind::Issue { .. })
    }
}

/// An unsigned or signed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Tx {
    /// `SHA-256` over the canonical witness-free encoding.
    ///
    /// Encoding: domain || n_inputs || inputs || n_outputs || outputs, all
    /// integers little-endian, variable fields length-prefixed.
    #[must_use]
    pub fn hash(&self) -> TxHash {
        let mut hasher = Sha256::new();
        hasher.update(constants::TX_HASH_DOMAIN);
        hasher.update((self.inputs.len() as u64).to_le_bytes());
        for input in &self.inputs {
            match &input.kind {
                InputKind::Spend { outpoint, prev_out } => {
                    hasher.update([0u8]);
                    hasher.update(outpoint.tx_hash.0);
                    hasher.update(outpoint.index.to_le_bytes());
                    hash_output(&mut hasher, prev_out);
                }
                InputKind::Issue {
                    definition,
                    amount,
                    nonce,
                } => {
                    hasher.update([1u8]);
                    hasher.update(definition.issuer_key.0);
                    hash_bytes(&mut hasher, definition.label.as_bytes());
                    hasher.update(amount.to_le_bytes());
                    hasher.update(nonce);
                }
            }
        }
        hasher.update((self.outputs.len() as u64).to_le_bytes());
        for output in &self.outputs {
            hash_output(&mut hasher, output);
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());
        TxHash(hash)
    }

    /// The message every signature in this transaction signs.
    #[must_use]
    pub fn sighash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::SIGHASH_DOMAIN);
        hasher.update(self.hash().0);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());
        hash
    }

    /// Outpoints consumed by this transaction, in input order.
    pub fn spent_outpoints(&self) -> impl Iterator<Item = &Outpoint> {
        self.inputs.iter().filter_map(TxInput::outpoint)
    }
}

fn hash_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn hash_output(hasher: &mut Sha256, output: &TxOutput) {
    hasher.update(output.asset_id.0);
    hasher.update(output.amount.to_le_bytes());
    hash_bytes(hasher, output.script.as_bytes());
    hash_bytes(hasher, &output.metadata);
}

/// An unspent output as stored by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: Outpoint,
    pub output: TxOutput,
}

/// A transaction accepted by the ledger, with its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedTx {
    pub hash: TxHash,
    pub tx: Tx,
}

impl CommittedTx {
    #[must_use]
    pub fn new(tx: Tx) -> Self {
        Self { hash: tx.hash(), tx }
    }

    #[must_use]
    pub fn outputs(&self) -> &[TxOutput] {
        &self.tx.outputs
    }

    /// The outputs this transaction creates, as UTXOs.
    #[allow(clippy::cast_possible_truncation)]
    pub fn utxos(&self) -> impl Iterator<Item = Utxo> + '_ {
        self.tx.outputs.iter().enumerate().map(|(i, output)| Utxo {
            outpoint: Outpoint::new(self.hash, i as u32),
            output: output.clone(),
        })
    }
}

/// A committed block. Height 0 is the empty genesis block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    pub tx_hashes: Vec<TxHash>,
}
