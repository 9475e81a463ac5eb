//! Unsigned transaction templates produced by the builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Outpoint, PublicKey, TemplateId, Tx, TxInput, TxOutput};

/// Asks the signer for a signature from `key` on input `input_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningInstruction {
    pub input_index: usize,
    pub key: PublicKey,
}

/// A balanced transaction awaiting signatures.
///
/// Spend inputs stay reserved for this template until `reserved_until`,
/// or until the template is finalized, whichever comes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxTemplate {
    pub id: TemplateId,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub signing_instructions: Vec<SigningInstruction>,
    pub reserved_until: DateTime<Utc>,
}

impl TxTemplate {
    /// The transaction this template describes, witnesses included.
    #[must_use]
    pub fn to_tx(&self) -> Tx {
        Tx {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }

    /// Message signed by every signing instruction.
    #[must_use]
    pub fn sighash(&self) -> [u8; 32] {
        self.to_tx().sighash()
    }

    /// Every signing instruction has a signature in place.
    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        self.signing_instructions.iter().all(|ins| {
            self.inputs
                .get(ins.input_index)
                .is_some_and(|input| input.witness.signature.is_some())
        })
    }

    /// Outpoints spent by this template. Account selections among them are
    /// reserved until `reserved_until`.
    #[must_use]
    pub fn reserved_outpoints(&self) -> Vec<Outpoint> {
        self.inputs.iter().filter_map(TxInput::outpoint).copied().collect()
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.reserved_until
    }
}
