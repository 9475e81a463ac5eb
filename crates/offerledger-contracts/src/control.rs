//! Account control programs and issuance authorisation.
//!
//! Both reduce to one check: the witness carries an ed25519 signature over
//! the transaction sighash by the expected key.

use offerledger_types::{AssetDefinition, OfferLedgerError, PublicKey, Result, Witness};

/// Require a valid signature by `key` in `witness`.
pub fn check_signature(
    input_index: usize,
    key: &PublicKey,
    sighash: &[u8; 32],
    witness: &Witness,
) -> Result<()> {
    let Some(signature) = witness.signature.as_deref() else {
        return Err(OfferLedgerError::script(
            input_index,
            format!("missing signature for key {}", key.short()),
        ));
    };
    if !key.verify(sighash, signature) {
        return Err(OfferLedgerError::script(
            input_index,
            format!("signature does not verify for key {}", key.short()),
        ));
    }
    Ok(())
}

/// Authorise an issuance input: a positive amount, a label, and the issuer's
/// signature. The created asset is `definition.asset_id()` by construction.
pub fn check_issuance(
    input_index: usize,
    definition: &AssetDefinition,
    amount: u64,
    sighash: &[u8; 32],
    witness: &Witness,
) -> Result<()> {
    if amount == 0 {
        return Err(OfferLedgerError::script(input_index, "issuance of zero units"));
    }
    if definition.label.is_empty() {
        return Err(OfferLedgerError::script(input_index, "issuance without a label"));
    }
    check_signature(input_index, &definition.issuer_key, sighash, witness)
}
