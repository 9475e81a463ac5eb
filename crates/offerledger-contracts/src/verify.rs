//! Whole-transaction checks run by the ledger at finalize.
//!
//! [`check_balance`] enforces per-asset conservation. [`verify_tx`] checks
//! every input's witness against the script it spends:
//!
//! | input | requirement |
//! |---|---|
//! | pay-to-key | signature by the key |
//! | issuance | signature by the issuer key |
//! | orderbook, `Cancel` | signature by the seller key |
//! | orderbook, `Redeem` | exact tier multiple, seller paid exactly, remainder re-locked |
//! | anything else | unspendable |

use std::collections::{BTreeMap, HashSet};

use offerledger_types::{
    AssetId, ContractClause, InputKind, OfferLedgerError, Result, Tx, TxOutput, Witness,
};

use crate::control::{check_issuance, check_signature};
use crate::orderbook::{OrderTerms, decode_script, payment_for};

/// Per-asset input and output totals.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssetFlows {
    pub inputs: BTreeMap<AssetId, u64>,
    pub outputs: BTreeMap<AssetId, u64>,
}

impl AssetFlows {
    /// Sum a transaction's inputs and outputs per asset.
    pub fn of(tx: &Tx) -> Result<Self> {
        let mut flows = Self::default();
        for input in &tx.inputs {
            let amount = input.asset_amount();
            add(&mut flows.inputs, amount.asset_id, amount.amount)?;
        }
        for output in &tx.outputs {
            add(&mut flows.outputs, output.asset_id, output.amount)?;
        }
        Ok(flows)
    }

    /// Every asset appearing on either side, in id order.
    pub fn assets(&self) -> impl Iterator<Item = AssetId> + '_ {
        let mut assets: Vec<AssetId> = self.inputs.keys().chain(self.outputs.keys()).copied().collect();
        assets.sort_unstable();
        assets.dedup();
        assets.into_iter()
    }

    #[must_use]
    pub fn input(&self, asset: &AssetId) -> u64 {
        self.inputs.get(asset).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn output(&self, asset: &AssetId) -> u64 {
        self.outputs.get(asset).copied().unwrap_or(0)
    }
}

fn add(totals: &mut BTreeMap<AssetId, u64>, asset: AssetId, amount: u64) -> Result<()> {
    let total = totals.entry(asset).or_insert(0);
    *total = total.checked_add(amount).ok_or_else(|| {
        OfferLedgerError::validation(format!("total of asset {} overflows", asset.short()))
    })?;
    Ok(())
}

/// Inputs equal outputs for every asset. Issuance inputs count as inputs of
/// the asset they create, so only they can introduce new units.
pub fn check_balance(tx: &Tx) -> Result<()> {
    let flows = AssetFlows::of(tx)?;
    for asset in flows.assets() {
        let (inputs, outputs) = (flows.input(&asset), flows.output(&asset));
        if inputs != outputs {
            return Err(OfferLedgerError::UnbalancedAssets {
                asset,
                inputs,
                outputs,
            });
        }
    }
    Ok(())
}

/// Check every input's witness against its script.
pub fn verify_tx(tx: &Tx) -> Result<()> {
    let sighash = tx.sighash();
    // Outputs already attributed to some redeem input, as payment or remainder.
    let mut claimed: HashSet<u32> = HashSet::new();

    for (i, input) in tx.inputs.iter().enumerate() {
        match &input.kind {
            InputKind::Issue {
                definition, amount, ..
            } => {
                check_issuance(i, definition, *amount, &sighash, &input.witness)?;
            }
            InputKind::Spend { prev_out, .. } => {
                if let Some(key) = prev_out.script.as_pay_to_key() {
                    check_signature(i, &key, &sighash, &input.witness)?;
                } else if prev_out.script.is_orderbook() {
                    let terms = decode_script(&prev_out.script)
                        .map_err(|e| OfferLedgerError::script(i, e.to_string()))?;
                    verify_orderbook_spend(i, tx, prev_out, &terms, &sighash, &input.witness, &mut claimed)?;
                } else {
                    return Err(OfferLedgerError::script(i, "output script is not spendable"));
                }
            }
        }
    }
    Ok(())
}

fn verify_orderbook_spend(
    i: usize,
    tx: &Tx,
    order_output: &TxOutput,
    terms: &OrderTerms,
    sighash: &[u8; 32],
    witness: &Witness,
    claimed: &mut HashSet<u32>,
) -> Result<()> {
    match witness.clause {
        None => Err(OfferLedgerError::script(i, "orderbook input without a clause")),
        Some(ContractClause::Cancel) => {
            check_signature(i, &terms.order_info.seller_key, sighash, witness)
        }
        Some(ContractClause::Redeem {
            tier_index,
            payment_output,
            remainder_output,
        }) => {
            let tier = terms
                .order_info
                .prices
                .get(usize::from(tier_index))
                .ok_or_else(|| OfferLedgerError::script(i, format!("no price tier {tier_index}")))?;

            let redeemed = match remainder_output {
                Some(r) => {
                    let rest = claim(i, tx, r, claimed)?;
                    if rest.script != order_output.script || rest.asset_id != order_output.asset_id {
                        return Err(OfferLedgerError::script(
                            i,
                            format!("output {r} does not carry the order's contract"),
                        ));
                    }
                    if rest.amount == 0 || rest.amount >= order_output.amount {
                        return Err(OfferLedgerError::script(
                            i,
                            format!("remainder {} out of range for order of {}", rest.amount, order_output.amount),
                        ));
                    }
                    order_output.amount - rest.amount
                }
                None => order_output.amount,
            };

            let due = payment_for(tier, redeemed).map_err(|e| OfferLedgerError::script(i, e.to_string()))?;
            let payment = claim(i, tx, payment_output, claimed)?;
            if payment.script != terms.seller_script()
                || payment.asset_id != tier.payment_asset_id
                || payment.amount != due
            {
                return Err(OfferLedgerError::script(
                    i,
                    format!("output {payment_output} does not pay the seller {due} of {}", tier.payment_asset_id.short()),
                ));
            }
            Ok(())
        }
    }
}

/// Fetch output `index` and mark it as claimed; each output backs one redeem leg.
fn claim<'a>(i: usize, tx: &'a Tx, index: u32, claimed: &mut HashSet<u32>) -> Result<&'a TxOutput> {
    let output = usize::try_from(index)
        .ok()
        .and_then(|idx| tx.outputs.get(idx))
        .ok_or_else(|| OfferLedgerError::script(i, format!("no output {index}")))?;
    if !claimed.insert(index) {
        return Err(OfferLedgerError::script(
            i,
            format!("output {index} already claimed by another redeem"),
        ));
    }
    Ok(output)
}
