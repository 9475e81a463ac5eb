//! The transaction builder.
//!
//! Turns resolved sources and destinations into one balanced, unsigned
//! [`TxTemplate`]:
//!
//! 1. Destinations become outputs, in request order
//! 2. Orderbook sources load their order output from the ledger; a redeem
//!    is priced by the contract and re-locks any unsold remainder
//! 3. Account sources select the account's outputs smallest-first, skipping
//!    reserved and pending-spent ones; any excess comes back as change
//! 4. Every asset must balance: more out than in is `InsufficientFunds`,
//!    more in than out is `UnbalancedAssets`
//! 5. Selected account outputs are reserved for the template's ttl
//!
//! Output layout: destinations, then redeem remainders, then change.
//! Nothing is reserved unless every step succeeds.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use offerledger_contracts::{check_balance, orderbook};
use offerledger_ledger::Ledger;
use offerledger_types::{
    AccountId, AssetAmount, AssetDefinition, AssetId, BuilderConfig, CommittedTx, ContractClause, Destination,
    ErrorKind, OfferLedgerError, OpenOrder, Outpoint, PublicKey, Result, Script, SigningInstruction, Source, TemplateId,
    TxInput, TxOutput, TxTemplate, Utxo,
};

use crate::accounts::AccountDirectory;
use crate::request::BuildRequest;
use crate::reservation::{ReservationTable, Reservations};
use crate::resolver::{resolve_destination, resolve_source};
use crate::signing::{Signer, sign_template};

/// A redeem input awaiting its witness clause.
struct PendingRedeem {
    input_index: usize,
    tier_index: u16,
    seller_script: Script,
    payment: AssetAmount,
    remainder_output: Option<u32>,
}

/// Builds, signs, and finalizes transactions against one ledger.
pub struct TransactionBuilder<L, A> {
    ledger: Arc<L>,
    accounts: Arc<A>,
    reservations: Reservations,
    config: BuilderConfig,
}

impl<L: Ledger, A: AccountDirectory> TransactionBuilder<L, A> {
    /// A builder over `ledger`. Pass the same `reservations` to every
    /// builder on that ledger.
    #[must_use]
    pub fn new(ledger: Arc<L>, accounts: Arc<A>, reservations: Reservations, config: BuilderConfig) -> Self {
        Self {
            ledger,
            accounts,
            reservations,
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn accounts(&self) -> &Arc<A> {
        &self.accounts
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn reservations(&self) -> MutexGuard<'_, ReservationTable> {
        self.reservations.lock()
    }

    // =================================================================
    // Build
    // =================================================================

    /// Build a balanced template from sources and destinations, reserving
    /// selected account outputs for `ttl`.
    pub fn build(&self, sources: Vec<Source>, destinations: Vec<Destination>, ttl: Duration) -> Result<TxTemplate> {
        if sources.is_empty() {
            return Err(OfferLedgerError::validation("build: no sources"));
        }
        if destinations.is_empty() {
            return Err(OfferLedgerError::validation("build: no destinations"));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .ok()
            .filter(|d| *d > chrono::Duration::zero())
            .ok_or_else(|| OfferLedgerError::validation("build: ttl must be positive and in range"))?;

        let id = TemplateId::new();
        let mut outputs = Vec::with_capacity(destinations.len());
        for destination in &destinations {
            outputs.push(self.destination_output(destination)?);
        }

        let mut inputs = Vec::new();
        let mut signing_instructions = Vec::new();
        let mut redeems = Vec::new();
        let mut remainders = Vec::new();
        let mut account_sources = Vec::new();

        for source in sources {
            match source {
                Source::Account {
                    asset_amount,
                    account_id,
                } => account_sources.push((asset_amount, account_id)),
                Source::OrderbookRedeem {
                    outpoint,
                    offer_amount,
                    payment,
                } => {
                    let (order_output, order) = self.load_order(&outpoint)?;
                    let quote = orderbook::redeem(&order, offer_amount)?;
                    if quote.payment() != payment {
                        return Err(OfferLedgerError::AmountMismatch {
                            reason: format!(
                                "order {outpoint} wants {} for {offer_amount}, offered {payment}",
                                quote.payment()
                            ),
                        });
                    }
                    let remainder_output = match orderbook::remainder_output(&order_output, quote.remainder) {
                        Some(rest) => {
                            remainders.push(rest);
                            Some(remainders.len() - 1)
                        }
                        None => None,
                    };
                    let tier_index = u16::try_from(quote.tier_index)
                        .map_err(|_| OfferLedgerError::Internal("tier index out of range".into()))?;
                    redeems.push((
                        PendingRedeem {
                            input_index: inputs.len(),
                            tier_index,
                            seller_script: order.seller_script(),
                            payment,
                            remainder_output: None,
                        },
                        remainder_output,
                    ));
                    inputs.push(TxInput::spend(outpoint, order_output));
                }
                Source::OrderbookCancel { outpoint } => {
                    let (order_output, order) = self.load_order(&outpoint)?;
                    let plan = orderbook::cancel(&order);
                    let mut input = TxInput::spend(outpoint, order_output);
                    input.witness.clause = Some(ContractClause::Cancel);
                    signing_instructions.push(SigningInstruction {
                        input_index: inputs.len(),
                        key: plan.seller_key,
                    });
                    inputs.push(input);
                }
                Source::Issuance { definition, amount } => {
                    check_issuance(&definition, amount)?;
                    signing_instructions.push(SigningInstruction {
                        input_index: inputs.len(),
                        key: definition.issuer_key,
                    });
                    inputs.push(TxInput::issue(definition, amount, *id.0.as_bytes()));
                }
            }
        }

        // Selection through reservation happens under one lock, so two
        // builds can never pick the same output.
        let now = Utc::now();
        let mut reservations = self.reservations();
        let mut selected = Vec::new();
        let mut change = Vec::new();
        for (asset_amount, account_id) in account_sources {
            let (key, picked, total) = self.select(&reservations, &selected, asset_amount, &account_id, now)?;
            let script = Script::pay_to_key(&key);
            for utxo in picked {
                selected.push(utxo.outpoint);
                signing_instructions.push(SigningInstruction {
                    input_index: inputs.len(),
                    key,
                });
                inputs.push(TxInput::spend(utxo.outpoint, utxo.output));
            }
            if total > asset_amount.amount {
                change.push(TxOutput::new(
                    AssetAmount::new(asset_amount.asset_id, total - asset_amount.amount),
                    script,
                ));
            }
        }

        let remainder_base = outputs.len();
        outputs.extend(remainders);
        outputs.extend(change);
        check_flows(&inputs, &outputs)?;

        let mut claimed = HashSet::new();
        for (mut redeem, remainder) in redeems {
            redeem.remainder_output = remainder.map(|r| index_u32(remainder_base + r)).transpose()?;
            if let Some(r) = redeem.remainder_output {
                claimed.insert(r);
            }
            attach_redeem_clause(&mut inputs, &outputs, &redeem, &mut claimed)?;
        }

        let reserved_until = now + ttl;
        reservations.reserve(id, &selected, reserved_until, now)?;
        drop(reservations);

        tracing::debug!(
            template = %id,
            inputs = inputs.len(),
            outputs = outputs.len(),
            reserved = selected.len(),
            until = %reserved_until,
            "Template built"
        );
        Ok(TxTemplate {
            id,
            inputs,
            outputs,
            signing_instructions,
            reserved_until,
        })
    }

    /// Issue `amount` units of `definition` to `destinations`.
    pub fn issue(
        &self,
        definition: AssetDefinition,
        amount: u64,
        destinations: Vec<Destination>,
        ttl: Duration,
    ) -> Result<TxTemplate> {
        self.build(vec![Source::Issuance { definition, amount }], destinations, ttl)
    }

    /// Resolve a request's descriptors and build.
    pub fn build_request(&self, request: &BuildRequest) -> Result<TxTemplate> {
        let sources = request.sources.iter().map(resolve_source).collect::<Result<Vec<_>>>()?;
        let destinations = request
            .destinations
            .iter()
            .map(resolve_destination)
            .collect::<Result<Vec<_>>>()?;
        let ttl = request
            .ttl_secs
            .map_or_else(|| self.config.reservation_ttl(), Duration::from_secs);
        self.build(sources, destinations, ttl)
    }

    fn destination_output(&self, destination: &Destination) -> Result<TxOutput> {
        let asset_amount = destination.asset_amount();
        if asset_amount.amount == 0 {
            return Err(OfferLedgerError::validation(format!(
                "{} destination: amount must be positive",
                destination.type_tag()
            )));
        }
        if destination.metadata().len() > self.config.max_output_metadata_bytes {
            return Err(OfferLedgerError::validation(format!(
                "{} destination: {} metadata bytes exceeds limit {}",
                destination.type_tag(),
                destination.metadata().len(),
                self.config.max_output_metadata_bytes
            )));
        }
        let script = match destination {
            Destination::Account { account_id, .. } => self.accounts.control_script(account_id)?,
            Destination::Address { script, .. } => script.clone(),
            Destination::Orderbook {
                order_info,
                allow_additional,
                ..
            } => {
                if order_info.prices.len() > self.config.max_price_tiers {
                    return Err(OfferLedgerError::validation(format!(
                        "orderbook destination: {} price tiers exceeds limit {}",
                        order_info.prices.len(),
                        self.config.max_price_tiers
                    )));
                }
                if order_info.accepts_payment_in(&asset_amount.asset_id) {
                    return Err(OfferLedgerError::validation(
                        "orderbook destination: asset cannot be priced in itself",
                    ));
                }
                orderbook::encode_script(order_info, *allow_additional)?
            }
        };
        Ok(TxOutput::new(asset_amount, script).with_metadata(destination.metadata().to_vec()))
    }

    /// Fetch a committed orderbook output and decode it.
    fn load_order(&self, outpoint: &Outpoint) -> Result<(TxOutput, OpenOrder)> {
        let output = self
            .ledger
            .utxo(outpoint)?
            .ok_or(OfferLedgerError::AlreadySpent(*outpoint))?;
        let order = orderbook::open_order_from_output(*outpoint, &output)
            .ok_or_else(|| OfferLedgerError::validation(format!("{outpoint} is not an open order")))?;
        Ok((output, order))
    }

    /// Pick the account's smallest eligible outputs until `wanted` is
    /// covered. Returns the control key, the picks, and their total.
    fn select(
        &self,
        reservations: &ReservationTable,
        already: &[Outpoint],
        wanted: AssetAmount,
        account: &AccountId,
        now: chrono::DateTime<Utc>,
    ) -> Result<(PublicKey, Vec<Utxo>, u64)> {
        let key = self.accounts.control_key(account)?;
        let mut candidates = Vec::new();
        for utxo in self.ledger.unspent_for_script(&Script::pay_to_key(&key))? {
            if utxo.output.asset_id != wanted.asset_id
                || already.contains(&utxo.outpoint)
                || reservations.is_reserved(&utxo.outpoint, now)
                || self.ledger.is_pending_spend(&utxo.outpoint)?
            {
                continue;
            }
            candidates.push(utxo);
        }
        candidates.sort_by_key(|u| (u.output.amount, u.outpoint));

        let mut picked = Vec::new();
        let mut total = 0u64;
        for utxo in candidates {
            if total >= wanted.amount {
                break;
            }
            total = total
                .checked_add(utxo.output.amount)
                .ok_or_else(|| OfferLedgerError::validation("selected total overflows"))?;
            picked.push(utxo);
        }
        if total < wanted.amount {
            return Err(OfferLedgerError::InsufficientFunds {
                asset: wanted.asset_id,
                needed: wanted.amount,
                available: total,
            });
        }
        tracing::debug!(
            account = %account,
            asset = %wanted.asset_id.short(),
            wanted = wanted.amount,
            selected = picked.len(),
            total,
            "Selected account outputs"
        );
        Ok((key, picked, total))
    }

    // =================================================================
    // Sign / finalize
    // =================================================================

    /// Sign every instruction of `template` with `signer`.
    pub fn sign(&self, template: &mut TxTemplate, signer: &dyn Signer) -> Result<()> {
        sign_template(template, signer)
    }

    /// Re-check balance, submit to the ledger, and release the template's
    /// reservations once the ledger has answered. Reservations survive a
    /// `LedgerUnavailable` answer so the caller can retry.
    pub fn finalize_tx(&self, template: &TxTemplate) -> Result<CommittedTx> {
        let tx = template.to_tx();
        check_balance(&tx)?;
        let result = self.ledger.finalize(tx);
        match &result {
            Err(e) if e.kind() == ErrorKind::LedgerUnavailable => {}
            _ => {
                let released = self.reservations().release(&template.id);
                tracing::debug!(template = %template.id, released, "Reservations released");
            }
        }
        match &result {
            Ok(committed) => {
                tracing::info!(template = %template.id, tx = %committed.hash.short(), "Template finalized");
            }
            Err(e) => tracing::warn!(template = %template.id, error = %e, "Finalize rejected"),
        }
        result
    }

    /// Drop a template's reservations without finalizing it.
    pub fn release(&self, template: &TemplateId) -> usize {
        self.reservations().release(template)
    }

    /// Outpoints currently held by reservations, expired or not.
    pub fn reserved_count(&self) -> usize {
        self.reservations().len()
    }
}

fn check_issuance(definition: &AssetDefinition, amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(OfferLedgerError::validation("issue source: amount must be positive"));
    }
    if definition.label.is_empty() {
        return Err(OfferLedgerError::validation("issue source: label must not be empty"));
    }
    Ok(())
}

fn index_u32(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| OfferLedgerError::validation("too many outputs"))
}

/// Per-asset totals: out > in is `InsufficientFunds`, in > out is `UnbalancedAssets`.
fn check_flows(inputs: &[TxInput], outputs: &[TxOutput]) -> Result<()> {
    let mut flows: BTreeMap<AssetId, (u64, u64)> = BTreeMap::new();
    let overflow = || OfferLedgerError::validation("asset total overflows");
    for input in inputs {
        let amount = input.asset_amount();
        let entry = flows.entry(amount.asset_id).or_default();
        entry.0 = entry.0.checked_add(amount.amount).ok_or_else(overflow)?;
    }
    for output in outputs {
        let entry = flows.entry(output.asset_id).or_default();
        entry.1 = entry.1.checked_add(output.amount).ok_or_else(overflow)?;
    }
    for (asset, (inputs, outputs)) in flows {
        if outputs > inputs {
            return Err(OfferLedgerError::InsufficientFunds {
                asset,
                needed: outputs,
                available: inputs,
            });
        }
        if inputs > outputs {
            return Err(OfferLedgerError::UnbalancedAssets { asset, inputs, outputs });
        }
    }
    Ok(())
}

/// Point a redeem input at the first unclaimed output paying the seller
/// exactly the amount due.
fn attach_redeem_clause(
    inputs: &mut [TxInput],
    outputs: &[TxOutput],
    redeem: &PendingRedeem,
    claimed: &mut HashSet<u32>,
) -> Result<()> {
    let mut payment_output = None;
    for (i, output) in outputs.iter().enumerate() {
        let i = index_u32(i)?;
        if output.script == redeem.seller_script
            && output.asset_amount() == redeem.payment
            && !claimed.contains(&i)
        {
            payment_output = Some(i);
            break;
        }
    }
    let payment_output = payment_output.ok_or_else(|| {
        OfferLedgerError::validation(format!(
            "no destination pays the seller {} for redeem input {}",
            redeem.payment, redeem.input_index
        ))
    })?;
    claimed.insert(payment_output);
    inputs[redeem.input_index].witness.clause = Some(ContractClause::Redeem {
        tier_index: redeem.tier_index,
        payment_output,
        remainder_output: redeem.remainder_output,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use offerledger_types::TxHash;

    use super::*;

    fn out(asset: u8, amount: u64, script: &Script) -> TxOutput {
        TxOutput::new(AssetAmount::new(AssetId([asset; 32]), amount), script.clone())
    }

    #[test]
    fn flows_distinguish_shortfall_and_excess() {
        let script = Script::pay_to_key(&PublicKey([1u8; 32]));
        let def = AssetDefinition::new(PublicKey([1u8; 32]), "X");
        let asset = def.asset_id();
        let inputs = vec![TxInput::issue(def, 10, [0u8; 16])];

        let short = vec![TxOutput::new(AssetAmount::new(asset, 11), script.clone())];
        assert_eq!(check_flows(&inputs, &short).unwrap_err().kind(), ErrorKind::InsufficientFunds);

        let excess = vec![TxOutput::new(AssetAmount::new(asset, 9), script.clone())];
        assert_eq!(check_flows(&inputs, &excess).unwrap_err().kind(), ErrorKind::UnbalancedAssets);

        let exact = vec![TxOutput::new(AssetAmount::new(asset, 10), script)];
        assert!(check_flows(&inputs, &exact).is_ok());
    }

    #[test]
    fn redeem_clause_skips_claimed_outputs() {
        let seller = Script::pay_to_key(&PublicKey([2u8; 32]));
        let outputs = vec![out(5, 100, &seller), out(5, 100, &seller), out(5, 50, &seller)];
        let order_output = out(9, 10, &Script(vec![0x02]));
        let mut inputs = vec![
            TxInput::spend(Outpoint::new(TxHash([1u8; 32]), 0), order_output.clone()),
            TxInput::spend(Outpoint::new(TxHash([1u8; 32]), 1), order_output),
        ];
        let redeem = |input_index| PendingRedeem {
            input_index,
            tier_index: 0,
            seller_script: seller.clone(),
            payment: AssetAmount::new(AssetId([5u8; 32]), 100),
            remainder_output: None,
        };
        let mut claimed = HashSet::new();
        attach_redeem_clause(&mut inputs, &outputs, &redeem(0), &mut claimed).unwrap();
        attach_redeem_clause(&mut inputs, &outputs, &redeem(1), &mut claimed).unwrap();
        assert_eq!(
            inputs[1].witness.clause,
            Some(ContractClause::Redeem {
                tier_index: 0,
                payment_output: 1,
                remainder_output: None
            })
        );

        // A third redeem finds nothing left to claim.
        let mut more = inputs.clone();
        more.push(more[0].clone());
        let err = attach_redeem_clause(&mut more, &outputs, &redeem(2), &mut claimed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }
}
