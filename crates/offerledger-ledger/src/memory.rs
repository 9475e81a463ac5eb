//! Reference [`Ledger`] over any [`Store`].
//!
//! Finalized transactions wait in a mempool until [`Ledger::make_block`].
//! A single mutex guards the mempool and the set of pending spends; it is
//! held across the whole of `finalize` and `make_block`, so the first of two
//! racing spends to take it wins and the other sees `AlreadySpent`.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use offerledger_contracts::{check_balance, orderbook, verify_tx};
use offerledger_types::{
    AssetAmount, AssetId, Block, CommittedTx, InputKind, LedgerConfig, OfferLedgerError, Outpoint,
    Result, Script, Tx, TxOutput, Utxo,
};

use crate::{BlockCommit, Ledger, MemoryStore, OrderIndex, Store, SupplyAudit};

#[derive(Debug)]
struct LedgerState {
    height: u64,
    mempool: Vec<CommittedTx>,
    pending_spends: HashSet<Outpoint>,
    supply: SupplyAudit,
}

/// A ledger that commits blocks on demand.
#[derive(Debug)]
pub struct MemoryLedger<S: Store = MemoryStore> {
    store: S,
    config: LedgerConfig,
    state: Mutex<LedgerState>,
    index: OrderIndex,
}

impl MemoryLedger<MemoryStore> {
    /// A fresh ledger over an empty [`MemoryStore`] with default config.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: MemoryStore::new(),
            config: LedgerConfig::default(),
            state: Mutex::new(LedgerState {
                height: 0,
                mempool: Vec::new(),
                pending_spends: HashSet::new(),
                supply: SupplyAudit::new(),
            }),
            index: OrderIndex::new(),
        }
    }
}

impl<S: Store> MemoryLedger<S> {
    /// Open a ledger over existing committed state, rebuilding the order
    /// index and supply totals from the store.
    pub fn open(store: S, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let height = store.height()?;
        let index = OrderIndex::from_orders(height, store.open_orders()?);
        let supply = SupplyAudit::from_issued(store.issued_supply()?);
        tracing::info!(
            height,
            open_orders = index.len(),
            assets = supply.asset_count(),
            "Ledger opened"
        );
        Ok(Self {
            store,
            config,
            state: Mutex::new(LedgerState {
                height,
                mempool: Vec::new(),
                pending_spends: HashSet::new(),
                supply,
            }),
            index,
        })
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of finalized transactions awaiting a block.
    pub fn pending_count(&self) -> usize {
        self.lock().mempool.len()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // Every mutation follows the last fallible step; poisoned state is consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shape checks that need no state.
    fn check_shape(&self, tx: &Tx) -> Result<()> {
        if tx.inputs.is_empty() {
            return Err(OfferLedgerError::validation("transaction has no inputs"));
        }
        if tx.inputs.len() > self.config.max_tx_inputs {
            return Err(OfferLedgerError::validation(format!(
                "{} inputs exceeds limit {}",
                tx.inputs.len(),
                self.config.max_tx_inputs
            )));
        }
        if tx.outputs.len() > self.config.max_tx_outputs {
            return Err(OfferLedgerError::validation(format!(
                "{} outputs exceeds limit {}",
                tx.outputs.len(),
                self.config.max_tx_outputs
            )));
        }
        if let Some(i) = tx.outputs.iter().position(|o| o.amount == 0) {
            return Err(OfferLedgerError::validation(format!("output {i} has zero amount")));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = tx.spent_outpoints().find(|op| !seen.insert(**op)) {
            return Err(OfferLedgerError::validation(format!(
                "outpoint {dup} spent twice in one transaction"
            )));
        }
        Ok(())
    }

    /// Post-block unspent totals for every asset a block touches, checked
    /// against issued supply. Runs before anything is written.
    fn audit_block(&self, commit: &BlockCommit, spent: &[TxOutput], supply: &mut SupplyAudit) -> Result<()> {
        for issued in &commit.issued {
            supply.record_issuance(issued.asset_id, issued.amount)?;
        }
        let touched: BTreeSet<AssetId> = commit
            .created
            .iter()
            .map(|u| u.output.asset_id)
            .chain(spent.iter().map(|o| o.asset_id))
            .chain(commit.issued.iter().map(|a| a.asset_id))
            .collect();
        for asset in touched {
            let overflow = || OfferLedgerError::SupplyInvariantViolation {
                reason: format!("supply arithmetic for asset {asset} out of range"),
            };
            let removed = sum_of(spent.iter(), asset).ok_or_else(overflow)?;
            let added = sum_of(commit.created.iter().map(|u| &u.output), asset).ok_or_else(overflow)?;
            let actual = self
                .store
                .unspent_total(&asset)?
                .checked_sub(removed)
                .and_then(|t| t.checked_add(added))
                .ok_or_else(overflow)?;
            supply.verify(&asset, actual)?;
        }
        Ok(())
    }
}

fn sum_of<'a>(outputs: impl Iterator<Item = &'a TxOutput>, asset: AssetId) -> Option<u64> {
    outputs
        .filter(|o| o.asset_id == asset)
        .try_fold(0u64, |total, o| total.checked_add(o.amount))
}

impl<S: Store> Ledger for MemoryLedger<S> {
    fn utxo(&self, outpoint: &Outpoint) -> Result<Option<TxOutput>> {
        self.store.utxo(outpoint)
    }

    fn unspent_for_script(&self, script: &Script) -> Result<Vec<Utxo>> {
        self.store.utxos_for_script(script)
    }

    fn is_pending_spend(&self, outpoint: &Outpoint) -> Result<bool> {
        Ok(self.lock().pending_spends.contains(outpoint))
    }

    fn finalize(&self, tx: Tx) -> Result<CommittedTx> {
        self.check_shape(&tx)?;
        let committed = CommittedTx::new(tx);

        let mut state = self.lock();
        if state.mempool.len() >= self.config.max_pending_txs {
            return Err(OfferLedgerError::LedgerUnavailable {
                reason: format!("{} transactions already pending", state.mempool.len()),
            });
        }
        for input in &committed.tx.inputs {
            let InputKind::Spend { outpoint, prev_out } = &input.kind else {
                continue;
            };
            if state.pending_spends.contains(outpoint) {
                tracing::warn!(tx = %committed.hash.short(), %outpoint, "Rejected: outpoint spent by a pending transaction");
                return Err(OfferLedgerError::AlreadySpent(*outpoint));
            }
            match self.store.utxo(outpoint)? {
                None => {
                    tracing::warn!(tx = %committed.hash.short(), %outpoint, "Rejected: outpoint not unspent");
                    return Err(OfferLedgerError::AlreadySpent(*outpoint));
                }
                Some(stored) if stored != *prev_out => {
                    return Err(OfferLedgerError::validation(format!(
                        "input {outpoint} does not match the committed output"
                    )));
                }
                Some(_) => {}
            }
        }

        // Resubmitted issuance; a resubmitted spend fails above.
        if state.mempool.iter().any(|p| p.hash == committed.hash) || self.store.contains_tx(&committed.hash)? {
            return Err(OfferLedgerError::validation(format!(
                "transaction {} already submitted",
                committed.hash
            )));
        }

        if let Err(e) = check_balance(&committed.tx).and_then(|()| verify_tx(&committed.tx)) {
            tracing::warn!(tx = %committed.hash.short(), error = %e, "Rejected transaction");
            return Err(e);
        }

        state.pending_spends.extend(committed.tx.spent_outpoints().copied());
        state.mempool.push(committed.clone());
        tracing::info!(
            tx = %committed.hash.short(),
            inputs = committed.tx.inputs.len(),
            outputs = committed.tx.outputs.len(),
            pending = state.mempool.len(),
            "Transaction finalized"
        );
        Ok(committed)
    }

    fn make_block(&self) -> Result<Block> {
        let mut state = self.lock();

        let mut spent = Vec::new();
        let mut spent_outputs = Vec::new();
        let mut created = Vec::new();
        let mut issued = Vec::new();
        for pending in &state.mempool {
            for input in &pending.tx.inputs {
                match &input.kind {
                    InputKind::Spend { outpoint, prev_out } => {
                        spent.push(*outpoint);
                        spent_outputs.push(prev_out.clone());
                    }
                    InputKind::Issue { definition, amount, .. } => {
                        issued.push(AssetAmount::new(definition.asset_id(), *amount));
                    }
                }
            }
            created.extend(pending.utxos());
        }

        let commit = BlockCommit {
            block: Block {
                height: state.height + 1,
                timestamp: Utc::now(),
                tx_hashes: state.mempool.iter().map(|p| p.hash).collect(),
            },
            spent,
            created,
            issued,
        };

        let mut supply = state.supply.clone();
        if self.config.audit_supply {
            if let Err(e) = self.audit_block(&commit, &spent_outputs, &mut supply) {
                tracing::warn!(height = commit.block.height, error = %e, "Block refused before commit");
                return Err(e);
            }
        } else {
            for amount in &commit.issued {
                supply.record_issuance(amount.asset_id, amount.amount)?;
            }
        }

        if let Err(e) = self.store.commit_block(&commit) {
            tracing::warn!(
                height = commit.block.height,
                pending = state.mempool.len(),
                error = %e,
                "Block commit failed; pending transactions retained"
            );
            return Err(e);
        }

        let admitted = commit
            .created
            .iter()
            .filter_map(|u| orderbook::open_order_from_output(u.outpoint, &u.output))
            .collect();
        let summary = self.index.reconcile(commit.block.height, &commit.spent, admitted);

        state.height = commit.block.height;
        state.mempool.clear();
        state.pending_spends.clear();
        state.supply = supply;

        tracing::info!(
            height = commit.block.height,
            txs = commit.block.tx_hashes.len(),
            orders_opened = summary.added,
            orders_closed = summary.removed,
            "Block committed"
        );
        Ok(commit.block)
    }

    fn order_index(&self) -> &OrderIndex {
        &self.index
    }

    fn height(&self) -> Result<u64> {
        Ok(self.lock().height)
    }
}
