//! Committed ledger state.
//!
//! The [`Store`] holds the UTXO set, committed transaction hashes, block
//! headers and issued totals. It changes only through
//! [`Store::commit_block`], which applies a whole block or nothing.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use offerledger_types::{
    AssetAmount, AssetId, Block, OfferLedgerError, OpenOrder, Outpoint, Result, Script, TxHash,
    TxOutput, Utxo,
};

/// Everything one block changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCommit {
    pub block: Block,
    /// Outpoints consumed by the block's transactions.
    pub spent: Vec<Outpoint>,
    /// Outputs created by the block's transactions.
    pub created: Vec<Utxo>,
    /// Units created by issuance inputs.
    pub issued: Vec<AssetAmount>,
}

/// Durable committed state, as seen by the ledger.
pub trait Store: Send + Sync {
    /// The unspent output at `outpoint`, if any.
    fn utxo(&self, outpoint: &Outpoint) -> Result<Option<TxOutput>>;

    /// Every unspent output locked by `script`.
    fn utxos_for_script(&self, script: &Script) -> Result<Vec<Utxo>>;

    /// Every unspent orderbook output, decoded.
    fn open_orders(&self) -> Result<Vec<OpenOrder>>;

    /// Sum of unspent outputs of `asset`.
    fn unspent_total(&self, asset: &AssetId) -> Result<u64>;

    /// Issued totals per asset.
    fn issued_supply(&self) -> Result<Vec<(AssetId, u64)>>;

    /// Whether a transaction with this hash was ever committed.
    fn contains_tx(&self, hash: &TxHash) -> Result<bool>;

    /// Height of the latest committed block (genesis is 0).
    fn height(&self) -> Result<u64>;

    /// Apply a block atomically.
    fn commit_block(&self, commit: &BlockCommit) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct StoreState {
    utxos: BTreeMap<Outpoint, TxOutput>,
    txs: HashSet<TxHash>,
    blocks: Vec<Block>,
    issued: BTreeMap<AssetId, u64>,
}

/// In-memory [`Store`]. Can be switched unavailable to simulate an outage.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    available: AtomicBool,
}

impl MemoryStore {
    /// A store holding only the empty genesis block.
    #[must_use]
    pub fn new() -> Self {
        Self::with_genesis_time(Utc::now())
    }

    #[must_use]
    pub fn with_genesis_time(timestamp: DateTime<Utc>) -> Self {
        let genesis = Block {
            height: 0,
            timestamp,
            tx_hashes: Vec::new(),
        };
        Self {
            state: RwLock::new(StoreState {
                utxos: BTreeMap::new(),
                txs: HashSet::new(),
                blocks: vec![genesis],
                issued: BTreeMap::new(),
            }),
            available: AtomicBool::new(true),
        }
    }

    /// Make every subsequent call fail (`false`) or succeed (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// The block at `height`, if committed.
    pub fn block(&self, height: u64) -> Result<Option<Block>> {
        let state = self.read()?;
        Ok(usize::try_from(height)
            .ok()
            .and_then(|h| state.blocks.get(h))
            .cloned())
    }

    /// Number of unspent outputs.
    pub fn utxo_count(&self) -> Result<usize> {
        Ok(self.read()?.utxos.len())
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OfferLedgerError::LedgerUnavailable {
                reason: "store is unavailable".into(),
            })
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.check_available()?;
        Ok(self.state.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn utxo(&self, outpoint: &Outpoint) -> Result<Option<TxOutput>> {
        Ok(self.read()?.utxos.get(outpoint).cloned())
    }

    fn utxos_for_script(&self, script: &Script) -> Result<Vec<Utxo>> {
        Ok(self
            .read()?
            .utxos
            .iter()
            .filter(|(_, output)| output.script == *script)
            .map(|(outpoint, output)| Utxo {
                outpoint: *outpoint,
                output: output.clone(),
            })
            .collect())
    }

    fn open_orders(&self) -> Result<Vec<OpenOrder>> {
        Ok(self
            .read()?
            .utxos
            .iter()
            .filter_map(|(outpoint, output)| {
                offerledger_contracts::orderbook::open_order_from_output(*outpoint, output)
            })
            .collect())
    }

    fn unspent_total(&self, asset: &AssetId) -> Result<u64> {
        self.read()?
            .utxos
            .values()
            .filter(|output| output.asset_id == *asset)
            .try_fold(0u64, |total, output| total.checked_add(output.amount))
            .ok_or_else(|| OfferLedgerError::SupplyInvariantViolation {
                reason: format!("unspent total of asset {asset} overflows"),
            })
    }

    fn issued_supply(&self) -> Result<Vec<(AssetId, u64)>> {
        Ok(self
            .read()?
            .issued
            .iter()
            .map(|(asset, total)| (*asset, *total))
            .collect())
    }

    fn contains_tx(&self, hash: &TxHash) -> Result<bool> {
        Ok(self.read()?.txs.contains(hash))
    }

    fn height(&self) -> Result<u64> {
        Ok(self.read()?.blocks.last().map_or(0, |b| b.height))
    }

    fn commit_block(&self, commit: &BlockCommit) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let tip = state.blocks.last().map_or(0, |b| b.height);
        if commit.block.height != tip + 1 {
            return Err(OfferLedgerError::Internal(format!(
                "block height {} does not extend tip {tip}",
                commit.block.height
            )));
        }
        if let Some(missing) = commit.spent.iter().find(|op| !state.utxos.contains_key(op)) {
            return Err(OfferLedgerError::AlreadySpent(*missing));
        }
        // Validate issuance totals before mutating anything.
        let mut issued = state.issued.clone();
        for amount in &commit.issued {
            let total = issued.entry(amount.asset_id).or_insert(0);
            *total = total.checked_add(amount.amount).ok_or_else(|| {
                OfferLedgerError::SupplyInvariantViolation {
                    reason: format!("issued supply of asset {} overflows", amount.asset_id),
                }
            })?;
        }

        for outpoint in &commit.spent {
            state.utxos.remove(outpoint);
        }
        for utxo in &commit.created {
            state.utxos.insert(utxo.outpoint, utxo.output.clone());
        }
        state.txs.extend(commit.block.tx_hashes.iter().copied());
        state.issued = issued;
        state.blocks.push(commit.block.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use offerledger_types::{ErrorKind, PublicKey};

    use super::*;

    fn output(amount: u64) -> TxOutput {
        TxOutput::new(
            AssetAmount::new(AssetId([1u8; 32]), amount),
            Script::pay_to_key(&PublicKey([2u8; 32])),
        )
    }

    fn commit(height: u64, spent: Vec<Outpoint>, created: Vec<Utxo>) -> BlockCommit {
        BlockCommit {
            block: Block {
                height,
                timestamp: Utc::now(),
                tx_hashes: vec![TxHash([u8::try_from(height).unwrap(); 32])],
            },
            spent,
            created,
            issued: vec![],
        }
    }

    #[test]
    fn starts_at_genesis() {
        let store = MemoryStore::new();
        assert_eq!(store.height().unwrap(), 0);
        assert_eq!(store.block(0).unwrap().unwrap().tx_hashes.len(), 0);
        assert_eq!(store.utxo_count().unwrap(), 0);
    }

    #[test]
    fn commit_applies_spends_and_creates() {
        let store = MemoryStore::new();
        let a = Outpoint::new(TxHash([1u8; 32]), 0);
        let b = Outpoint::new(TxHash([2u8; 32]), 0);
        store
            .commit_block(&commit(1, vec![], vec![Utxo { outpoint: a, output: output(10) }]))
            .unwrap();
        store
            .commit_block(&commit(2, vec![a], vec![Utxo { outpoint: b, output: output(10) }]))
            .unwrap();
        assert_eq!(store.height().unwrap(), 2);
        assert!(store.utxo(&a).unwrap().is_none());
        assert_eq!(store.utxo(&b).unwrap().unwrap().amount, 10);
        assert_eq!(store.unspent_total(&AssetId([1u8; 32])).unwrap(), 10);
        assert!(store.contains_tx(&TxHash([2u8; 32])).unwrap());
        let script = Script::pay_to_key(&PublicKey([2u8; 32]));
        assert_eq!(store.utxos_for_script(&script).unwrap().len(), 1);
    }

    #[test]
    fn commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        let a = Outpoint::new(TxHash([1u8; 32]), 0);
        let missing = Outpoint::new(TxHash([9u8; 32]), 0);
        let err = store
            .commit_block(&commit(1, vec![missing], vec![Utxo { outpoint: a, output: output(10) }]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadySpent);
        assert_eq!(store.height().unwrap(), 0);
        assert!(store.utxo(&a).unwrap().is_none());
    }

    #[test]
    fn rejects_non_consecutive_height() {
        let store = MemoryStore::new();
        assert!(store.commit_block(&commit(2, vec![], vec![])).is_err());
    }

    #[test]
    fn unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert_eq!(store.height().unwrap_err().kind(), ErrorKind::LedgerUnavailable);
        assert_eq!(
            store.commit_block(&commit(1, vec![], vec![])).unwrap_err().kind(),
            ErrorKind::LedgerUnavailable
        );
        store.set_available(true);
        assert!(store.commit_block(&commit(1, vec![], vec![])).is_ok());
    }

    #[test]
    fn records_issued_supply() {
        let store = MemoryStore::new();
        let mut c = commit(1, vec![], vec![]);
        c.issued = vec![AssetAmount::new(AssetId([1u8; 32]), 7)];
        store.commit_block(&c).unwrap();
        assert_eq!(store.issued_supply().unwrap(), vec![(AssetId([1u8; 32]), 7)]);
    }
}
