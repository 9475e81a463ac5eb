//! The ledger gateway: how builders read committed state and submit
//! transactions.
//!
//! A ledger is passed to the builder as an explicit handle. All mutation
//! funnels through [`Ledger::finalize`] and [`Ledger::make_block`], which an
//! implementation must serialise; that serialisation point is the sole
//! tie-breaker between transactions racing for one outpoint.

use offerledger_types::{Block, CommittedTx, Outpoint, Result, Script, Tx, TxOutput, Utxo};

use crate::OrderIndex;

pub trait Ledger: Send + Sync {
    /// The committed, unspent output at `outpoint`.
    fn utxo(&self, outpoint: &Outpoint) -> Result<Option<TxOutput>>;

    /// Committed, unspent outputs locked by `script`. Pending spends are
    /// not filtered out; see [`Ledger::is_pending_spend`].
    fn unspent_for_script(&self, script: &Script) -> Result<Vec<Utxo>>;

    /// Whether a finalized, not yet blocked transaction spends `outpoint`.
    fn is_pending_spend(&self, outpoint: &Outpoint) -> Result<bool>;

    /// Validate and accept a signed transaction into the pending set.
    ///
    /// # Errors
    /// - `AlreadySpent` if an input is spent or pending-spent
    /// - `UnbalancedAssets` if an asset does not balance
    /// - `ScriptUnsatisfied` if a witness does not satisfy its script
    /// - `LedgerUnavailable` if committed state cannot be read
    fn finalize(&self, tx: Tx) -> Result<CommittedTx>;

    /// Commit every pending transaction as one block and reconcile the
    /// order index. On failure nothing is committed and the pending set is
    /// kept for a retry.
    fn make_block(&self) -> Result<Block>;

    /// The open-order projection, reflecting committed blocks only.
    fn order_index(&self) -> &OrderIndex;

    /// Height of the latest committed block.
    fn height(&self) -> Result<u64>;
}
