//! # offerledger-ledger
//!
//! **Ledger plane**: committed UTXO state, the pending-transaction set, block
//! production, and the open-order projection.
//!
//! ## Flow
//!
//! 1. [`Ledger::finalize`] checks a signed transaction against committed state
//!    (unspent, not pending), per-asset balance, and every input's script, then
//!    holds it as pending
//! 2. [`Ledger::make_block`] gathers pending transactions into a [`BlockCommit`],
//!    runs the [`SupplyAudit`], and applies it to the [`Store`] atomically
//! 3. On success the [`OrderIndex`] swaps in the next snapshot
//!
//! Reads through the index reflect committed blocks only.

pub mod gateway;
pub mod index;
pub mod memory;
pub mod store;
pub mod supply;

pub use gateway::Ledger;
pub use index::{OrderIndex, OrderIter, OrderQuery, ReconcileSummary};
pub use memory::MemoryLedger;
pub use store::{BlockCommit, MemoryStore, Store};
pub use supply::SupplyAudit;
