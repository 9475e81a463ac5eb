//! # offerledger-types
//!
//! Shared types, errors, and configuration for **OfferLedger**, a
//! multi-asset UTXO ledger with an on-ledger orderbook contract.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`AssetId`], [`TxHash`], [`Outpoint`], [`PublicKey`], [`AccountId`], [`TemplateId`], [`AssetDefinition`]
//! - **Values**: [`AssetAmount`], [`PriceTier`]
//! - **Scripts**: [`Script`]
//! - **Transactions**: [`Tx`], [`TxInput`], [`TxOutput`], [`Witness`], [`ContractClause`], [`CommittedTx`], [`Utxo`], [`Block`]
//! - **Templates**: [`TxTemplate`], [`SigningInstruction`]
//! - **Build flows**: [`Source`], [`Destination`]
//! - **Orders**: [`OrderInfo`], [`OpenOrder`], [`OrderStatus`]
//! - **Configuration**: [`LedgerConfig`], [`BuilderConfig`], [`OfferLedgerConfig`]
//! - **Errors**: [`OfferLedgerError`] with `OL_ERR_` prefix codes
//! - **Constants**: system-wide limits and domain tags

pub mod amount;
pub mod config;
pub mod constants;
pub mod error;
pub mod flow;
pub mod ids;
pub mod order;
pub mod script;
pub mod template;
pub mod tx;

// Re-export all primary types at crate root for ergonomic imports:
//   use offerledger_types::{AssetAmount, Source, TxTemplate, ...};

pub use amount::*;
pub use config::*;
pub use error::*;
pub use flow::*;
pub use ids::*;
pub use order::*;
pub use script::Script;
pub use template::*;
pub use tx::*;

// Constants are accessed via `offerledger_types::constants::FOO`
// (not re-exported to avoid name collisions).
