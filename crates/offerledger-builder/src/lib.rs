//! # offerledger-builder
//!
//! **Assembly plane**: turns a build request into a balanced, signed
//! transaction and submits it to a [`Ledger`](offerledger_ledger::Ledger).
//!
//! ## Flow
//!
//! 1. [`resolve_source`] / [`resolve_destination`] turn tagged request
//!    descriptors into typed sources and destinations
//! 2. [`TransactionBuilder::build`] selects account outputs, prices orderbook
//!    redeems, balances every asset, and reserves what it selected
//! 3. [`TransactionBuilder::sign`] asks a [`Signer`] for each signature
//! 4. [`TransactionBuilder::finalize_tx`] submits to the ledger and releases
//!    the template's reservations
//!
//! The ledger is the only arbiter of spend races. Reservations keep builds
//! from picking the same account output; builders on one ledger share them
//! through a [`Reservations`] handle.

pub mod accounts;
pub mod builder;
pub mod request;
pub mod reservation;
pub mod resolver;
pub mod signing;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use accounts::{AccountDirectory, MemoryAccounts};
pub use builder::TransactionBuilder;
pub use request::{BuildRequest, DestinationRequest, SourceRequest};
pub use reservation::{ReservationTable, Reservations};
pub use resolver::{resolve_destination, resolve_source};
pub use signing::{KeyringSigner, Signer, sign_template};
