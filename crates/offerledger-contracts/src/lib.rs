//! # offerledger-contracts
//!
//! The fixed contract types an OfferLedger output can be locked by, and the
//! checks a transaction must pass before the ledger accepts it.
//!
//! - [`control`]: pay-to-key account control programs and issuance authorisation
//! - [`orderbook`]: the standing-offer contract (encode, decode, redeem, cancel)
//! - [`verify`]: whole-transaction script verification and balance checks
//!
//! Everything here is pure: no ledger access, no clocks, no I/O.

pub mod control;
pub mod orderbook;
pub mod verify;

pub use orderbook::{CancelPlan, OrderTerms, RedeemQuote};
pub use verify::{AssetFlows, check_balance, verify_tx};
