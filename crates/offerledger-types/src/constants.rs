//! System-wide constants for OfferLedger.

/// Default reservation ttl for outputs selected by an in-flight build (1 hour).
pub const DEFAULT_RESERVATION_TTL_SECS: u64 = 3600;

/// Maximum number of tiers in one price ladder.
pub const MAX_PRICE_TIERS: usize = 16;

/// Maximum inputs accepted in a single transaction.
pub const MAX_TX_INPUTS: usize = 1024;

/// Maximum outputs accepted in a single transaction.
pub const MAX_TX_OUTPUTS: usize = 1024;

/// Maximum finalized-but-unblocked transactions held by the ledger.
pub const MAX_PENDING_TXS: usize = 10_000;

/// Maximum metadata bytes attached to one output.
pub const MAX_OUTPUT_METADATA_BYTES: usize = 1024;

/// Script tag: pay-to-key (account control program).
pub const SCRIPT_TAG_PAY_TO_KEY: u8 = 0x01;

/// Script tag: orderbook offer contract.
pub const SCRIPT_TAG_ORDERBOOK: u8 = 0x02;

/// Current orderbook contract encoding version.
pub const ORDERBOOK_CONTRACT_VERSION: u8 = 1;

/// Domain separator for asset id derivation.
pub const ASSET_ID_DOMAIN: &[u8] = b"offerledger:asset:v1:";

/// Domain separator for transaction hashes.
pub const TX_HASH_DOMAIN: &[u8] = b"offerledger:tx:v1:";

/// Domain separator for signature hashes.
pub const SIGHASH_DOMAIN: &[u8] = b"offerledger:sighash:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "OfferLedger";
