//! Configuration for the ledger and the transaction builder.
//!
//! Both sections default to the values in [`crate::constants`] and can be
//! loaded from one JSON document:
//!
//! ```json
//! { "ledger": { "maxPendingTxs": 500 }, "builder": { "reservationTtlSecs": 60 } }
//! ```

use serde::{Deserialize, Serialize};

use crate::{OfferLedgerError, Result, constants};

/// Ledger gateway limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerConfig {
    /// Finalized transactions held before `make_block` must be called.
    pub max_pending_txs: usize,
    /// Maximum inputs per transaction.
    pub max_tx_inputs: usize,
    /// Maximum outputs per transaction.
    pub max_tx_outputs: usize,
    /// Run the supply audit before every block commit.
    pub audit_supply: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_pending_txs: constants::MAX_PENDING_TXS,
            max_tx_inputs: constants::MAX_TX_INPUTS,
            max_tx_outputs: constants::MAX_TX_OUTPUTS,
            audit_supply: true,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_pending_txs == 0 {
            return Err(OfferLedgerError::Configuration(
                "maxPendingTxs must be positive".into(),
            ));
        }
        if self.max_tx_inputs == 0 || self.max_tx_outputs == 0 {
            return Err(OfferLedgerError::Configuration(
                "maxTxInputs and maxTxOutputs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Transaction builder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuilderConfig {
    /// Reservation ttl used when a request does not name one.
    pub reservation_ttl_secs: u64,
    /// Maximum tiers in an orderbook price ladder.
    pub max_price_tiers: usize,
    /// Maximum metadata bytes on one output.
    pub max_output_metadata_bytes: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            reservation_ttl_secs: constants::DEFAULT_RESERVATION_TTL_SECS,
            max_price_tiers: constants::MAX_PRICE_TIERS,
            max_output_metadata_bytes: constants::MAX_OUTPUT_METADATA_BYTES,
        }
    }
}

impl BuilderConfig {
    /// The default reservation ttl.
    #[must_use]
    pub fn reservation_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reservation_ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reservation_ttl_secs == 0 {
            return Err(OfferLedgerError::Configuration(
                "reservationTtlSecs must be positive".into(),
            ));
        }
        if self.max_price_tiers == 0 || self.max_price_tiers > usize::from(u16::MAX) {
            return Err(OfferLedgerError::Configuration(format!(
                "maxPriceTiers must be in 1..={}",
                u16::MAX
            )));
        }
        Ok(())
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferLedgerConfig {
    pub ledger: LedgerConfig,
    pub builder: BuilderConfig,
}

impl OfferLedgerConfig {
    /// Parse and validate a JSON configuration document. Missing fields
    /// take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| OfferLedgerError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.ledger.validate()?;
        self.builder.validate()
    }
}
