//! Supply audit.
//!
//! Invariant checked before every block is written:
//! ```text
//! ∀ asset: Σ(unspent outputs of asset) == Σ(issued units of asset)
//! ```
//!
//! Only issuance inputs may create units and nothing destroys them, so a
//! mismatch means a transaction slipped past the balance check. The block
//! is refused.

use std::collections::HashMap;

use offerledger_types::{AssetId, OfferLedgerError, Result};

/// Per-asset issued totals since genesis.
#[derive(Debug, Clone, Default)]
pub struct SupplyAudit {
    issued: HashMap<AssetId, u64>,
}

impl SupplyAudit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from totals recorded by the store.
    pub fn from_issued(issued: impl IntoIterator<Item = (AssetId, u64)>) -> Self {
        Self {
            issued: issued.into_iter().collect(),
        }
    }

    /// Record an issuance of `amount` units of `asset`.
    pub fn record_issuance(&mut self, asset: AssetId, amount: u64) -> Result<()> {
        let total = self.issued.entry(asset).or_insert(0);
        *total = total.checked_add(amount).ok_or_else(|| {
            OfferLedgerError::SupplyInvariantViolation {
                reason: format!("issued supply of asset {asset} overflows"),
            }
        })?;
        Ok(())
    }

    /// Total units of `asset` ever issued.
    #[must_use]
    pub fn expected_supply(&self, asset: &AssetId) -> u64 {
        self.issued.get(asset).copied().unwrap_or(0)
    }

    /// Verify that the unspent total of `asset` matches what was issued.
    ///
    /// # Errors
    /// Returns [`OfferLedgerError::SupplyInvariantViolation`] if they differ.
    pub fn verify(&self, asset: &AssetId, actual_supply: u64) -> Result<()> {
        let expected = self.expected_supply(asset);
        if actual_supply != expected {
            return Err(OfferLedgerError::SupplyInvariantViolation {
                reason: format!(
                    "asset {asset}: unspent supply {actual_supply} != issued {expected}"
                ),
            });
        }
        Ok(())
    }

    /// Number of assets with recorded issuance.
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.issued.len()
    }
}
