//! Value types: asset amounts and price tiers.
//!
//! Amounts are non-negative integers in the asset's smallest unit. All
//! arithmetic on them is integer-only; there is no rounding anywhere.

use serde::{Deserialize, Serialize};

use crate::AssetId;

/// A quantity of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmount {
    pub asset_id: AssetId,
    pub amount: u64,
}

impl AssetAmount {
    #[must_use]
    pub fn new(asset_id: AssetId, amount: u64) -> Self {
        Self { asset_id, amount }
    }
}

impl std::fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {}", self.amount, self.asset_id.short())
    }
}

/// One rung of a price ladder: `offer_amount` units of the offered asset
/// are sold for `payment_amount` units of `payment_asset_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    #[serde(rename = "assetID", alias = "paymentAssetID")]
    pub payment_asset_id: AssetId,
    pub offer_amount: u64,
    pub payment_amount: u64,
}

impl PriceTier {
    #[must_use]
    pub fn new(payment_asset_id: AssetId, offer_amount: u64, payment_amount: u64) -> Self {
        Self {
            payment_asset_id,
            offer_amount,
            payment_amount,
        }
    }

    /// Both sides of the ratio are positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.offer_amount > 0 && self.payment_amount > 0
    }

    /// Whether `amount` is an exact multiple of this tier's offer amount.
    #[must_use]
    pub fn divides(&self, amount: u64) -> bool {
        self.offer_amount != 0 && amount % self.offer_amount == 0
    }
}
