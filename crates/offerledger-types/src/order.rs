//! Standing offer (orderbook) types.
//!
//! An [`OpenOrder`] is the decoded view of one unspent orderbook output.
//! It lives only as long as that output is unspent in committed state.

use serde::{Deserialize, Serialize};

use crate::{AccountId, AssetAmount, AssetId, OfferLedgerError, Outpoint, PriceTier, PublicKey, Result, Script};

/// Who is selling and at what prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    #[serde(rename = "sellerAccountID")]
    pub seller_account_id: AccountId,
    /// Control key of the seller account; receives payments and authorises cancel.
    pub seller_key: PublicKey,
    /// Ladder of accepted exchange ratios, tried in declared order.
    pub prices: Vec<PriceTier>,
}

impl OrderInfo {
    /// Whether any tier accepts payment in `asset`.
    #[must_use]
    pub fn accepts_payment_in(&self, asset: &AssetId) -> bool {
        self.prices.iter().any(|p| p.payment_asset_id == *asset)
    }
}

/// Status filter for order queries. Only open orders are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
}

impl OrderStatus {
    /// Parse a query-string status.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(Self::Open),
            other => Err(OfferLedgerError::validation(format!(
                "unsupported order status {other:?}; only \"open\" is supported"
            ))),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
        }
    }
}

/// An offer currently standing on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    /// The unspent output backing this order.
    pub outpoint: Outpoint,
    #[serde(rename = "sellerAccountID")]
    pub seller_account_id: AccountId,
    pub seller_key: PublicKey,
    #[serde(rename = "offeredAssetID")]
    pub offered_asset_id: AssetId,
    pub remaining_offer_amount: u64,
    pub prices: Vec<PriceTier>,
    /// Seller allowed later top-ups of the offered amount.
    pub allow_additional: bool,
}

impl OpenOrder {
    /// The asset and quantity still for sale.
    #[must_use]
    pub fn offered(&self) -> AssetAmount {
        AssetAmount::new(self.offered_asset_id, self.remaining_offer_amount)
    }

    /// Whether any tier accepts payment in `asset`.
    #[must_use]
    pub fn accepts_payment_in(&self, asset: &AssetId) -> bool {
        self.prices.iter().any(|p| p.payment_asset_id == *asset)
    }

    /// The script that pays this order's seller.
    #[must_use]
    pub fn seller_script(&self) -> Script {
        Script::pay_to_key(&self.seller_key)
    }

    #[must_use]
    pub fn order_info(&self) -> OrderInfo {
        OrderInfo {
            seller_account_id: self.seller_account_id,
            seller_key: self.seller_key,
            prices: self.prices.clone(),
        }
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl OpenOrder {
    /// An order with random ids selling `amount` of `offered` at `prices`.
    pub fn dummy(offered: AssetId, amount: u64, prices: Vec<PriceTier>) -> Self {
        Self {
            outpoint: Outpoint::new(crate::TxHash::random(), 0),
            seller_account_id: AccountId::new(),
            seller_key: PublicKey::random(),
            offered_asset_id: offered,
            remaining_offer_amount: amount,
            prices,
            allow_additional: false,
        }
    }
}
