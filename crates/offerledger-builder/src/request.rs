//! Build request descriptors, as submitted by clients.
//!
//! A descriptor is a flat record with a `type` tag; which fields are
//! required depends on the tag (see [`crate::resolver`]). Field names follow
//! the public request format:
//!
//! ```json
//! {
//!   "sources": [{ "type": "account", "assetID": "…", "amount": 2200, "accountID": "…" }],
//!   "destinations": [{ "type": "address", "assetID": "…", "amount": 2200, "address": "01…" }]
//! }
//! ```

use offerledger_types::script::hex_bytes;
use offerledger_types::{AccountId, AssetId, OfferLedgerError, PriceTier, PublicKey, Result, Script, TxHash};
use serde::{Deserialize, Serialize};

/// One requested source of value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "assetID", default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<AssetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(rename = "accountID", default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(rename = "paymentAssetID", default, skip_serializing_if = "Option::is_none")]
    pub payment_asset_id: Option<AssetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_key: Option<PublicKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SourceRequest {
    #[must_use]
    pub fn account(asset_id: AssetId, amount: u64, account_id: AccountId) -> Self {
        Self {
            kind: "account".into(),
            asset_id: Some(asset_id),
            amount: Some(amount),
            account_id: Some(account_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn orderbook_redeem(
        tx_hash: TxHash,
        index: u32,
        amount: u64,
        payment_asset_id: AssetId,
        payment_amount: u64,
    ) -> Self {
        Self {
            kind: "orderbook-redeem".into(),
            amount: Some(amount),
            tx_hash: Some(tx_hash),
            index: Some(index),
            payment_asset_id: Some(payment_asset_id),
            payment_amount: Some(payment_amount),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn orderbook_cancel(tx_hash: TxHash, index: u32) -> Self {
        Self {
            kind: "orderbook-cancel".into(),
            tx_hash: Some(tx_hash),
            index: Some(index),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn issue(issuer_key: PublicKey, label: impl Into<String>, amount: u64) -> Self {
        Self {
            kind: "issue".into(),
            amount: Some(amount),
            issuer_key: Some(issuer_key),
            label: Some(label.into()),
            ..Self::default()
        }
    }
}

/// One requested destination of value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "assetID", default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<AssetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(rename = "accountID", default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    /// Raw destination script (hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Script>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderbook_prices: Option<Vec<PriceTier>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_key: Option<PublicKey>,
    #[serde(default)]
    pub allow_additional: bool,
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<u8>,
}

impl DestinationRequest {
    #[must_use]
    pub fn account(asset_id: AssetId, amount: u64, account_id: AccountId) -> Self {
        Self {
            kind: "account".into(),
            asset_id: Some(asset_id),
            amount: Some(amount),
            account_id: Some(account_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn address(asset_id: AssetId, amount: u64, address: Script) -> Self {
        Self {
            kind: "address".into(),
            asset_id: Some(asset_id),
            amount: Some(amount),
            address: Some(address),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn orderbook(
        asset_id: AssetId,
        amount: u64,
        account_id: AccountId,
        seller_key: PublicKey,
        prices: Vec<PriceTier>,
    ) -> Self {
        Self {
            kind: "orderbook".into(),
            asset_id: Some(asset_id),
            amount: Some(amount),
            account_id: Some(account_id),
            orderbook_prices: Some(prices),
            seller_key: Some(seller_key),
            ..Self::default()
        }
    }
}

/// A complete build request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub sources: Vec<SourceRequest>,
    #[serde(alias = "dests")]
    pub destinations: Vec<DestinationRequest>,
    /// Reservation ttl; the builder default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

impl BuildRequest {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| OfferLedgerError::validation(format!("malformed build request: {e}")))
    }
}
