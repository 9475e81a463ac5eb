//! Resolved sources and destinations of a transaction build.
//!
//! These are closed sum types: the builder matches them exhaustively, so a
//! new variant cannot be silently ignored. They are created per build
//! request and discarded once the template exists.

use serde::{Deserialize, Serialize};

use crate::{AccountId, AssetAmount, AssetDefinition, OrderInfo, Outpoint, Script};

/// Where value for a transaction comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "camelCase", tag = "type")]
pub enum Source {
    /// Funds held by an account's control key.
    Account {
        asset_amount: AssetAmount,
        account_id: AccountId,
    },
    /// Buy `offer_amount` from the order at `outpoint`, paying `payment`.
    OrderbookRedeem {
        outpoint: Outpoint,
        offer_amount: u64,
        payment: AssetAmount,
    },
    /// Withdraw the whole order at `outpoint` back to its seller.
    OrderbookCancel { outpoint: Outpoint },
    /// Create new units of an asset. The only source allowed to create value.
    Issuance {
        definition: AssetDefinition,
        amount: u64,
    },
}

impl Source {
    /// Type tag, as used in build requests.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Account { .. } => "account",
            Self::OrderbookRedeem { .. } => "orderbook-redeem",
            Self::OrderbookCancel { .. } => "orderbook-cancel",
            Self::Issuance { .. } => "issue",
        }
    }
}

/// Where value in a transaction goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "camelCase", tag = "type")]
pub enum Destination {
    /// Pay into an account's control program.
    Account {
        asset_amount: AssetAmount,
        account_id: AccountId,
        metadata: Vec<u8>,
    },
    /// Pay to a raw script.
    Address {
        asset_amount: AssetAmount,
        script: Script,
        metadata: Vec<u8>,
    },
    /// Lock into a standing offer.
    Orderbook {
        asset_amount: AssetAmount,
        order_info: OrderInfo,
        allow_additional: bool,
        metadata: Vec<u8>,
    },
}

impl Destination {
    #[must_use]
    pub fn asset_amount(&self) -> AssetAmount {
        match self {
            Self::Account { asset_amount, .. }
            | Self::Address { asset_amount, .. }
            | Self::Orderbook { asset_amount, .. } => *asset_amount,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &[u8] {
        match self {
            Self::Account { metadata, .. }
            | Self::Address { metadata, .. }
            | Self::Orderbook { metadata, .. } => metadata,
        }
    }

    /// Type tag, as used in build requests.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Account { .. } => "account",
            Self::Address { .. } => "address",
            Self::Orderbook { .. } => "orderbook",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetId, PublicKey, TxHash};

    #[test]
    fn source_tags() {
        let cancel = Source::OrderbookCancel {
            outpoint: Outpoint::new(TxHash([0u8; 32]), 1),
        };
        assert_eq!(cancel.type_tag(), "orderbook-cancel");
        let json = serde_json::to_string(&cancel).unwrap();
        assert!(json.contains("\"type\":\"orderbook-cancel\""), "Got: {json}");
    }

    #[test]
    fn destination_accessors() {
        let amount = AssetAmount::new(AssetId([1u8; 32]), 20);
        let dest = Destination::Address {
            asset_amount: amount,
            script: Script::pay_to_key(&PublicKey([2u8; 32])),
            metadata: b"memo".to_vec(),
        };
        assert_eq!(dest.asset_amount(), amount);
        assert_eq!(dest.metadata(), b"memo");
        assert_eq!(dest.type_tag(), "address");
    }
}
