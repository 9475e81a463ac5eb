//! Descriptor resolution: typed request records into [`Source`] and
//! [`Destination`] values.
//!
//! Pure functions; nothing here touches the ledger. Each tag names the
//! fields it needs:
//!
//! | role | tag | required |
//! |---|---|---|
//! | source | `account` | assetID, amount, accountID |
//! | source | `orderbook-redeem` | txHash, index, amount, paymentAssetID, paymentAmount |
//! | source | `orderbook-cancel` | txHash, index |
//! | source | `issue` | issuerKey, label, amount |
//! | destination | `account` | assetID, amount, accountID |
//! | destination | `address` | assetID, amount, address |
//! | destination | `orderbook` | assetID, amount, accountID, sellerKey, orderbookPrices |

use offerledger_contracts::orderbook;
use offerledger_types::{
    AssetAmount, AssetDefinition, Destination, OfferLedgerError, OrderInfo, Outpoint, Result, Source,
};

use crate::request::{DestinationRequest, SourceRequest};

fn required<T>(value: Option<T>, role: &str, tag: &str, field: &str) -> Result<T> {
    value.ok_or_else(|| OfferLedgerError::validation(format!("{tag} {role}: missing {field}")))
}

fn required_positive(value: Option<u64>, role: &str, tag: &str, field: &str) -> Result<u64> {
    let amount = required(value, role, tag, field)?;
    if amount == 0 {
        return Err(OfferLedgerError::validation(format!(
            "{tag} {role}: {field} must be positive"
        )));
    }
    Ok(amount)
}

/// Resolve one source descriptor.
pub fn resolve_source(req: &SourceRequest) -> Result<Source> {
    let tag = req.kind.as_str();
    match tag {
        "account" => {
            let asset_id = required(req.asset_id, "source", tag, "assetID")?;
            let amount = required_positive(req.amount, "source", tag, "amount")?;
            let account_id = required(req.account_id, "source", tag, "accountID")?;
            Ok(Source::Account {
                asset_amount: AssetAmount::new(asset_id, amount),
                account_id,
            })
        }
        "orderbook-redeem" => {
            let tx_hash = required(req.tx_hash, "source", tag, "txHash")?;
            let index = required(req.index, "source", tag, "index")?;
            let offer_amount = required_positive(req.amount, "source", tag, "amount")?;
            let payment_asset_id = required(req.payment_asset_id, "source", tag, "paymentAssetID")?;
            let payment_amount = required_positive(req.payment_amount, "source", tag, "paymentAmount")?;
            Ok(Source::OrderbookRedeem {
                outpoint: Outpoint::new(tx_hash, index),
                offer_amount,
                payment: AssetAmount::new(payment_asset_id, payment_amount),
            })
        }
        "orderbook-cancel" => {
            let tx_hash = required(req.tx_hash, "source", tag, "txHash")?;
            let index = required(req.index, "source", tag, "index")?;
            Ok(Source::OrderbookCancel {
                outpoint: Outpoint::new(tx_hash, index),
            })
        }
        "issue" => {
            let issuer_key = required(req.issuer_key, "source", tag, "issuerKey")?;
            let label = required(req.label.clone(), "source", tag, "label")?;
            let amount = required_positive(req.amount, "source", tag, "amount")?;
            Ok(Source::Issuance {
                definition: AssetDefinition::new(issuer_key, label),
                amount,
            })
        }
        other => Err(OfferLedgerError::UnknownType {
            role: "source",
            tag: other.to_string(),
        }),
    }
}

/// Resolve one destination descriptor.
pub fn resolve_destination(req: &DestinationRequest) -> Result<Destination> {
    let tag = req.kind.as_str();
    match tag {
        "account" => {
            let asset_id = required(req.asset_id, "destination", tag, "assetID")?;
            let amount = required_positive(req.amount, "destination", tag, "amount")?;
            let account_id = required(req.account_id, "destination", tag, "accountID")?;
            Ok(Destination::Account {
                asset_amount: AssetAmount::new(asset_id, amount),
                account_id,
                metadata: req.metadata.clone(),
            })
        }
        "address" => {
            let asset_id = required(req.asset_id, "destination", tag, "assetID")?;
            let amount = required_positive(req.amount, "destination", tag, "amount")?;
            let script = required(req.address.clone(), "destination", tag, "address")?;
            if script.is_empty() {
                return Err(OfferLedgerError::validation("address destination: empty address"));
            }
            Ok(Destination::Address {
                asset_amount: AssetAmount::new(asset_id, amount),
                script,
                metadata: req.metadata.clone(),
            })
        }
        "orderbook" => {
            let asset_id = required(req.asset_id, "destination", tag, "assetID")?;
            let amount = required_positive(req.amount, "destination", tag, "amount")?;
            let seller_account_id = required(req.account_id, "destination", tag, "accountID")?;
            let seller_key = required(req.seller_key, "destination", tag, "sellerKey")?;
            let prices = required(req.orderbook_prices.clone(), "destination", tag, "orderbookPrices")?;
            orderbook::new_destination(
                AssetAmount::new(asset_id, amount),
                OrderInfo {
                    seller_account_id,
                    seller_key,
                    prices,
                },
                req.allow_additional,
                req.metadata.clone(),
            )
        }
        other => Err(OfferLedgerError::UnknownType {
            role: "destination",
            tag: other.to_string(),
        }),
    }
}
