//! The orderbook offer contract.
//!
//! An offer is an output of the offered asset locked by a script that
//! carries the seller's identity and price ladder:
//!
//! ```text
//!   0x02 || version (1) || flags (1) || seller account (16) || seller key (32)
//!        || n (u16 BE) || n × ( payment asset (32) || offer (u64 BE) || payment (u64 BE) )
//! ```
//!
//! The output can be spent two ways: a *redeem*, which buys an exact
//! multiple of one tier and pays the seller, re-locking any unsold rest
//! under the identical script; or a *cancel*, signed by the seller key,
//! which frees the whole amount.
//!
//! Tier selection is fixed policy: the first tier, in declared order, whose
//! `offer_amount` divides the requested amount wins.

use offerledger_types::{
    AccountId, AssetAmount, AssetId, Destination, OfferLedgerError, OpenOrder, OrderInfo, Outpoint,
    PriceTier, PublicKey, Result, Script, TxOutput, constants,
};

/// Flag bit: the seller may later top up the offered amount.
const FLAG_ALLOW_ADDITIONAL: u8 = 0b0000_0001;

const TIER_LEN: usize = 32 + 8 + 8;

// ---------------------------------------------------------------------------
// Script encoding
// ---------------------------------------------------------------------------

/// Everything an orderbook script commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerms {
    pub order_info: OrderInfo,
    pub allow_additional: bool,
}

impl OrderTerms {
    /// The script that receives payments for this offer.
    #[must_use]
    pub fn seller_script(&self) -> Script {
        Script::pay_to_key(&self.order_info.seller_key)
    }
}

/// Check a ladder's shape: non-empty, bounded, positive ratios.
fn validate_prices(prices: &[PriceTier]) -> Result<()> {
    if prices.is_empty() {
        return Err(OfferLedgerError::validation("orderbook: price ladder is empty"));
    }
    if prices.len() > constants::MAX_PRICE_TIERS {
        return Err(OfferLedgerError::validation(format!(
            "orderbook: {} price tiers exceeds limit {}",
            prices.len(),
            constants::MAX_PRICE_TIERS
        )));
    }
    if let Some((i, _)) = prices.iter().enumerate().find(|(_, p)| !p.is_positive()) {
        return Err(OfferLedgerError::validation(format!(
            "orderbook: price tier {i} has a non-positive ratio"
        )));
    }
    Ok(())
}

/// Encode an offer's terms into an orderbook script.
pub fn encode_script(order_info: &OrderInfo, allow_additional: bool) -> Result<Script> {
    validate_prices(&order_info.prices)?;
    let n = u16::try_from(order_info.prices.len())
        .map_err(|_| OfferLedgerError::validation("orderbook: too many price tiers"))?;

    let mut bytes = Vec::with_capacity(53 + order_info.prices.len() * TIER_LEN);
    bytes.push(constants::SCRIPT_TAG_ORDERBOOK);
    bytes.push(constants::ORDERBOOK_CONTRACT_VERSION);
    bytes.push(if allow_additional { FLAG_ALLOW_ADDITIONAL } else { 0 });
    bytes.extend_from_slice(order_info.seller_account_id.as_bytes());
    bytes.extend_from_slice(order_info.seller_key.as_bytes());
    bytes.extend_from_slice(&n.to_be_bytes());
    for tier in &order_info.prices {
        bytes.extend_from_slice(tier.payment_asset_id.as_bytes());
        bytes.extend_from_slice(&tier.offer_amount.to_be_bytes());
        bytes.extend_from_slice(&tier.payment_amount.to_be_bytes());
    }
    Ok(Script(bytes))
}

/// Cursor over script bytes; every read is bounds-checked.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.bytes.len() < n {
            return Err(OfferLedgerError::validation(format!(
                "orderbook script truncated reading {what}"
            )));
        }
        let (head, rest) = self.bytes.split_at(n);
        self.bytes = rest;
        Ok(head)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u16_be(&mut self, what: &str) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array::<2>(what)?))
    }

    fn u64_be(&mut self, what: &str) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array::<8>(what)?))
    }
}

/// Decode an orderbook script. Anything malformed is a `ValidationError`.
pub fn decode_script(script: &Script) -> Result<OrderTerms> {
    let mut r = Reader {
        bytes: script.as_bytes(),
    };
    if r.u8("tag")? != constants::SCRIPT_TAG_ORDERBOOK {
        return Err(OfferLedgerError::validation("not an orderbook script"));
    }
    let version = r.u8("version")?;
    if version != constants::ORDERBOOK_CONTRACT_VERSION {
        return Err(OfferLedgerError::validation(format!(
            "unsupported orderbook contract version {version}"
        )));
    }
    let flags = r.u8("flags")?;
    if flags & !FLAG_ALLOW_ADDITIONAL != 0 {
        return Err(OfferLedgerError::validation(format!(
            "unknown orderbook flags {flags:#04x}"
        )));
    }
    let seller_account_id = AccountId::from_bytes(r.array::<16>("seller account")?);
    let seller_key = PublicKey(r.array::<32>("seller key")?);
    let n = r.u16_be("tier count")?;

    let mut prices = Vec::with_capacity(usize::from(n));
    for _ in 0..n {
        let payment_asset_id = AssetId(r.array::<32>("tier asset")?);
        let offer_amount = r.u64_be("tier offer amount")?;
        let payment_amount = r.u64_be("tier payment amount")?;
        prices.push(PriceTier::new(payment_asset_id, offer_amount, payment_amount));
    }
    if !r.bytes.is_empty() {
        return Err(OfferLedgerError::validation(format!(
            "orderbook script has {} trailing bytes",
            r.bytes.len()
        )));
    }
    validate_prices(&prices)?;

    Ok(OrderTerms {
        order_info: OrderInfo {
            seller_account_id,
            seller_key,
            prices,
        },
        allow_additional: flags & FLAG_ALLOW_ADDITIONAL != 0,
    })
}

/// View an output as an open order.
///
/// Returns `None` for outputs that are not well-formed orderbook outputs
/// or that hold nothing; such outputs are never indexed.
pub fn open_order_from_output(outpoint: Outpoint, output: &TxOutput) -> Option<OpenOrder> {
    if !output.script.is_orderbook() || output.amount == 0 {
        return None;
    }
    match decode_script(&output.script) {
        Ok(terms) => Some(OpenOrder {
            outpoint,
            seller_account_id: terms.order_info.seller_account_id,
            seller_key: terms.order_info.seller_key,
            offered_asset_id: output.asset_id,
            remaining_offer_amount: output.amount,
            prices: terms.order_info.prices,
            allow_additional: terms.allow_additional,
        }),
        Err(e) => {
            tracing::debug!(%outpoint, error = %e, "Skipping malformed orderbook output");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Offer lifecycle
// ---------------------------------------------------------------------------

/// Validate an offer and produce the destination that posts it.
pub fn new_destination(
    asset_amount: AssetAmount,
    order_info: OrderInfo,
    allow_additional: bool,
    metadata: Vec<u8>,
) -> Result<Destination> {
    if asset_amount.amount == 0 {
        return Err(OfferLedgerError::validation(
            "orderbook: offered amount must be positive",
        ));
    }
    validate_prices(&order_info.prices)?;
    if order_info.accepts_payment_in(&asset_amount.asset_id) {
        return Err(OfferLedgerError::validation(format!(
            "orderbook: asset {} cannot be priced in itself",
            asset_amount.asset_id.short()
        )));
    }
    Ok(Destination::Orderbook {
        asset_amount,
        order_info,
        allow_additional,
        metadata,
    })
}

/// The script that routes payment back to the order's seller.
#[must_use]
pub fn seller_script(order: &OpenOrder) -> Script {
    order.seller_script()
}

/// Result of pricing a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemQuote {
    /// Position of the matched tier in the ladder.
    pub tier_index: usize,
    pub tier: PriceTier,
    /// Units of the offered asset bought.
    pub offer_amount: u64,
    /// Units of `tier.payment_asset_id` owed to the seller.
    pub payment_due: u64,
    /// Offered units left on the order afterwards.
    pub remainder: u64,
}

impl RedeemQuote {
    /// The payment leg as an asset amount.
    #[must_use]
    pub fn payment(&self) -> AssetAmount {
        AssetAmount::new(self.tier.payment_asset_id, self.payment_due)
    }
}

/// Price a redemption of `desired` units against an open order.
///
/// # Errors
/// - `ValidationError` if `desired` is zero or the payment overflows `u64`
/// - `InsufficientFunds` if `desired` exceeds the remaining offer
/// - `AmountMismatch` if no tier divides `desired` exactly
pub fn redeem(order: &OpenOrder, desired: u64) -> Result<RedeemQuote> {
    if desired == 0 {
        return Err(OfferLedgerError::validation(
            "orderbook: redemption amount must be positive",
        ));
    }
    if desired > order.remaining_offer_amount {
        return Err(OfferLedgerError::InsufficientFunds {
            asset: order.offered_asset_id,
            needed: desired,
            available: order.remaining_offer_amount,
        });
    }
    let (tier_index, tier) = order
        .prices
        .iter()
        .enumerate()
        .find(|(_, tier)| tier.divides(desired))
        .ok_or_else(|| OfferLedgerError::AmountMismatch {
            reason: format!(
                "{desired} is not an exact multiple of any tier of order {}",
                order.outpoint
            ),
        })?;
    let payment_due = payment_for(tier, desired)?;
    Ok(RedeemQuote {
        tier_index,
        tier: *tier,
        offer_amount: desired,
        payment_due,
        remainder: order.remaining_offer_amount - desired,
    })
}

/// `amount / offer_amount * payment_amount`, integer-only and overflow-checked.
/// `amount` must be an exact multiple of the tier.
pub fn payment_for(tier: &PriceTier, amount: u64) -> Result<u64> {
    if !tier.divides(amount) {
        return Err(OfferLedgerError::AmountMismatch {
            reason: format!("{amount} is not a multiple of {}", tier.offer_amount),
        });
    }
    (amount / tier.offer_amount)
        .checked_mul(tier.payment_amount)
        .ok_or_else(|| OfferLedgerError::validation("orderbook: payment amount overflows"))
}

/// The output that carries an order's unsold rest: same asset, same
/// contract, `remainder` units. `None` when nothing is left.
#[must_use]
pub fn remainder_output(order_output: &TxOutput, remainder: u64) -> Option<TxOutput> {
    (remainder > 0).then(|| TxOutput {
        asset_id: order_output.asset_id,
        amount: remainder,
        script: order_output.script.clone(),
        metadata: order_output.metadata.clone(),
    })
}

/// What cancelling an order frees, and who must sign for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelPlan {
    pub refund: AssetAmount,
    pub seller_account_id: AccountId,
    pub seller_key: PublicKey,
}

/// Plan the withdrawal of an entire order. The seller signature is enforced
/// by the script at finalize, not here.
#[must_use]
pub fn cancel(order: &OpenOrder) -> CancelPlan {
    CancelPlan {
        refund: order.offered(),
        seller_account_id: order.seller_account_id,
        seller_key: order.seller_key,
    }
}
