//! Orderbook lifecycle across builder, contract, and ledger.
//!
//! Every scenario posts a real order through the builder, commits it in a
//! block, and then redeems or cancels it the way a client would.

use offerledger_builder::testing::{TestNet, account_destination};
use offerledger_ledger::Ledger;
use offerledger_types::{
    AccountId, AssetAmount, AssetDefinition, ContractClause, Destination, ErrorKind, OrderStatus, Outpoint,
    PriceTier, PublicKey, Script, Source,
};

/// A seller holding 100 AAPL and a buyer holding 5000 USD.
struct Market {
    net: TestNet,
    seller: AccountId,
    seller_key: PublicKey,
    buyer: AccountId,
    aapl: AssetDefinition,
    usd: AssetDefinition,
}

impl Market {
    fn new() -> Self {
        let net = TestNet::new();
        let (seller, seller_key) = net.new_account();
        let (buyer, _) = net.new_account();
        let aapl = net.new_asset("AAPL");
        let usd = net.new_asset("USD");
        net.fund(seller, &aapl, 100);
        net.fund(buyer, &usd, 5000);
        Self {
            net,
            seller,
            seller_key,
            buyer,
            aapl,
            usd,
        }
    }

    /// 100 AAPL at 1 AAPL : 110 USD.
    fn post_default_order(&self) -> Outpoint {
        self.net.post_order(
            self.seller,
            self.aapl.asset_id(),
            100,
            vec![PriceTier::new(self.usd.asset_id(), 1, 110)],
        )
    }

    fn redeem_sources(&self, order: Outpoint, amount: u64, payment: u64) -> Vec<Source> {
        vec![
            Source::OrderbookRedeem {
                outpoint: order,
                offer_amount: amount,
                payment: AssetAmount::new(self.usd.asset_id(), payment),
            },
            Source::Account {
                asset_amount: AssetAmount::new(self.usd.asset_id(), payment),
                account_id: self.buyer,
            },
        ]
    }

    fn redeem_destinations(&self, amount: u64, payment: u64) -> Vec<Destination> {
        vec![
            Destination::Address {
                asset_amount: AssetAmount::new(self.usd.asset_id(), payment),
                script: Script::pay_to_key(&self.seller_key),
                metadata: Vec::new(),
            },
            account_destination(self.aapl.asset_id(), amount, self.buyer),
        ]
    }
}

// ---------------------------------------------------------------------------
// Posting
// ---------------------------------------------------------------------------

#[test]
fn posted_order_is_found_once_committed() {
    let m = Market::new();
    let order = m.post_default_order();

    let found = m
        .net
        .ledger
        .order_index()
        .find_orders(m.aapl.asset_id(), &[m.usd.asset_id()], OrderStatus::Open)
        .to_vec();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].outpoint, order);
    assert_eq!(found[0].remaining_offer_amount, 100);
    assert_eq!(found[0].seller_account_id, m.seller);
    assert_eq!(m.net.balance(m.seller, m.aapl.asset_id()), 0);
}

#[test]
fn pending_order_is_invisible_until_block() {
    let m = Market::new();
    let order_info = offerledger_types::OrderInfo {
        seller_account_id: m.seller,
        seller_key: m.seller_key,
        prices: vec![PriceTier::new(m.usd.asset_id(), 1, 110)],
    };
    let committed = m
        .net
        .submit(
            vec![Source::Account {
                asset_amount: AssetAmount::new(m.aapl.asset_id(), 100),
                account_id: m.seller,
            }],
            vec![Destination::Orderbook {
                asset_amount: AssetAmount::new(m.aapl.asset_id(), 100),
                order_info,
                allow_additional: false,
                metadata: Vec::new(),
            }],
        )
        .unwrap();
    let outpoint = Outpoint::new(committed.hash, 0);
    let index = m.net.ledger.order_index();
    assert!(index.find_open_order_by_outpoint(&outpoint).is_none());

    m.net.make_block();
    assert!(index.find_open_order_by_outpoint(&outpoint).is_some());
}

// ---------------------------------------------------------------------------
// Redeem
// ---------------------------------------------------------------------------

#[test]
fn partial_redeem_pays_seller_and_keeps_remainder_open() {
    let m = Market::new();
    let order = m.post_default_order();

    let committed = m
        .net
        .submit(m.redeem_sources(order, 20, 2200), m.redeem_destinations(20, 2200))
        .unwrap();

    // destinations, remainder, change
    let outputs = committed.outputs();
    assert_eq!(outputs.len(), 4);
    assert_eq!(outputs[0].script, Script::pay_to_key(&m.seller_key));
    assert_eq!(outputs[0].asset_amount(), AssetAmount::new(m.usd.asset_id(), 2200));
    assert_eq!(outputs[2].asset_amount(), AssetAmount::new(m.aapl.asset_id(), 80));
    assert!(outputs[2].script.is_orderbook());
    assert_eq!(outputs[3].asset_amount(), AssetAmount::new(m.usd.asset_id(), 2800));
    assert_eq!(
        committed.tx.inputs[0].witness.clause,
        Some(ContractClause::Redeem {
            tier_index: 0,
            payment_output: 0,
            remainder_output: Some(2),
        })
    );

    m.net.make_block();
    assert_eq!(m.net.balance(m.buyer, m.aapl.asset_id()), 20);
    assert_eq!(m.net.balance(m.buyer, m.usd.asset_id()), 2800);
    assert_eq!(m.net.balance(m.seller, m.usd.asset_id()), 2200);

    let index = m.net.ledger.order_index();
    assert!(index.find_open_order_by_outpoint(&order).is_none());
    let rest = index
        .find_open_order_by_outpoint(&Outpoint::new(committed.hash, 2))
        .expect("remainder stays open");
    assert_eq!(rest.remaining_offer_amount, 80);
    assert_eq!(rest.prices, vec![PriceTier::new(m.usd.asset_id(), 1, 110)]);
}

#[test]
fn full_redeem_leaves_no_remainder() {
    let m = Market::new();
    let order = m.post_default_order();
    m.net.fund(m.buyer, &m.usd, 6000);

    let committed = m
        .net
        .submit(m.redeem_sources(order, 100, 11_000), m.redeem_destinations(100, 11_000))
        .unwrap();
    assert!(committed.outputs().iter().all(|o| !o.script.is_orderbook()));
    m.net.make_block();

    assert!(
        m.net
            .ledger
            .order_index()
            .find_orders(m.aapl.asset_id(), &[], OrderStatus::Open)
            .to_vec()
            .is_empty()
    );
    assert_eq!(m.net.balance(m.buyer, m.aapl.asset_id()), 100);
    assert_eq!(m.net.balance(m.seller, m.usd.asset_id()), 11_000);
}

#[test]
fn first_dividing_tier_sets_the_price() {
    let m = Market::new();
    let order = m.net.post_order(
        m.seller,
        m.aapl.asset_id(),
        100,
        vec![
            PriceTier::new(m.usd.asset_id(), 10, 1000),
            PriceTier::new(m.usd.asset_id(), 1, 120),
        ],
    );

    // 20 is a multiple of 10, so tier 0 prices it: 20 / 10 * 1000.
    let committed = m
        .net
        .submit(m.redeem_sources(order, 20, 2000), m.redeem_destinations(20, 2000))
        .unwrap();
    assert!(matches!(
        committed.tx.inputs[0].witness.clause,
        Some(ContractClause::Redeem { tier_index: 0, .. })
    ));
    m.net.make_block();

    // 5 only divides tier 1.
    let rest = Outpoint::new(committed.hash, 2);
    let committed = m
        .net
        .submit(m.redeem_sources(rest, 5, 600), m.redeem_destinations(5, 600))
        .unwrap();
    assert!(matches!(
        committed.tx.inputs[0].witness.clause,
        Some(ContractClause::Redeem { tier_index: 1, .. })
    ));
}

#[test]
fn redeem_amount_errors() {
    let m = Market::new();
    let order = m.net.post_order(
        m.seller,
        m.aapl.asset_id(),
        100,
        vec![PriceTier::new(m.usd.asset_id(), 3, 300)],
    );

    let err = m
        .net
        .submit(m.redeem_sources(order, 20, 2000), m.redeem_destinations(20, 2000))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmountMismatch);

    let err = m
        .net
        .submit(m.redeem_sources(order, 102, 10_200), m.redeem_destinations(102, 10_200))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    // Offered payment differs from what is due.
    let err = m
        .net
        .submit(m.redeem_sources(order, 3, 299), m.redeem_destinations(3, 299))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmountMismatch);

    // Nothing was reserved by the failed builds.
    assert_eq!(m.net.builder.reserved_count(), 0);
}

#[test]
fn redeem_without_seller_payment_is_rejected() {
    let m = Market::new();
    let order = m.post_default_order();
    let (thief, _) = m.net.new_account();

    let mut destinations = m.redeem_destinations(20, 2200);
    destinations[0] = account_destination(m.usd.asset_id(), 2200, thief);
    let err = m.net.submit(m.redeem_sources(order, 20, 2200), destinations).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[test]
fn tampered_redeem_clause_fails_the_ledger_script_check() {
    let m = Market::new();
    let order = m.post_default_order();
    let mut template = m
        .net
        .builder
        .build(
            m.redeem_sources(order, 20, 2200),
            m.redeem_destinations(20, 2200),
            offerledger_builder::testing::TEST_TTL,
        )
        .unwrap();

    // Point the seller payment at the buyer's AAPL output instead.
    template.inputs[0].witness.clause = Some(ContractClause::Redeem {
        tier_index: 0,
        payment_output: 1,
        remainder_output: Some(2),
    });
    m.net.builder.sign(&mut template, &m.net.signer).unwrap();
    let err = m.net.builder.finalize_tx(&template).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ScriptUnsatisfied);
    assert_eq!(m.net.builder.reserved_count(), 0);
}

#[test]
fn redeem_of_spent_order_is_already_spent() {
    let m = Market::new();
    let order = m.post_default_order();
    m.net
        .submit(m.redeem_sources(order, 20, 2200), m.redeem_destinations(20, 2200))
        .unwrap();
    m.net.make_block();

    let err = m
        .net
        .builder
        .build(
            m.redeem_sources(order, 10, 1100),
            m.redeem_destinations(10, 1100),
            offerledger_builder::testing::TEST_TTL,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadySpent);
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[test]
fn cancel_returns_funds_and_removes_order() {
    let m = Market::new();
    let order = m.post_default_order();

    m.net
        .submit(
            vec![Source::OrderbookCancel { outpoint: order }],
            vec![account_destination(m.aapl.asset_id(), 100, m.seller)],
        )
        .unwrap();
    m.net.make_block();

    let index = m.net.ledger.order_index();
    assert!(index.find_open_order_by_outpoint(&order).is_none());
    assert!(
        index
            .find_orders(m.aapl.asset_id(), &[m.usd.asset_id()], OrderStatus::Open)
            .to_vec()
            .is_empty()
    );
    assert_eq!(m.net.balance(m.seller, m.aapl.asset_id()), 100);
}

#[test]
fn cancel_needs_the_seller_key() {
    let m = Market::new();
    let order = m.post_default_order();

    let mut template = m
        .net
        .builder
        .build(
            vec![Source::OrderbookCancel { outpoint: order }],
            vec![account_destination(m.aapl.asset_id(), 100, m.buyer)],
            offerledger_builder::testing::TEST_TTL,
        )
        .unwrap();
    assert_eq!(template.signing_instructions[0].key, m.seller_key);

    // A keyring without the seller key cannot sign it.
    let stranger = offerledger_builder::KeyringSigner::new();
    let err = m.net.builder.sign(&mut template, &stranger).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureInvalid);

    // Unsigned, the ledger refuses it.
    let err = m.net.builder.finalize_tx(&template).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ScriptUnsatisfied);
}
