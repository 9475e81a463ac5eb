//! Build, sign, and finalize through the public builder surface.

use std::collections::BTreeMap;

use offerledger_builder::testing::{TEST_TTL, TestNet, account_destination};
use offerledger_builder::{BuildRequest, DestinationRequest, SourceRequest};
use offerledger_ledger::{Ledger, Store};
use offerledger_types::{
    AssetAmount, AssetId, BuilderConfig, Destination, ErrorKind, LedgerConfig, OfferLedgerConfig, OrderStatus,
    PriceTier, Script, Source, TxTemplate,
};

fn per_asset(template: &TxTemplate) -> (BTreeMap<AssetId, u64>, BTreeMap<AssetId, u64>) {
    let mut inputs = BTreeMap::new();
    for input in &template.inputs {
        let amount = input.asset_amount();
        *inputs.entry(amount.asset_id).or_default() += amount.amount;
    }
    let mut outputs = BTreeMap::new();
    for output in &template.outputs {
        *outputs.entry(output.asset_id).or_default() += output.amount;
    }
    (inputs, outputs)
}

#[test]
fn multi_asset_build_is_balanced_per_asset() {
    let net = TestNet::new();
    let (alice, _) = net.new_account();
    let (bob, _) = net.new_account();
    let usd = net.new_asset("USD");
    let eur = net.new_asset("EUR");
    net.fund(alice, &usd, 70);
    net.fund(alice, &usd, 30);
    net.fund(alice, &eur, 500);

    let template = net
        .builder
        .build(
            vec![
                Source::Account {
                    asset_amount: AssetAmount::new(usd.asset_id(), 80),
                    account_id: alice,
                },
                Source::Account {
                    asset_amount: AssetAmount::new(eur.asset_id(), 120),
                    account_id: alice,
                },
            ],
            vec![
                account_destination(usd.asset_id(), 80, bob),
                account_destination(eur.asset_id(), 120, bob),
            ],
            TEST_TTL,
        )
        .unwrap();

    let (inputs, outputs) = per_asset(&template);
    assert_eq!(inputs, outputs);
    // Smallest first: 30 then 70 cover 80, leaving 20 change.
    assert_eq!(template.inputs.len(), 3);
    assert_eq!(template.inputs[0].asset_amount().amount, 30);
    assert_eq!(template.outputs.len(), 4);
    assert_eq!(template.outputs[2].amount, 20);
    assert_eq!(template.outputs[3].amount, 380);
    assert_eq!(template.signing_instructions.len(), 3);
}

#[test]
fn shortfall_and_excess_are_reported_per_asset() {
    let net = TestNet::new();
    let (alice, _) = net.new_account();
    let (bob, _) = net.new_account();
    let usd = net.new_asset("USD");
    net.fund(alice, &usd, 100);

    let err = net
        .builder
        .build(
            vec![Source::Account {
                asset_amount: AssetAmount::new(usd.asset_id(), 101),
                account_id: alice,
            }],
            vec![account_destination(usd.asset_id(), 101, bob)],
            TEST_TTL,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    let err = net
        .builder
        .build(
            vec![Source::Account {
                asset_amount: AssetAmount::new(usd.asset_id(), 60),
                account_id: alice,
            }],
            vec![account_destination(usd.asset_id(), 50, bob)],
            TEST_TTL,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnbalancedAssets);

    let err = net
        .builder
        .build(
            vec![Source::Account {
                asset_amount: AssetAmount::new(usd.asset_id(), 50),
                account_id: alice,
            }],
            vec![account_destination(usd.asset_id(), 60, bob)],
            TEST_TTL,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(net.builder.reserved_count(), 0);
}

#[test]
fn build_validation_happens_before_the_ledger() {
    let net = TestNet::with_config(
        LedgerConfig::default(),
        BuilderConfig {
            max_output_metadata_bytes: 4,
            ..BuilderConfig::default()
        },
    );
    let (alice, _) = net.new_account();
    let usd = net.new_asset("USD");
    net.ledger.store().set_available(false);

    let source = || Source::Issuance {
        definition: usd.clone(),
        amount: 10,
    };
    let check = |sources: Vec<Source>, destinations: Vec<Destination>| {
        net.builder.build(sources, destinations, TEST_TTL).unwrap_err().kind()
    };

    assert_eq!(check(vec![], vec![account_destination(usd.asset_id(), 10, alice)]), ErrorKind::ValidationError);
    assert_eq!(check(vec![source()], vec![]), ErrorKind::ValidationError);
    assert_eq!(
        check(
            vec![source()],
            vec![Destination::Address {
                asset_amount: AssetAmount::new(usd.asset_id(), 10),
                script: Script::pay_to_key(&usd.issuer_key),
                metadata: vec![0u8; 5],
            }]
        ),
        ErrorKind::ValidationError
    );
    assert_eq!(
        net.builder
            .build(vec![source()], vec![account_destination(usd.asset_id(), 10, alice)], std::time::Duration::ZERO)
            .unwrap_err()
            .kind(),
        ErrorKind::ValidationError
    );
    // Unknown account in a destination.
    assert_eq!(
        check(
            vec![source()],
            vec![account_destination(usd.asset_id(), 10, offerledger_types::AccountId::new())]
        ),
        ErrorKind::ValidationError
    );
}

#[test]
fn unavailable_store_keeps_state_and_mempool() {
    let net = TestNet::new();
    let (seller, _) = net.new_account();
    let aapl = net.new_asset("AAPL");
    let usd = net.new_asset("USD");
    net.fund(seller, &aapl, 100);
    let order = net.post_order(seller, aapl.asset_id(), 60, vec![PriceTier::new(usd.asset_id(), 1, 5)]);
    let height = net.ledger.height().unwrap();

    net.submit(
        vec![Source::OrderbookCancel { outpoint: order }],
        vec![account_destination(aapl.asset_id(), 60, seller)],
    )
    .unwrap();

    net.ledger.store().set_available(false);
    let err = net.ledger.make_block().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LedgerUnavailable);
    assert_eq!(net.ledger.pending_count(), 1);
    assert!(net.ledger.order_index().find_open_order_by_outpoint(&order).is_some());

    net.ledger.store().set_available(true);
    assert_eq!(net.ledger.height().unwrap(), height);
    net.make_block();
    assert!(net.ledger.order_index().find_open_order_by_outpoint(&order).is_none());
    assert_eq!(net.balance(seller, aapl.asset_id()), 100);
}

#[test]
fn unavailable_ledger_keeps_reservations_for_retry() {
    let net = TestNet::new();
    let (alice, _) = net.new_account();
    let (bob, _) = net.new_account();
    let usd = net.new_asset("USD");
    net.fund(alice, &usd, 10);

    let mut template = net
        .builder
        .build(
            vec![Source::Account {
                asset_amount: AssetAmount::new(usd.asset_id(), 10),
                account_id: alice,
            }],
            vec![account_destination(usd.asset_id(), 10, bob)],
            TEST_TTL,
        )
        .unwrap();
    net.builder.sign(&mut template, &net.signer).unwrap();

    net.ledger.store().set_available(false);
    let err = net.builder.finalize_tx(&template).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LedgerUnavailable);
    assert_eq!(net.builder.reserved_count(), 1);

    net.ledger.store().set_available(true);
    net.builder.finalize_tx(&template).unwrap();
    assert_eq!(net.builder.reserved_count(), 0);
}

#[test]
fn refinalized_template_is_already_spent() {
    let net = TestNet::new();
    let (alice, _) = net.new_account();
    let (bob, _) = net.new_account();
    let usd = net.new_asset("USD");
    net.fund(alice, &usd, 10);

    let mut template = net
        .builder
        .build(
            vec![Source::Account {
                asset_amount: AssetAmount::new(usd.asset_id(), 10),
                account_id: alice,
            }],
            vec![account_destination(usd.asset_id(), 10, bob)],
            TEST_TTL,
        )
        .unwrap();
    net.builder.sign(&mut template, &net.signer).unwrap();
    net.builder.finalize_tx(&template).unwrap();

    let err = net.builder.finalize_tx(&template).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadySpent);

    net.make_block();
    let err = net.builder.finalize_tx(&template).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadySpent);
}

#[test]
fn json_request_round_trip_through_builder() {
    let net = TestNet::new();
    let (seller, seller_key) = net.new_account();
    let usd = net.new_asset("USD");
    let gold = net.new_asset("GOLD");

    // Issue straight into an order, described as JSON.
    let request = BuildRequest {
        sources: vec![SourceRequest::issue(gold.issuer_key, "GOLD", 12)],
        destinations: vec![DestinationRequest::orderbook(
            gold.asset_id(),
            12,
            seller,
            seller_key,
            vec![PriceTier::new(usd.asset_id(), 4, 7)],
        )],
        ttl_secs: Some(30),
    };
    let json = serde_json::to_string(&request).unwrap();
    assert!(json.contains("\"orderbookPrices\""));
    let parsed = BuildRequest::from_json_str(&json).unwrap();
    assert_eq!(parsed, request);

    let mut template = net.builder.build_request(&parsed).unwrap();
    net.builder.sign(&mut template, &net.signer).unwrap();
    net.builder.finalize_tx(&template).unwrap();
    net.make_block();

    let orders = net
        .ledger
        .order_index()
        .find_orders(gold.asset_id(), &[], OrderStatus::Open)
        .to_vec();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].remaining_offer_amount, 12);
    assert_eq!(orders[0].seller_key, seller_key);
}

#[test]
fn unknown_request_type_is_rejected() {
    let net = TestNet::new();
    let err = net
        .builder
        .build_request(
            &BuildRequest::from_json_str(
                r#"{"sources": [{"type": "swap", "amount": 1}], "destinations": [{"type": "account"}]}"#,
            )
            .unwrap(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownType);
}

#[test]
fn issued_supply_is_tracked_per_asset() {
    let net = TestNet::new();
    let (alice, _) = net.new_account();
    let (bob, _) = net.new_account();
    let usd = net.new_asset("USD");
    net.fund(alice, &usd, 40);
    net.fund(bob, &usd, 2);

    let issued = net.ledger.store().issued_supply().unwrap();
    assert_eq!(issued, vec![(usd.asset_id(), 42)]);
    assert_eq!(net.ledger.store().unspent_total(&usd.asset_id()).unwrap(), 42);
}

#[test]
fn config_document_drives_builder_defaults() {
    let config = OfferLedgerConfig::from_json_str(
        r#"{"ledger": {"maxPendingTxs": 2}, "builder": {"reservationTtlSecs": 5, "maxPriceTiers": 2}}"#,
    )
    .unwrap();
    let net = TestNet::with_config(config.ledger, config.builder);
    let (seller, seller_key) = net.new_account();
    let gold = net.new_asset("GOLD");
    let usd = net.new_asset("USD");

    let tiers = vec![
        PriceTier::new(usd.asset_id(), 1, 1),
        PriceTier::new(usd.asset_id(), 2, 3),
        PriceTier::new(usd.asset_id(), 3, 5),
    ];
    let err = net
        .builder
        .issue(
            gold.clone(),
            6,
            vec![Destination::Orderbook {
                asset_amount: AssetAmount::new(gold.asset_id(), 6),
                order_info: offerledger_types::OrderInfo {
                    seller_account_id: seller,
                    seller_key,
                    prices: tiers,
                },
                allow_additional: false,
                metadata: Vec::new(),
            }],
            TEST_TTL,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let template = net
        .builder
        .build_request(&BuildRequest {
            sources: vec![SourceRequest::issue(gold.issuer_key, "GOLD", 6)],
            destinations: vec![DestinationRequest::account(gold.asset_id(), 6, seller)],
            ttl_secs: None,
        })
        .unwrap();
    let ttl = template.reserved_until - chrono::Utc::now();
    assert!(ttl <= chrono::Duration::seconds(5));
}
