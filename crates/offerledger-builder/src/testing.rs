//! Test fixtures: a wired-up in-memory ledger, account directory, keyring,
//! and builder, plus shortcuts for funding accounts and posting orders.
//!
//! **Never use in production.** Helpers panic on any failure.

use std::sync::Arc;
use std::time::Duration;

use offerledger_ledger::{Ledger, MemoryLedger, MemoryStore};
use offerledger_types::{
    AccountId, AssetAmount, AssetDefinition, AssetId, Block, BuilderConfig, CommittedTx, Destination,
    LedgerConfig, OrderInfo, Outpoint, PriceTier, PublicKey, Result, Script, Source,
};

use crate::{KeyringSigner, MemoryAccounts, Reservations, TransactionBuilder};

/// Install a `tracing` subscriber for tests, honouring `RUST_LOG`.
/// Safe to call from every test.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Ttl used by fixture builds.
pub const TEST_TTL: Duration = Duration::from_secs(60);

/// An in-memory network: one ledger, one account directory, one keyring.
pub struct TestNet {
    pub ledger: Arc<MemoryLedger>,
    pub accounts: Arc<MemoryAccounts>,
    pub signer: KeyringSigner,
    pub reservations: Reservations,
    pub builder: TransactionBuilder<MemoryLedger, MemoryAccounts>,
}

impl Default for TestNet {
    fn default() -> Self {
        Self::new()
    }
}

impl TestNet {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default(), BuilderConfig::default())
    }

    pub fn with_config(ledger: LedgerConfig, builder: BuilderConfig) -> Self {
        init_test_logging();
        let ledger = Arc::new(MemoryLedger::open(MemoryStore::new(), ledger).expect("open ledger"));
        let accounts = Arc::new(MemoryAccounts::new());
        let reservations = Reservations::new();
        let builder = TransactionBuilder::new(
            Arc::clone(&ledger),
            Arc::clone(&accounts),
            reservations.clone(),
            builder,
        );
        Self {
            ledger,
            accounts,
            signer: KeyringSigner::new(),
            reservations,
            builder,
        }
    }

    /// Another builder over the same ledger, accounts, and reservations.
    pub fn another_builder(&self) -> TransactionBuilder<MemoryLedger, MemoryAccounts> {
        TransactionBuilder::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.accounts),
            self.reservations.clone(),
            self.builder.config().clone(),
        )
    }

    /// A new account whose key is held by the keyring.
    pub fn new_account(&self) -> (AccountId, PublicKey) {
        let account = AccountId::new();
        let key = self.signer.generate();
        self.accounts.register(account, key);
        (account, key)
    }

    /// A new asset whose issuer key is held by the keyring.
    pub fn new_asset(&self, label: &str) -> AssetDefinition {
        AssetDefinition::new(self.signer.generate(), label)
    }

    /// Build, sign, and finalize. Leaves the transaction pending.
    pub fn submit(&self, sources: Vec<Source>, destinations: Vec<Destination>) -> Result<CommittedTx> {
        let mut template = self.builder.build(sources, destinations, TEST_TTL)?;
        self.builder.sign(&mut template, &self.signer)?;
        self.builder.finalize_tx(&template)
    }

    /// Issue `amount` of `asset` to `account` and commit a block.
    pub fn fund(&self, account: AccountId, asset: &AssetDefinition, amount: u64) -> CommittedTx {
        let committed = self
            .submit(
                vec![Source::Issuance {
                    definition: asset.clone(),
                    amount,
                }],
                vec![account_destination(asset.asset_id(), amount, account)],
            )
            .expect("fund account");
        self.make_block();
        committed
    }

    /// Committed, unspent balance of `asset` held by `account`.
    pub fn balance(&self, account: AccountId, asset: AssetId) -> u64 {
        let key = self.accounts_key(account);
        self.ledger
            .unspent_for_script(&Script::pay_to_key(&key))
            .expect("read balance")
            .iter()
            .filter(|u| u.output.asset_id == asset)
            .map(|u| u.output.amount)
            .sum()
    }

    /// Lock `amount` of `asset` from `seller` into an order and commit a
    /// block. Returns the order's outpoint.
    pub fn post_order(&self, seller: AccountId, asset: AssetId, amount: u64, prices: Vec<PriceTier>) -> Outpoint {
        let order_info = OrderInfo {
            seller_account_id: seller,
            seller_key: self.accounts_key(seller),
            prices,
        };
        let committed = self
            .submit(
                vec![Source::Account {
                    asset_amount: AssetAmount::new(asset, amount),
                    account_id: seller,
                }],
                vec![Destination::Orderbook {
                    asset_amount: AssetAmount::new(asset, amount),
                    order_info,
                    allow_additional: false,
                    metadata: Vec::new(),
                }],
            )
            .expect("post order");
        self.make_block();
        Outpoint::new(committed.hash, 0)
    }

    pub fn make_block(&self) -> Block {
        self.ledger.make_block().expect("make block")
    }

    fn accounts_key(&self, account: AccountId) -> PublicKey {
        use crate::AccountDirectory;
        self.accounts.control_key(&account).expect("registered account")
    }
}

/// Pay `amount` of `asset` into `account`, without metadata.
pub fn account_destination(asset: AssetId, amount: u64, account: AccountId) -> Destination {
    Destination::Account {
        asset_amount: AssetAmount::new(asset, amount),
        account_id: account,
        metadata: Vec::new(),
    }
}
