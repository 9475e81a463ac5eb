//! Account directory: which key controls an account's funds.
//!
//! Account provisioning lives elsewhere; the builder only needs the
//! mapping to find an account's outputs and to pay into it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use offerledger_types::{AccountId, OfferLedgerError, PublicKey, Result, Script};

pub trait AccountDirectory: Send + Sync {
    /// The key whose pay-to-key script holds the account's funds.
    fn control_key(&self, account: &AccountId) -> Result<PublicKey>;

    /// The account's control program.
    fn control_script(&self, account: &AccountId) -> Result<Script> {
        Ok(Script::pay_to_key(&self.control_key(account)?))
    }
}

/// In-memory [`AccountDirectory`].
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    keys: RwLock<HashMap<AccountId, PublicKey>>,
}

impl MemoryAccounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `account` to `key`, replacing any previous binding.
    pub fn register(&self, account: AccountId, key: PublicKey) {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account, key);
    }

    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccountDirectory for MemoryAccounts {
    fn control_key(&self, account: &AccountId) -> Result<PublicKey> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account)
            .copied()
            .ok_or_else(|| OfferLedgerError::validation(format!("unknown account {account}")))
    }
}
