//! Output scripts.
//!
//! A script is an opaque byte string that decides who may spend an output.
//! Only two forms are spendable:
//!
//! ```text
//!   pay-to-key : 0x01 || ed25519 key (32)
//!   orderbook  : 0x02 || version || flags || seller account (16)
//!                     || seller key (32) || n (u16 BE) || n × tier (48)
//! ```
//!
//! Encoding and decoding of the orderbook form lives with the contract;
//! this module only knows the tags.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{OfferLedgerError, PublicKey, Result, constants};

/// Raw output script bytes.
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
pub struct Script(pub Vec<u8>);

impl Script {
    /// The control program of a key: spendable by a signature from that key.
    #[must_use]
    pub fn pay_to_key(key: &PublicKey) -> Self {
        let mut bytes = Vec::with_capacity(33);
        bytes.push(constants::SCRIPT_TAG_PAY_TO_KEY);
        bytes.extend_from_slice(&key.0);
        Self(bytes)
    }

    /// The key of a pay-to-key script, or `None` for any other form.
    #[must_use]
    pub fn as_pay_to_key(&self) -> Option<PublicKey> {
        match self.0.split_first() {
            Some((&constants::SCRIPT_TAG_PAY_TO_KEY, rest)) if rest.len() == 32 => {
                let mut key = [0u8; 32];
                key.copy_from_slice(rest);
                Some(PublicKey(key))
            }
            _ => None,
        }
    }

    /// Whether the script carries the orderbook contract tag.
    #[must_use]
    pub fn is_orderbook(&self) -> bool {
        self.0.first() == Some(&constants::SCRIPT_TAG_ORDERBOOK)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        hex::decode(s)
            .map(Self)
            .map_err(|e| OfferLedgerError::validation(format!("script: invalid hex: {e}")))
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.0[..self.0.len().min(8)];
        write!(f, "Script({}.., {} bytes)", hex::encode(shown), self.0.len())
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for arbitrary byte fields rendered as hex (output metadata).
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
