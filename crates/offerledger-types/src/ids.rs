//! Identifiers used throughout OfferLedger.
//!
//! Content-addressed ids (`AssetId`, `TxHash`) and keys (`PublicKey`) are
//! 32-byte values rendered as lowercase hex in JSON and logs. Entity ids
//! that are merely allocated (`AccountId`, `TemplateId`) use UUIDv7 for
//! time-ordered sorting.

use std::fmt;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{OfferLedgerError, Result, constants};

/// Implements hex `Display`/`Debug`/serde and `from_hex` for a 32-byte newtype.
macro_rules! hex_bytes32 {
    ($name:ident) => {
        impl $name {
            /// Parse from a 64-character hex string.
            pub fn from_hex(s: &str) -> Result<Self> {
                let bytes = hex::decode(s).map_err(|e| {
                    OfferLedgerError::validation(format!(
                        "{}: invalid hex {s:?}: {e}",
                        stringify!($name)
                    ))
                })?;
                let arr: [u8; 32] = bytes.try_into().map_err(|_| {
                    OfferLedgerError::validation(format!(
                        "{}: expected 32 bytes",
                        stringify!($name)
                    ))
                })?;
                Ok(Self(arr))
            }

            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            #[must_use]
            pub fn short(&self) -> String {
                hex::encode(&self.0[..4])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Identifier of an asset. Derived from the issuer key and a label, see
/// [`AssetDefinition::asset_id`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct AssetId(pub [u8; 32]);

hex_bytes32!(AssetId);

// ---------------------------------------------------------------------------
// TxHash
// ---------------------------------------------------------------------------

/// Hash of a transaction's witness-free canonical encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct TxHash(pub [u8; 32]);

hex_bytes32!(TxHash);

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// Raw ed25519 verifying key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct PublicKey(pub [u8; 32]);

hex_bytes32!(PublicKey);

impl PublicKey {
    /// Decode into an ed25519 verifying key.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| OfferLedgerError::SignatureInvalid {
            reason: format!("key {} is not a valid ed25519 point: {e}", self.short()),
        })
    }

    /// Check an ed25519 signature over `message`. Malformed keys or
    /// signatures simply fail verification.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = self.verifying_key() else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify(message, &signature).is_ok()
    }
}

impl From<&VerifyingKey> for PublicKey {
    fn from(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

// ---------------------------------------------------------------------------
// AssetDefinition
// ---------------------------------------------------------------------------

/// What an asset is: the key allowed to issue it plus a free-form label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDefinition {
    pub issuer_key: PublicKey,
    pub label: String,
}

impl AssetDefinition {
    #[must_use]
    pub fn new(issuer_key: PublicKey, label: impl Into<String>) -> Self {
        Self {
            issuer_key,
            label: label.into(),
        }
    }

    /// `SHA-256("offerledger:asset:v1:" || issuer_key || label)`.
    #[must_use]
    pub fn asset_id(&self) -> AssetId {
        let mut hasher = Sha256::new();
        hasher.update(constants::ASSET_ID_DOMAIN);
        hasher.update(self.issuer_key.0);
        hasher.update(self.label.as_bytes());
        let mut id = [0u8; 32];
        id.copy_from_slice(&hasher.finalize());
        AssetId(id)
    }
}

// ---------------------------------------------------------------------------
// Outpoint
// ---------------------------------------------------------------------------

/// A reference to one output of one transaction: the unit of spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outpoint {
    pub tx_hash: TxHash,
    pub index: u32,
}

impl Outpoint {
    #[must_use]
    pub fn new(tx_hash: TxHash, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.index)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Identifier of an account. Accounts are provisioned outside this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acc:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TemplateId
// ---------------------------------------------------------------------------

/// Identifier of a built transaction template; keys its output reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TemplateId(pub Uuid);

impl TemplateId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TemplateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tpl:{}", self.0)
    }
}

/// Random ids for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
mod random {
    use super::{AssetId, PublicKey, TxHash};

    impl AssetId {
        pub fn random() -> Self {
            Self(rand::random())
        }
    }

    impl TxHash {
        pub fn random() -> Self {
            Self(rand::random())
        }
    }

    impl PublicKey {
        /// A valid ed25519 key with a throwaway secret.
        pub fn random() -> Self {
            let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
            Self::from(&signing.verifying_key())
        }
    }
}
