//! Template signing.
//!
//! Key custody is external: a [`Signer`] is asked for a signature by public
//! key and never exposes secrets. [`sign_template`] walks the template's
//! signing instructions and attaches each signature to its input's witness.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use ed25519_dalek::{Signer as _, SigningKey};
use offerledger_types::{OfferLedgerError, PublicKey, Result, TxTemplate};

/// Produces signatures for keys it holds.
pub trait Signer: Send + Sync {
    /// Sign `message` with the secret behind `key`.
    ///
    /// # Errors
    /// [`OfferLedgerError::SignatureInvalid`] if the key is not held.
    fn sign(&self, key: &PublicKey, message: &[u8]) -> Result<Vec<u8>>;
}

/// In-memory ed25519 keyring.
#[derive(Default)]
pub struct KeyringSigner {
    keys: RwLock<HashMap<PublicKey, SigningKey>>,
}

impl std::fmt::Debug for KeyringSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringSigner")
            .field("keys", &self.len())
            .finish()
    }
}

impl KeyringSigner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signing key; returns its public key.
    pub fn add(&self, signing: SigningKey) -> PublicKey {
        let key = PublicKey::from(&signing.verifying_key());
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, signing);
        key
    }

    /// Add a key from its 32-byte secret.
    pub fn add_secret(&self, secret: &[u8; 32]) -> PublicKey {
        self.add(SigningKey::from_bytes(secret))
    }

    #[must_use]
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl KeyringSigner {
    /// Generate and hold a fresh random key.
    pub fn generate(&self) -> PublicKey {
        self.add(SigningKey::generate(&mut rand::rngs::OsRng))
    }
}

impl Signer for KeyringSigner {
    fn sign(&self, key: &PublicKey, message: &[u8]) -> Result<Vec<u8>> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let signing = keys.get(key).ok_or_else(|| OfferLedgerError::SignatureInvalid {
            reason: format!("no signing key for {}", key.short()),
        })?;
        Ok(signing.sign(message).to_bytes().to_vec())
    }
}

/// Sign every instruction in `template` over its sighash.
///
/// The template is left untouched if any instruction fails.
///
/// # Errors
/// [`OfferLedgerError::SignatureInvalid`] if the signer lacks a key, or a
/// produced signature does not verify.
pub fn sign_template(template: &mut TxTemplate, signer: &dyn Signer) -> Result<()> {
    let sighash = template.sighash();
    let mut signatures = Vec::with_capacity(template.signing_instructions.len());
    for instruction in &template.signing_instructions {
        if instruction.input_index >= template.inputs.len() {
            return Err(OfferLedgerError::SignatureInvalid {
                reason: format!("instruction names missing input {}", instruction.input_index),
            });
        }
        let signature = signer.sign(&instruction.key, &sighash)?;
        if !instruction.key.verify(&sighash, &signature) {
            return Err(OfferLedgerError::SignatureInvalid {
                reason: format!(
                    "signature from {} for input {} does not verify",
                    instruction.key.short(),
                    instruction.input_index
                ),
            });
        }
        signatures.push((instruction.input_index, signature));
    }
    for (index, signature) in signatures {
        template.inputs[index].witness.signature = Some(signature);
    }
    tracing::debug!(template = %template.id, signatures = template.signing_instructions.len(), "Template signed");
    Ok(())
}
