//! Error types for OfferLedger.
//!
//! All errors use the `OL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Request validation errors
//! - 2xx: Funds / balance errors
//! - 3xx: Orderbook contract errors
//! - 4xx: Signature / script errors
//! - 5xx: Ledger errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{AssetId, Outpoint};

/// Coarse classification of an [`OfferLedgerError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationError,
    UnknownType,
    InsufficientFunds,
    AmountMismatch,
    UnbalancedAssets,
    SignatureInvalid,
    ScriptUnsatisfied,
    AlreadySpent,
    LedgerUnavailable,
    SupplyInvariantViolation,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::UnknownType => "UNKNOWN_TYPE",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::AmountMismatch => "AMOUNT_MISMATCH",
            Self::UnbalancedAssets => "UNBALANCED_ASSETS",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::ScriptUnsatisfied => "SCRIPT_UNSATISFIED",
            Self::AlreadySpent => "ALREADY_SPENT",
            Self::LedgerUnavailable => "LEDGER_UNAVAILABLE",
            Self::SupplyInvariantViolation => "SUPPLY_INVARIANT_VIOLATION",
            Self::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// Central error enum for all OfferLedger operations.
#[derive(Debug, Error)]
pub enum OfferLedgerError {
    // =================================================================
    // Request Validation Errors (1xx)
    // =================================================================
    /// The request is malformed or incomplete. No ledger contact was attempted.
    #[error("OL_ERR_100: Validation failed: {reason}")]
    Validation { reason: String },

    /// The source or destination type tag is not recognised.
    #[error("OL_ERR_101: Unknown {role} type: {tag:?}")]
    UnknownType { role: &'static str, tag: String },

    // =================================================================
    // Funds / Balance Errors (2xx)
    // =================================================================
    /// The requested amount exceeds what is available.
    #[error("OL_ERR_200: Insufficient funds of asset {asset}: need {needed}, have {available}")]
    InsufficientFunds {
        asset: AssetId,
        needed: u64,
        available: u64,
    },

    /// Inputs and outputs of a non-issuance asset do not match.
    #[error("OL_ERR_201: Unbalanced asset {asset}: inputs {inputs}, outputs {outputs}")]
    UnbalancedAssets {
        asset: AssetId,
        inputs: u64,
        outputs: u64,
    },

    // =================================================================
    // Orderbook Contract Errors (3xx)
    // =================================================================
    /// A redemption amount does not divide evenly into any price tier,
    /// or the offered payment does not match the amount due.
    #[error("OL_ERR_300: Amount mismatch: {reason}")]
    AmountMismatch { reason: String },

    // =================================================================
    // Signature / Script Errors (4xx)
    // =================================================================
    /// The signer could not produce a valid signature for an instruction.
    #[error("OL_ERR_400: Signature invalid: {reason}")]
    SignatureInvalid { reason: String },

    /// An input's witness does not satisfy the script it spends.
    #[error("OL_ERR_401: Script unsatisfied on input {input_index}: {reason}")]
    ScriptUnsatisfied { input_index: usize, reason: String },

    // =================================================================
    // Ledger Errors (5xx)
    // =================================================================
    /// The outpoint is no longer unspent (lost a spend race or stale order).
    #[error("OL_ERR_500: Outpoint already spent: {0}")]
    AlreadySpent(Outpoint),

    /// The ledger or its store could not be reached. Callers may retry.
    #[error("OL_ERR_501: Ledger unavailable: {reason}")]
    LedgerUnavailable { reason: String },

    /// Committed outputs no longer add up to the issued supply.
    #[error("OL_ERR_502: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("OL_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("OL_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config document, out-of-range values).
    #[error("OL_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl OfferLedgerError {
    /// Shorthand for [`OfferLedgerError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`OfferLedgerError::ScriptUnsatisfied`].
    pub fn script(input_index: usize, reason: impl Into<String>) -> Self {
        Self::ScriptUnsatisfied {
            input_index,
            reason: reason.into(),
        }
    }

    /// The kind of failure, for callers that branch on it.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::Serialization(_) | Self::Configuration(_) => {
                ErrorKind::ValidationError
            }
            Self::UnknownType { .. } => ErrorKind::UnknownType,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::UnbalancedAssets { .. } => ErrorKind::UnbalancedAssets,
            Self::AmountMismatch { .. } => ErrorKind::AmountMismatch,
            Self::SignatureInvalid { .. } => ErrorKind::SignatureInvalid,
            Self::ScriptUnsatisfied { .. } => ErrorKind::ScriptUnsatisfied,
            Self::AlreadySpent(_) => ErrorKind::AlreadySpent,
            Self::LedgerUnavailable { .. } => ErrorKind::LedgerUnavailable,
            Self::SupplyInvariantViolation { .. } => ErrorKind::SupplyInvariantViolation,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, OfferLedgerError>;

impl From<serde_json::Error> for OfferLedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
