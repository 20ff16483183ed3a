//! Payment envelopes
//!
//! A payment envelope is the JSON object a sender submits with each
//! payment. It is parsed strictly: `target`, `amount` and `signature` are
//! required, unknown fields are rejected, and structural checks run before
//! any cryptographic validation is attempted.
//!
//! ```json
//! {"target":"merchant-42","amount":1500,"signature":"3044...01"}
//! ```
//!
//! `signature` is the hex-encoded DER ECDSA signature of the sender over the
//! close transaction that pays the receiver the post-payment balance.

use bitcoin::hex::{DisplayHex, FromHex};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireEnvelope {
    target: String,
    amount: u64,
    signature: String,
}

/// A structurally valid payment envelope
///
/// Holds the parsed fields alongside the exact bytes that were received,
/// which are what gets hashed and appended to the payment log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEnvelope {
    target: String,
    amount: u64,
    signature: Vec<u8>,
    raw: Vec<u8>,
}

impl PaymentEnvelope {
    /// Parses raw envelope bytes
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidEnvelope` if:
    /// - The bytes are not a JSON object with exactly the required fields
    /// - `target` is empty
    /// - `amount` is zero
    /// - `signature` is not non-empty hex
    pub fn parse(raw: &[u8]) -> Result<Self, ValidationError> {
        let wire: WireEnvelope = serde_json::from_slice(raw)
            .map_err(|e| ValidationError::InvalidEnvelope(e.to_string()))?;

        if wire.target.trim().is_empty() {
            return Err(ValidationError::InvalidEnvelope("target is empty".to_string()));
        }
        if wire.amount == 0 {
            return Err(ValidationError::InvalidEnvelope("amount must be positive".to_string()));
        }
        let signature = Vec::<u8>::from_hex(&wire.signature)
            .map_err(|e| ValidationError::InvalidEnvelope(format!("signature: {}", e)))?;
        if signature.is_empty() {
            return Err(ValidationError::InvalidEnvelope("signature is empty".to_string()));
        }

        Ok(Self { target: wire.target, amount: wire.amount, signature, raw: raw.to_vec() })
    }

    /// Builds and encodes a new envelope
    ///
    /// This is the sender-side counterpart of [`PaymentEnvelope::parse`].
    pub fn new(target: impl Into<String>, amount: u64, signature: Vec<u8>) -> Self {
        let wire = WireEnvelope {
            target: target.into(),
            amount,
            signature: signature.to_lower_hex_string(),
        };
        // Serializing a struct of strings and integers cannot fail
        let raw = serde_json::to_vec(&wire).unwrap_or_default();
        Self { target: wire.target, amount, signature, raw }
    }

    /// Gets the payment destination
    pub fn target(&self) -> &str { &self.target }

    /// Gets the claimed amount in satoshis
    pub fn amount(&self) -> u64 { self.amount }

    /// Gets the DER-encoded sender signature
    pub fn signature(&self) -> &[u8] { &self.signature }

    /// Gets the bytes as received
    pub fn raw(&self) -> &[u8] { &self.raw }
}
