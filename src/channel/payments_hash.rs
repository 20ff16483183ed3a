//! Cumulative payments hash
use sha2::{Digest, Sha256};

use crate::types::{Bytes32, PAYMENTS_DOMAIN_TAG};

/// Computes the next payments hash by chaining the previous hash with a raw
/// payment envelope.
///
/// hash(`PAYMENTS_DOMAIN_TAG`||`previous`||len(`envelope`)||`envelope`).
/// The length prefix keeps envelope boundaries unambiguous, so two payments
/// never chain to the same digest as their concatenation.
pub fn next_payments_hash(previous: Bytes32, envelope: &[u8]) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(PAYMENTS_DOMAIN_TAG);
    hasher.update(previous);
    hasher.update((envelope.len() as u64).to_le_bytes());
    hasher.update(envelope);
    hasher.finalize().into()
}
