//! Core type definitions for the channel receiver
//!
//! This module defines fundamental types used across multiple modules,
//! providing a common location for shared type definitions.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ValidationError;

// ============================================================================
// Fundamental Types
// ============================================================================

/// Type alias for 32-byte arrays used across cryptographic operations
pub type Bytes32 = [u8; 32];

/// Index of a channel's private key within the key tree
///
/// Only non-hardened indices (below 2^31) are ever issued.
pub type KeyPath = u32;

/// First key path that cannot be issued as a non-hardened child index
pub const KEY_PATH_LIMIT: KeyPath = 1 << 31;

// ============================================================================
// Channel Domain
// ============================================================================

/// Opaque channel identifier
///
/// 256 bits drawn from the thread-local CSPRNG, transported as unpadded
/// base64url. The textual form is always 43 characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(Bytes32);

impl ChannelId {
    /// Generates a fresh random channel ID
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wraps raw ID bytes
    pub fn from_bytes(bytes: Bytes32) -> Self { Self(bytes) }

    /// Gets the raw ID bytes
    pub fn as_bytes(&self) -> &Bytes32 { &self.0 }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.0))
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self)
    }
}

impl FromStr for ChannelId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| ValidationError::InvalidChannelId(e.to_string()))?;
        let bytes: Bytes32 = decoded.try_into().map_err(|v: Vec<u8>| {
            ValidationError::InvalidChannelId(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Channel protocol version this receiver speaks
pub const PROTOCOL_VERSION: u32 = 2;

/// Domain separation tag for the cumulative payments hash
pub const PAYMENTS_DOMAIN_TAG: &[u8] = b"PCR_PAYMENTS_v0";

// ============================================================================
// Funding Policy Defaults
// ============================================================================

/// Minimum depth a funding output must reach before Open succeeds
pub const DEFAULT_MIN_FUNDING_CONFIRMATIONS: u32 = 3;

/// Funding outputs deeper than this are treated as stale
pub const DEFAULT_SOFT_CONFIRMATION_TIMEOUT: u32 = 144;
