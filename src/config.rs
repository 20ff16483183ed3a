//! Receiver and protocol configuration
//!
//! Both configurations are plain values, built once and never mutated
//! after the orchestrator is constructed.

use std::str::FromStr;

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network};

use crate::errors::{ConfirmationPolicyError, Error, Result};
use crate::types::{DEFAULT_MIN_FUNDING_CONFIRMATIONS, DEFAULT_SOFT_CONFIRMATION_TIMEOUT};

/// Default CSV delay before the sender can reclaim an unclosed channel (one week)
pub const DEFAULT_REFUND_TIMEOUT_BLOCKS: u16 = 1008;

/// Default fee paid by the close transaction, in satoshis
pub const DEFAULT_CLOSE_FEE_SATS: u64 = 1000;

/// Outputs below this value are not created, in satoshis
pub const DEFAULT_DUST_LIMIT_SATS: u64 = 546;

/// Receiver policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    network: Network,
    payout_destination: Address,
    min_funding_confirmations: u32,
    soft_confirmation_timeout: u32,
}

impl ReceiverConfig {
    /// Creates a configuration with default confirmation window
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `payout_destination` does not parse or is
    /// not an address on `network`.
    pub fn new(network: Network, payout_destination: &str) -> Result<Self> {
        let unchecked = Address::<NetworkUnchecked>::from_str(payout_destination)
            .map_err(|e| Error::Config(format!("payout destination: {}", e)))?;
        let payout_destination = unchecked
            .require_network(network)
            .map_err(|e| Error::Config(format!("payout destination: {}", e)))?;

        Ok(Self {
            network,
            payout_destination,
            min_funding_confirmations: DEFAULT_MIN_FUNDING_CONFIRMATIONS,
            soft_confirmation_timeout: DEFAULT_SOFT_CONFIRMATION_TIMEOUT,
        })
    }

    /// Sets the confirmation window
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the window is empty (`minimum > soft_timeout`).
    pub fn with_confirmation_window(mut self, minimum: u32, soft_timeout: u32) -> Result<Self> {
        if minimum > soft_timeout {
            return Err(Error::Config(format!(
                "minimum confirmations {} exceed soft timeout {}",
                minimum, soft_timeout
            )));
        }
        self.min_funding_confirmations = minimum;
        self.soft_confirmation_timeout = soft_timeout;
        Ok(self)
    }

    /// Gets the network every request must declare
    pub fn network(&self) -> Network { self.network }

    /// Gets the receiver's settlement address
    pub fn payout_destination(&self) -> &Address { &self.payout_destination }

    /// Gets the minimum funding depth
    pub fn min_funding_confirmations(&self) -> u32 { self.min_funding_confirmations }

    /// Gets the depth beyond which funding is stale
    pub fn soft_confirmation_timeout(&self) -> u32 { self.soft_confirmation_timeout }

    /// Checks a funding output's depth against the confirmation window
    ///
    /// Both bounds are inclusive.
    pub fn check_confirmations(
        &self,
        confirmations: u32,
    ) -> std::result::Result<(), ConfirmationPolicyError> {
        if confirmations < self.min_funding_confirmations {
            return Err(ConfirmationPolicyError::TooFew {
                confirmations,
                minimum: self.min_funding_confirmations,
            });
        }
        if confirmations > self.soft_confirmation_timeout {
            return Err(ConfirmationPolicyError::TooMany {
                confirmations,
                maximum: self.soft_confirmation_timeout,
            });
        }
        Ok(())
    }
}

/// Channel protocol parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Network channels are created on
    pub network: Network,
    /// CSV delay before the sender can reclaim the funding output
    pub refund_timeout: u16,
    /// Fee paid by the close transaction
    pub close_fee: u64,
    /// Outputs below this value are omitted from the close transaction
    pub dust_limit: u64,
}

impl ProtocolConfig {
    /// Creates a configuration with default timeout, fee and dust limit
    pub fn new(network: Network) -> Self {
        Self {
            network,
            refund_timeout: DEFAULT_REFUND_TIMEOUT_BLOCKS,
            close_fee: DEFAULT_CLOSE_FEE_SATS,
            dust_limit: DEFAULT_DUST_LIMIT_SATS,
        }
    }
}
