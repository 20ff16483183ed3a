//! Shared channel state
//!
//! This is the state both parties agree on. The orchestrator treats most of
//! it as opaque and only reads `status`, `balance`, `payments_hash` and
//! `block_height`; the remaining fields belong to the protocol engine.
//!
//! # Invariants
//!
//! - `balance` never decreases
//! - `status` only advances (see [`ChannelStatus::can_advance_to`])
//! - `block_height` is set exactly once, when the channel opens
//! - `funding` is present iff status is Open or Closed

use bitcoin::{Network, OutPoint, PublicKey, Txid};
use serde::{Deserialize, Serialize};

use super::status::ChannelStatus;
use crate::types::Bytes32;

/// The on-chain output that funds a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingOutput {
    /// Funding transaction ID
    pub txid: Txid,
    /// Output index within the funding transaction
    pub vout: u32,
    /// Output value in satoshis
    pub value: u64,
}

impl FundingOutput {
    /// Gets the funding outpoint
    pub fn outpoint(&self) -> OutPoint { OutPoint { txid: self.txid, vout: self.vout } }
}

/// Protocol state of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedState {
    /// Protocol version the channel was created with
    pub version: u32,
    /// Network the channel lives on
    pub network: Network,
    /// Lifecycle stage
    pub status: ChannelStatus,
    /// Sender's public key
    pub sender_pubkey: PublicKey,
    /// Receiver's public key, derived from the channel's key path
    pub receiver_pubkey: PublicKey,
    /// Receiver's settlement address, paid by the close transaction
    pub payout_address: String,
    /// CSV delay in blocks before the sender may reclaim the funding output
    pub refund_timeout: u16,
    /// Fee deducted from the funding value by the close transaction
    pub close_fee: u64,
    /// Funding output, set at open
    pub funding: Option<FundingOutput>,
    /// Height of the block containing the funding output, set at open
    pub block_height: Option<u64>,
    /// Amount paid to the receiver so far, in satoshis
    pub balance: u64,
    /// Number of accepted payments
    pub count: u64,
    /// Cumulative digest over all accepted payment envelopes
    pub payments_hash: Bytes32,
    /// Sender's signature over the close transaction paying `balance`
    pub sender_signature: Option<Vec<u8>>,
    /// Serialized close transaction, set at close
    pub close_tx: Option<Vec<u8>>,
}

impl SharedState {
    /// Creates the initial state of a channel
    ///
    /// Balance, count and payments hash start at zero.
    pub fn new(
        network: Network,
        sender_pubkey: PublicKey,
        receiver_pubkey: PublicKey,
        payout_address: String,
        refund_timeout: u16,
        close_fee: u64,
    ) -> Self {
        Self {
            version: crate::types::PROTOCOL_VERSION,
            network,
            status: ChannelStatus::Created,
            sender_pubkey,
            receiver_pubkey,
            payout_address,
            refund_timeout,
            close_fee,
            funding: None,
            block_height: None,
            balance: 0,
            count: 0,
            payments_hash: [0u8; 32],
            sender_signature: None,
            close_tx: None,
        }
    }

    /// Gets the amount the close transaction can pay out after the fee
    ///
    /// Zero before the channel is funded.
    pub fn spendable(&self) -> u64 {
        self.funding.map(|f| f.value.saturating_sub(self.close_fee)).unwrap_or(0)
    }

    /// Returns true if no further transitions are allowed
    pub fn is_closed(&self) -> bool { self.status == ChannelStatus::Closed }
}
