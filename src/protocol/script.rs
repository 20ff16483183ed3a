//! Funding script construction
//!
//! The funding output is a P2WSH output with two spending paths:
//! 1. Cooperative close: receiver and sender both sign, no timelock
//! 2. Refund: sender signs alone after the CSV timeout
//!
//! ```text
//! OP_IF
//!     <receiver_pubkey> OP_CHECKSIGVERIFY
//! OP_ELSE
//!     <refund_timeout> OP_CSV OP_DROP
//! OP_ENDIF
//! <sender_pubkey> OP_CHECKSIG
//! ```

use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CHECKSIGVERIFY, OP_CSV, OP_DROP, OP_ELSE, OP_ENDIF, OP_IF,
};
use bitcoin::script::Builder;
use bitcoin::{Address, Network, PublicKey, ScriptBuf};

/// Witness script and address of a channel's funding output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingScript {
    /// The script committed to by the P2WSH output
    pub witness_script: ScriptBuf,
    /// The address the sender pays to fund the channel
    pub address: Address,
}

/// Builds the funding witness script
///
/// # Arguments
/// * `sender_pubkey` - Key that signs both paths
/// * `receiver_pubkey` - Key required on the cooperative path only
/// * `refund_timeout` - Relative timelock in blocks for the refund path
pub fn funding_witness_script(
    sender_pubkey: &PublicKey,
    receiver_pubkey: &PublicKey,
    refund_timeout: u16,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_IF)
        .push_key(receiver_pubkey)
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_opcode(OP_ELSE)
        .push_int(i64::from(refund_timeout))
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_opcode(OP_ENDIF)
        .push_key(sender_pubkey)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Builds the funding witness script and its P2WSH address
pub fn funding_script(
    sender_pubkey: &PublicKey,
    receiver_pubkey: &PublicKey,
    refund_timeout: u16,
    network: Network,
) -> FundingScript {
    let witness_script = funding_witness_script(sender_pubkey, receiver_pubkey, refund_timeout);
    let address = Address::p2wsh(&witness_script, network);
    FundingScript { witness_script, address }
}
