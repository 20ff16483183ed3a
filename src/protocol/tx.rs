//! Close transaction builder
//!
//! The close transaction spends the funding output along the cooperative
//! path. It pays the receiver's balance to the payout address and returns
//! the remainder, minus the close fee, to the sender. A sender change
//! output below the dust limit is dropped and its value goes to fees.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::Message;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, CompressedPublicKey, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Witness,
};

use crate::channel::SharedState;
use crate::errors::{ProtocolError, Result};

/// Builds the unsigned close transaction paying `balance` to the receiver
///
/// # Arguments
/// * `state` - Funded channel state
/// * `balance` - Receiver output value in satoshis
/// * `dust_limit` - Sender change below this value is omitted
///
/// # Errors
/// * `ProtocolError::InvalidState` - channel is unfunded or holds an unusable address or key
/// * `ProtocolError::InsufficientCapacity` - `balance` exceeds the spendable amount
pub fn build_close_transaction(
    state: &SharedState,
    balance: u64,
    dust_limit: u64,
) -> Result<Transaction> {
    let funding = state
        .funding
        .ok_or_else(|| ProtocolError::InvalidState("channel is not funded".to_string()))?;

    let spendable = state.spendable();
    if balance > spendable {
        return Err(ProtocolError::InsufficientCapacity { balance, spendable }.into());
    }

    let input = TxIn {
        previous_output: funding.outpoint(),
        script_sig: ScriptBuf::new(), // Empty for SegWit
        sequence: Sequence::MAX,      // Cooperative path, no CSV
        witness: Witness::new(),
    };

    let receiver_output =
        TxOut { value: Amount::from_sat(balance), script_pubkey: payout_script(state)? };
    let mut output = vec![receiver_output];

    let change = spendable - balance;
    if change >= dust_limit {
        let sender_output =
            TxOut { value: Amount::from_sat(change), script_pubkey: sender_script(state)? };
        output.push(sender_output);
    }

    Ok(Transaction { version: Version::TWO, lock_time: LockTime::ZERO, input: vec![input], output })
}

/// Computes the message both parties sign for the cooperative path
pub fn close_sighash(
    tx: &Transaction,
    witness_script: &Script,
    funding_value: u64,
) -> Result<Message> {
    let sighash = SighashCache::new(tx)
        .p2wsh_signature_hash(
            0,
            witness_script,
            Amount::from_sat(funding_value),
            EcdsaSighashType::All,
        )
        .map_err(|e| ProtocolError::InvalidState(e.to_string()))?;
    Ok(Message::from_digest(sighash.to_byte_array()))
}

fn payout_script(state: &SharedState) -> Result<ScriptBuf> {
    let address = Address::<NetworkUnchecked>::from_str(&state.payout_address)
        .map_err(|e| ProtocolError::InvalidState(format!("payout address: {}", e)))?
        .require_network(state.network)
        .map_err(|e| ProtocolError::InvalidState(format!("payout address: {}", e)))?;
    Ok(address.script_pubkey())
}

fn sender_script(state: &SharedState) -> Result<ScriptBuf> {
    let key = CompressedPublicKey::try_from(state.sender_pubkey)
        .map_err(|e| ProtocolError::InvalidState(format!("sender key: {}", e)))?;
    Ok(ScriptBuf::new_p2wpkh(&key.wpubkey_hash()))
}
