//! Spilman-style unidirectional channel
//!
//! The sender locks funds in a 2-of-2 output with a CSV refund path. Each
//! payment is the sender's signature over a close transaction paying the
//! receiver the new cumulative balance. The receiver only ever needs the
//! latest signature: when closing it adds its own signature and broadcasts.
//!
//! # Invariants
//!
//! - The stored sender signature always covers the close transaction at the
//!   stored balance
//! - A payment signature commits to the post-payment balance, so replaying
//!   an accepted payment never verifies against the advanced state

use bitcoin::consensus::encode::serialize;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{All, Message, Secp256k1, SecretKey};
use bitcoin::{Address, Network, PublicKey, Transaction, Witness};
use tracing::debug;

use super::script::{self, FundingScript};
use super::tx::{build_close_transaction, close_sighash};
use super::ChannelProtocol;
use crate::channel::{
    next_payments_hash, ChannelStatus, FundingOutput, PaymentEnvelope, SharedState,
};
use crate::config::ProtocolConfig;
use crate::errors::{Error, ProtocolError, Result};
use crate::messages::{ChannelTerms, CloseResponse, CreateRequest, OpenResponse, SendResponse};

/// Reference [`ChannelProtocol`] implementation
pub struct SpilmanProtocol {
    config: ProtocolConfig,
    secp: Secp256k1<All>,
}

impl SpilmanProtocol {
    /// Creates an engine offering the terms in `config`
    pub fn new(config: ProtocolConfig) -> Self { Self { config, secp: Secp256k1::new() } }

    /// Signs a payment of `amount` on behalf of the sender
    ///
    /// This is the sender's half of the protocol. The returned DER signature
    /// goes into the payment envelope.
    ///
    /// # Errors
    /// * `ProtocolError::InvalidStatus` - channel is not open
    /// * `ProtocolError::ZeroPayment` - `amount` is zero
    /// * `ProtocolError::InsufficientCapacity` - the new balance exceeds spendable
    pub fn sign_payment(
        &self,
        sender_key: &SecretKey,
        state: &SharedState,
        amount: u64,
    ) -> Result<Vec<u8>> {
        require_status(state, ChannelStatus::Open)?;
        let balance = next_balance(state, amount)?;
        let (_, message) = self.close_message(state, balance)?;
        Ok(self.secp.sign_ecdsa(&message, sender_key).serialize_der().to_vec())
    }

    fn check_key(&self, key: &SecretKey, state: &SharedState) -> Result<()> {
        if PublicKey::new(key.public_key(&self.secp)) != state.receiver_pubkey {
            let reason = "key does not match channel".to_string();
            return Err(ProtocolError::InvalidState(reason).into());
        }
        Ok(())
    }

    fn close_message(&self, state: &SharedState, balance: u64) -> Result<(Transaction, Message)> {
        let funding = self.funding_script(state)?;
        let tx = build_close_transaction(state, balance, self.config.dust_limit)?;
        let value = state.funding.map(|f| f.value).unwrap_or(0);
        let message = close_sighash(&tx, &funding.witness_script, value)?;
        Ok((tx, message))
    }

    /// Verifies a payment and returns the balance it would produce
    fn check_payment(&self, state: &SharedState, payment: &PaymentEnvelope) -> Result<u64> {
        require_status(state, ChannelStatus::Open)?;
        let balance = next_balance(state, payment.amount())?;
        let (_, message) = self.close_message(state, balance)?;

        let signature =
            Signature::from_der(payment.signature()).map_err(|_| ProtocolError::InvalidPayment)?;
        self.secp
            .verify_ecdsa(&message, &signature, &state.sender_pubkey.inner)
            .map_err(|_| ProtocolError::InvalidPayment)?;
        Ok(balance)
    }
}

impl ChannelProtocol for SpilmanProtocol {
    fn network(&self) -> Network { self.config.network }

    fn create(
        &self,
        key: &SecretKey,
        payout: &Address,
        request: &CreateRequest,
    ) -> Result<(ChannelTerms, SharedState)> {
        let sender_pubkey = request.validate(self.config.network)?;
        let receiver_pubkey = PublicKey::new(key.public_key(&self.secp));

        let state = SharedState::new(
            self.config.network,
            sender_pubkey,
            receiver_pubkey,
            payout.to_string(),
            self.config.refund_timeout,
            self.config.close_fee,
        );
        let funding = self.funding_script(&state)?;

        let terms = ChannelTerms {
            receiver_pubkey: receiver_pubkey.to_string(),
            funding_address: funding.address.to_string(),
            payout_address: state.payout_address.clone(),
            refund_timeout: state.refund_timeout,
            close_fee: state.close_fee,
        };
        Ok((terms, state))
    }

    fn funding_script(&self, state: &SharedState) -> Result<FundingScript> {
        Ok(script::funding_script(
            &state.sender_pubkey,
            &state.receiver_pubkey,
            state.refund_timeout,
            state.network,
        ))
    }

    fn open(
        &self,
        key: &SecretKey,
        state: &SharedState,
        funding: &FundingOutput,
    ) -> Result<(OpenResponse, SharedState)> {
        self.check_key(key, state)?;
        require_status(state, ChannelStatus::Created)?;
        if funding.value <= state.close_fee {
            return Err(ProtocolError::FundingTooSmall {
                amount: funding.value,
                fee: state.close_fee,
            }
            .into());
        }

        let mut next = state.clone();
        next.status = ChannelStatus::Open;
        next.funding = Some(*funding);

        Ok((OpenResponse { capacity: next.spendable() }, next))
    }

    fn validate(
        &self,
        key: &SecretKey,
        state: &SharedState,
        payment: &PaymentEnvelope,
    ) -> Result<bool> {
        self.check_key(key, state)?;
        match self.check_payment(state, payment) {
            Ok(_) => Ok(true),
            Err(Error::Protocol(
                e @ (ProtocolError::InvalidPayment
                | ProtocolError::InsufficientCapacity { .. }
                | ProtocolError::Overflow),
            )) => {
                debug!(error = %e, "payment does not verify");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn send(
        &self,
        key: &SecretKey,
        state: &SharedState,
        payment: &PaymentEnvelope,
    ) -> Result<(SendResponse, SharedState)> {
        self.check_key(key, state)?;
        let balance = self.check_payment(state, payment)?;

        let mut next = state.clone();
        next.balance = balance;
        next.count = state.count.checked_add(1).ok_or(ProtocolError::Overflow)?;
        next.payments_hash = next_payments_hash(state.payments_hash, payment.raw());
        next.sender_signature = Some(payment.signature().to_vec());

        Ok((SendResponse { balance, payments_hash: next.payments_hash }, next))
    }

    fn close(&self, key: &SecretKey, state: &SharedState) -> Result<(CloseResponse, SharedState)> {
        self.check_key(key, state)?;
        require_status(state, ChannelStatus::Open)?;
        let sender_der = state.sender_signature.as_deref().ok_or(ProtocolError::NothingToClose)?;
        if state.balance < self.config.dust_limit {
            return Err(ProtocolError::DustBalance {
                balance: state.balance,
                dust_limit: self.config.dust_limit,
            }
            .into());
        }

        let funding = self.funding_script(state)?;
        let (mut tx, message) = self.close_message(state, state.balance)?;
        let sender_sig = Signature::from_der(sender_der)
            .map_err(|e| ProtocolError::InvalidState(format!("stored signature: {}", e)))?;
        let receiver_sig = self.secp.sign_ecdsa(&message, key);

        // Cooperative branch: <sender_sig> <receiver_sig> <true> <witness_script>
        let mut witness = Witness::new();
        witness.push(bitcoin::ecdsa::Signature::sighash_all(sender_sig).to_vec());
        witness.push(bitcoin::ecdsa::Signature::sighash_all(receiver_sig).to_vec());
        witness.push([1u8]);
        witness.push(funding.witness_script.as_bytes());
        tx.input[0].witness = witness;

        let close_tx = serialize(&tx);
        let mut next = state.clone();
        next.status = ChannelStatus::Closed;
        next.close_tx = Some(close_tx.clone());

        Ok((CloseResponse { close_tx }, next))
    }
}

fn require_status(state: &SharedState, expected: ChannelStatus) -> Result<()> {
    if state.status != expected {
        return Err(ProtocolError::InvalidStatus {
            expected: expected.to_string(),
            found: state.status.to_string(),
        }
        .into());
    }
    Ok(())
}

fn next_balance(state: &SharedState, amount: u64) -> Result<u64> {
    if amount == 0 {
        return Err(ProtocolError::ZeroPayment.into());
    }
    let balance = state.balance.checked_add(amount).ok_or(ProtocolError::Overflow)?;
    let spendable = state.spendable();
    if balance > spendable {
        return Err(ProtocolError::InsufficientCapacity { balance, spendable }.into());
    }
    Ok(balance)
}
