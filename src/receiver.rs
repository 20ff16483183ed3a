//! Channel receiver orchestrator
//!
//! [`Receiver`] drives the channel lifecycle on behalf of the payee. It owns
//! no state of its own: every request loads the channel record, derives the
//! channel key, lets the protocol engine compute the next state, and
//! persists that state with one compare-and-swap.
//!
//! # Invariants
//!
//! - Every persisted state comes from exactly one successful engine call
//! - A request that fails never leaves a partial mutation behind
//! - A CAS conflict is surfaced to the caller, never retried here
//! - No store lock is held across a chain oracle call

use std::str::FromStr;
use std::sync::Arc;

use bitcoin::consensus::encode::{deserialize, serialize_hex};
use bitcoin::secp256k1::SecretKey;
use bitcoin::{Transaction, Txid};
use tracing::{debug, error, info, warn};

use crate::chain::{resolve_funding_output, ChainOracle};
use crate::channel::{ChannelStatus, FundingOutput, PaymentEnvelope, SharedState};
use crate::config::ReceiverConfig;
use crate::directory::Directory;
use crate::errors::{Error, ProtocolError, Result, ValidationError};
use crate::keys::KeyTree;
use crate::messages::{
    CloseRequest, CloseResponse, CreateRequest, CreateResponse, OpenRequest, OpenResponse,
    SendRequest, SendResponse, StatusRequest, StatusResponse, ValidateRequest, ValidateResponse,
};
use crate::protocol::ChannelProtocol;
use crate::store::{ChannelRecord, ChannelStore};
use crate::types::ChannelId;

/// A channel record bound to its derived key
struct LoadedChannel {
    record: ChannelRecord,
    key: SecretKey,
}

impl LoadedChannel {
    fn state(&self) -> &SharedState { &self.record.shared_state }
}

/// Outcome of checking a payment against the engine and the directory
enum PaymentCheck {
    Valid(PaymentEnvelope),
    BadSignature,
    UnknownTarget(String),
}

/// Receiver-side channel orchestrator
pub struct Receiver {
    config: ReceiverConfig,
    keys: Arc<dyn KeyTree>,
    chain: Arc<dyn ChainOracle>,
    store: Arc<dyn ChannelStore>,
    directory: Arc<dyn Directory>,
    protocol: Arc<dyn ChannelProtocol>,
}

impl Receiver {
    /// Creates a receiver from its configuration and collaborators
    ///
    /// # Errors
    /// `Error::Config` if the protocol engine is set up for a different
    /// network than `config`.
    pub fn new(
        config: ReceiverConfig,
        keys: Arc<dyn KeyTree>,
        chain: Arc<dyn ChainOracle>,
        store: Arc<dyn ChannelStore>,
        directory: Arc<dyn Directory>,
        protocol: Arc<dyn ChannelProtocol>,
    ) -> Result<Self> {
        if protocol.network() != config.network() {
            return Err(Error::Config(format!(
                "protocol engine network {} does not match receiver network {}",
                protocol.network(),
                config.network()
            )));
        }
        Ok(Self { config, keys, chain, store, directory, protocol })
    }

    /// Gets the receiver configuration
    pub fn config(&self) -> &ReceiverConfig { &self.config }

    /// Creates a channel
    ///
    /// Reserves a fresh key path, derives the channel key, lets the engine
    /// pick the terms and stores the new record under a random ID.
    ///
    /// # Errors
    /// * `Error::Validation` - bad version, network or public key; nothing is reserved
    /// * `Error::Storage` - key paths exhausted, ID collision or I/O failure
    /// * `Error::KeyDerivation` - the key tree rejected the reserved path
    pub fn create(&self, request: &CreateRequest) -> Result<CreateResponse> {
        request.validate(self.config.network())?;

        let key_path = self.store.reserve_key_path()?;
        let key = self.keys.derive(key_path)?;
        let (terms, shared_state) =
            self.protocol.create(&key, self.config.payout_destination(), request)?;

        let id = ChannelId::generate();
        self.store.create(ChannelRecord { id, key_path, shared_state })?;

        info!(
            channel_id = %id,
            key_path,
            funding_address = %terms.funding_address,
            "channel created"
        );
        Ok(CreateResponse { id, terms })
    }

    /// Opens a channel against a confirmed funding output
    ///
    /// # Errors
    /// * `Error::NotFound` - unknown channel
    /// * `Error::Validation` - the txid does not parse
    /// * `Error::Protocol` - channel is not in the created state, or funding is too small
    /// * `Error::Chain` - output missing, coinbase, or not paying the funding address
    /// * `Error::ConfirmationPolicy` - funding depth outside the accepted window
    /// * `Error::Conflict` - the channel changed concurrently
    pub fn open(&self, request: &OpenRequest) -> Result<OpenResponse> {
        let channel = self.load(&request.id)?;
        let txid = Txid::from_str(&request.txid)
            .map_err(|e| ValidationError::InvalidTxid(e.to_string()))?;
        let state = channel.state();
        if state.status != ChannelStatus::Created {
            return Err(ProtocolError::InvalidStatus {
                expected: ChannelStatus::Created.to_string(),
                found: state.status.to_string(),
            }
            .into());
        }

        let funding_script = self.protocol.funding_script(state)?;
        let output = resolve_funding_output(
            self.chain.as_ref(),
            &txid,
            request.vout,
            &funding_script.address,
        )?;
        if let Err(e) = self.config.check_confirmations(output.confirmations) {
            debug!(
                channel_id = %request.id,
                confirmations = output.confirmations,
                "funding outside confirmation window"
            );
            return Err(e.into());
        }
        let block_height = self.chain.block_height(&output.block_hash)?;

        let funding = FundingOutput { txid, vout: request.vout, value: output.value };
        let (response, mut next) = self.protocol.open(&channel.key, state, &funding)?;
        next.block_height = Some(block_height);
        self.persist(&request.id, state, &next, None)?;

        info!(
            channel_id = %request.id,
            %txid,
            vout = request.vout,
            confirmations = output.confirmations,
            block_height,
            capacity = response.capacity,
            "channel opened"
        );
        Ok(response)
    }

    /// Checks whether a payment would be accepted, without applying it
    ///
    /// Bad signatures and unknown targets both yield `valid = false`.
    ///
    /// # Errors
    /// * `Error::NotFound` - unknown channel
    /// * `Error::Validation` - the envelope is malformed
    /// * `Error::Protocol` - the channel is not open
    pub fn validate(&self, request: &ValidateRequest) -> Result<ValidateResponse> {
        let channel = self.load(&request.id)?;
        let envelope = PaymentEnvelope::parse(&request.payment)?;

        let valid = match self.check_payment(&channel, envelope)? {
            PaymentCheck::Valid(_) => true,
            PaymentCheck::BadSignature => {
                debug!(channel_id = %request.id, "payment signature rejected");
                false
            }
            PaymentCheck::UnknownTarget(target) => {
                debug!(channel_id = %request.id, %target, "payment target unknown");
                false
            }
        };
        Ok(ValidateResponse { valid })
    }

    /// Applies a payment
    ///
    /// On success the balance grows by the payment amount and the raw
    /// envelope is appended to the channel's payment log in the same store
    /// update.
    ///
    /// # Errors
    /// * `Error::NotFound` - unknown channel
    /// * `Error::Validation` - the envelope is malformed
    /// * `Error::Protocol` - channel not open, or the payment does not verify
    /// * `Error::Authorization` - target is not in the directory
    /// * `Error::Conflict` - the channel changed concurrently
    pub fn send(&self, request: &SendRequest) -> Result<SendResponse> {
        let channel = self.load(&request.id)?;
        let envelope = PaymentEnvelope::parse(&request.payment)?;

        let envelope = match self.check_payment(&channel, envelope)? {
            PaymentCheck::Valid(envelope) => envelope,
            PaymentCheck::BadSignature => {
                warn!(channel_id = %request.id, "rejected payment with invalid signature");
                return Err(ProtocolError::InvalidPayment.into());
            }
            PaymentCheck::UnknownTarget(target) => {
                warn!(channel_id = %request.id, %target, "rejected payment to unknown target");
                return Err(Error::Authorization { target });
            }
        };

        let state = channel.state();
        let (response, next) = self.protocol.send(&channel.key, state, &envelope)?;
        self.persist(&request.id, state, &next, Some(envelope.raw()))?;

        info!(
            channel_id = %request.id,
            amount = envelope.amount(),
            balance = next.balance,
            count = next.count,
            "payment accepted"
        );
        Ok(response)
    }

    /// Closes a channel and broadcasts the close transaction
    ///
    /// The closed state is persisted before the broadcast. If the broadcast
    /// fails the channel stays closed and [`Receiver::rebroadcast`] can
    /// resubmit the stored transaction.
    ///
    /// # Errors
    /// * `Error::NotFound` - unknown channel
    /// * `Error::Protocol` - channel not open, no payments, or balance below dust
    /// * `Error::Conflict` - the channel changed concurrently
    /// * `Error::Broadcast` - the chain rejected the transaction after the close was persisted
    pub fn close(&self, request: &CloseRequest) -> Result<CloseResponse> {
        let channel = self.load(&request.id)?;
        let state = channel.state();

        let (response, next) = self.protocol.close(&channel.key, state)?;
        let tx = decode_close_tx(&response.close_tx)?;
        self.persist(&request.id, state, &next, None)?;
        info!(channel_id = %request.id, balance = next.balance, "channel closed");

        self.broadcast(&request.id, &tx)?;
        Ok(response)
    }

    /// Resubmits the stored close transaction of a closed channel
    ///
    /// Never mutates the store.
    pub fn rebroadcast(&self, id: &ChannelId) -> Result<Txid> {
        let record = self.store.get(id)?.ok_or(Error::NotFound(*id))?;
        let state = record.shared_state;
        if !state.is_closed() {
            return Err(ProtocolError::InvalidStatus {
                expected: ChannelStatus::Closed.to_string(),
                found: state.status.to_string(),
            }
            .into());
        }
        let raw = state.close_tx.ok_or_else(|| {
            ProtocolError::InvalidState("closed channel has no close transaction".to_string())
        })?;

        let tx = decode_close_tx(&raw)?;
        self.broadcast(id, &tx)
    }

    /// Gets a channel's status, balance and payments hash
    pub fn status(&self, request: &StatusRequest) -> Result<StatusResponse> {
        let record = self.store.get(&request.id)?.ok_or(Error::NotFound(request.id))?;
        let state = record.shared_state;
        Ok(StatusResponse {
            status: state.status,
            balance: state.balance,
            payments_hash: state.payments_hash,
        })
    }

    /// Gets a channel's full state, `None` if the channel is unknown
    pub fn get(&self, id: &ChannelId) -> Result<Option<SharedState>> {
        Ok(self.store.get(id)?.map(|record| record.shared_state))
    }

    /// Lists all channel records
    pub fn list(&self) -> Result<Vec<ChannelRecord>> { self.store.list() }

    /// Lists a channel's accepted payment envelopes in acceptance order
    pub fn list_payments(&self, id: &ChannelId) -> Result<Vec<Vec<u8>>> {
        if self.store.get(id)?.is_none() {
            return Err(Error::NotFound(*id));
        }
        self.store.list_payments(id)
    }

    fn load(&self, id: &ChannelId) -> Result<LoadedChannel> {
        let record = self.store.get(id)?.ok_or(Error::NotFound(*id))?;
        let key = self.keys.derive(record.key_path)?;
        Ok(LoadedChannel { record, key })
    }

    fn check_payment(
        &self,
        channel: &LoadedChannel,
        envelope: PaymentEnvelope,
    ) -> Result<PaymentCheck> {
        if !self.protocol.validate(&channel.key, channel.state(), &envelope)? {
            return Ok(PaymentCheck::BadSignature);
        }
        if !self.directory.has_target(envelope.target())? {
            return Ok(PaymentCheck::UnknownTarget(envelope.target().to_string()));
        }
        Ok(PaymentCheck::Valid(envelope))
    }

    fn persist(
        &self,
        id: &ChannelId,
        prior: &SharedState,
        next: &SharedState,
        payment: Option<&[u8]>,
    ) -> Result<()> {
        if !prior.status.can_advance_to(next.status) || next.balance < prior.balance {
            return Err(ProtocolError::InvalidState(format!(
                "transition {} -> {} regresses the channel",
                prior.status, next.status
            ))
            .into());
        }

        match self.store.update(id, prior, next, payment) {
            Err(e @ Error::Conflict(_)) => {
                warn!(channel_id = %id, "concurrent update rejected");
                Err(e)
            }
            other => other,
        }
    }

    fn broadcast(&self, id: &ChannelId, tx: &Transaction) -> Result<Txid> {
        info!(channel_id = %id, tx = %serialize_hex(tx), "broadcasting close transaction");
        match self.chain.broadcast(tx) {
            Ok(txid) => {
                info!(channel_id = %id, %txid, "close transaction broadcast");
                Ok(txid)
            }
            Err(e) => {
                error!(channel_id = %id, error = %e, "close transaction broadcast failed");
                Err(Error::Broadcast(e.to_string()))
            }
        }
    }
}

fn decode_close_tx(raw: &[u8]) -> Result<Transaction> {
    deserialize(raw)
        .map_err(|e| ProtocolError::InvalidState(format!("close transaction: {}", e)).into())
}
