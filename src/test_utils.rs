//! Shared test utilities
//!
//! Deterministic keys, canned channel states, an in-process chain oracle
//! and a fully wired [`Receiver`] for module tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{Address, BlockHash, Network, PublicKey, Transaction, Txid};

use crate::chain::{ChainOracle, TxOutInfo};
use crate::channel::{ChannelStatus, FundingOutput, PaymentEnvelope, SharedState};
use crate::config::{ProtocolConfig, ReceiverConfig};
use crate::directory::MemoryDirectory;
use crate::errors::{ChainError, Result};
use crate::keys::Bip32KeyTree;
use crate::messages::{CreateRequest, OpenRequest};
use crate::protocol::{ChannelProtocol, SpilmanProtocol};
use crate::receiver::Receiver;
use crate::store::{ChannelStore, MemoryStore};
use crate::types::{ChannelId, PROTOCOL_VERSION};

/// Regtest P2WPKH address used as the receiver's payout destination
pub const PAYOUT_ADDRESS: &str = "bcrt1qw508d6qejxtdg4y5r3zarvary0c5xw7kygt080";

/// Target registered in [`TestReceiver`]'s directory
pub const TARGET: &str = "merchant-1";

/// Deterministically derive a secret key from a single byte (tests only)
fn deterministic_secret(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).expect("32-byte array should always be a valid SecretKey")
}

/// Sender's channel key
pub fn sender_secret() -> SecretKey { deterministic_secret(1) }

/// Receiver's channel key
pub fn receiver_secret() -> SecretKey { deterministic_secret(2) }

/// Compressed public key of `secret`
pub fn to_public(secret: &SecretKey) -> PublicKey {
    PublicKey::new(secret.public_key(&Secp256k1::signing_only()))
}

/// [`PAYOUT_ADDRESS`] checked for regtest
pub fn payout_address() -> Address {
    PAYOUT_ADDRESS
        .parse::<Address<NetworkUnchecked>>()
        .expect("valid address")
        .require_network(Network::Regtest)
        .expect("regtest address")
}

/// Create request the default configuration accepts
pub fn create_request() -> CreateRequest {
    CreateRequest {
        sender_pubkey: to_public(&sender_secret()).to_string(),
        network: "regtest".to_string(),
        version: PROTOCOL_VERSION,
    }
}

/// Freshly created channel between the test keys, default terms
pub fn created_state() -> SharedState {
    SharedState::new(
        Network::Regtest,
        to_public(&sender_secret()),
        to_public(&receiver_secret()),
        PAYOUT_ADDRESS.to_string(),
        1008,
        1000,
    )
}

/// Open channel funded with `value` satoshis
pub fn funded_state(value: u64) -> SharedState {
    let mut state = created_state();
    state.status = ChannelStatus::Open;
    state.funding = Some(FundingOutput { txid: Txid::from_byte_array([1u8; 32]), vout: 0, value });
    state.block_height = Some(100);
    state
}

/// Payment of `amount` to `target`, signed by the sender against `state`
pub fn payment(
    protocol: &SpilmanProtocol,
    state: &SharedState,
    target: &str,
    amount: u64,
) -> PaymentEnvelope {
    let signature =
        protocol.sign_payment(&sender_secret(), state, amount).expect("payment within capacity");
    PaymentEnvelope::new(target, amount, signature)
}

/// In-process chain oracle
#[derive(Default)]
pub struct FakeChain {
    outputs: Mutex<HashMap<(Txid, u32), TxOutInfo>>,
    heights: Mutex<HashMap<BlockHash, u64>>,
    broadcasts: Mutex<Vec<Transaction>>,
    fail_broadcasts: AtomicBool,
}

impl FakeChain {
    /// Creates an empty chain
    pub fn new() -> Self { Self::default() }

    /// Adds or replaces an unspent output
    pub fn insert_output(&self, txid: Txid, vout: u32, info: TxOutInfo) {
        self.outputs.lock().unwrap().insert((txid, vout), info);
    }

    /// Records the height of a block
    pub fn set_block_height(&self, block_hash: BlockHash, height: u64) {
        self.heights.lock().unwrap().insert(block_hash, height);
    }

    /// Gets every transaction broadcast so far
    pub fn broadcasts(&self) -> Vec<Transaction> { self.broadcasts.lock().unwrap().clone() }

    /// Makes subsequent broadcasts fail or succeed
    pub fn fail_broadcasts(&self, fail: bool) { self.fail_broadcasts.store(fail, Ordering::SeqCst) }
}

impl ChainOracle for FakeChain {
    fn get_tx_out(&self, txid: &Txid, vout: u32) -> Result<Option<TxOutInfo>> {
        Ok(self.outputs.lock().unwrap().get(&(*txid, vout)).cloned())
    }

    fn block_height(&self, block_hash: &BlockHash) -> Result<u64> {
        self.heights
            .lock()
            .unwrap()
            .get(block_hash)
            .copied()
            .ok_or_else(|| ChainError::Oracle(format!("unknown block {}", block_hash)).into())
    }

    fn broadcast(&self, tx: &Transaction) -> Result<Txid> {
        if self.fail_broadcasts.load(Ordering::SeqCst) {
            return Err(ChainError::Oracle("transaction rejected".to_string()).into());
        }
        self.broadcasts.lock().unwrap().push(tx.clone());
        Ok(tx.compute_txid())
    }
}

/// A [`Receiver`] wired to in-memory collaborators, with handles to each
pub struct TestReceiver {
    /// The receiver under test
    pub receiver: Receiver,
    /// Chain oracle the receiver reads and broadcasts to
    pub chain: Arc<FakeChain>,
    /// Store backing the receiver
    pub store: Arc<MemoryStore>,
    /// Protocol engine, also used to sign payments as the sender
    pub protocol: Arc<SpilmanProtocol>,
    /// Directory holding [`TARGET`]
    pub directory: Arc<MemoryDirectory>,
    funding_counter: AtomicU32,
}

impl TestReceiver {
    /// Height of the block every funding output confirms in
    pub const FUNDING_HEIGHT: u64 = 800;

    const FUNDING_BLOCK: [u8; 32] = [9u8; 32];

    /// Creates a regtest receiver with default terms and confirmation window
    pub fn new() -> Self {
        let config = ReceiverConfig::new(Network::Regtest, PAYOUT_ADDRESS).unwrap();
        let keys = Arc::new(Bip32KeyTree::from_seed(Network::Regtest, &[7u8; 32]).unwrap());
        let chain = Arc::new(FakeChain::new());
        let funding_block = BlockHash::from_byte_array(Self::FUNDING_BLOCK);
        chain.set_block_height(funding_block, Self::FUNDING_HEIGHT);
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(MemoryDirectory::with_targets([TARGET]));
        let protocol = Arc::new(SpilmanProtocol::new(ProtocolConfig::new(Network::Regtest)));

        let receiver = Receiver::new(
            config,
            keys,
            chain.clone(),
            store.clone(),
            directory.clone(),
            protocol.clone(),
        )
        .unwrap();
        Self { receiver, chain, store, protocol, directory, funding_counter: AtomicU32::new(0) }
    }

    fn state(&self, id: &ChannelId) -> SharedState {
        self.store.get(id).unwrap().expect("channel exists").shared_state
    }

    /// Creates a channel with the default request
    pub fn create_channel(&self) -> ChannelId {
        self.receiver.create(&create_request()).unwrap().id
    }

    /// Puts a fresh output paying the channel's funding address on chain
    ///
    /// Returns the open request pointing at it.
    pub fn fund(&self, id: &ChannelId, value: u64, confirmations: u32) -> OpenRequest {
        let address = self.protocol.funding_script(&self.state(id)).unwrap().address;
        let n = self.funding_counter.fetch_add(1, Ordering::SeqCst);
        let mut bytes = [0x5au8; 32];
        bytes[..4].copy_from_slice(&n.to_le_bytes());
        let txid = Txid::from_byte_array(bytes);

        self.chain.insert_output(
            txid,
            0,
            TxOutInfo {
                value,
                confirmations,
                coinbase: false,
                addresses: vec![address.to_string()],
                block_hash: BlockHash::from_byte_array(Self::FUNDING_BLOCK),
            },
        );
        OpenRequest { id: *id, txid: txid.to_string(), vout: 0 }
    }

    /// Creates and opens a channel funded with `value` satoshis
    pub fn open_channel(&self, value: u64) -> ChannelId {
        let id = self.create_channel();
        self.receiver.open(&self.fund(&id, value, 6)).unwrap();
        id
    }

    /// Raw envelope for a sender-signed payment against the channel's current state
    pub fn payment(&self, id: &ChannelId, target: &str, amount: u64) -> Vec<u8> {
        payment(&self.protocol, &self.state(id), target, amount).raw().to_vec()
    }
}
