//! Error types for the channel receiver
//!
//! Every failure the orchestrator can surface maps to exactly one variant of
//! [`Error`]. Only [`Error::Conflict`] is retriable by the caller; all other
//! variants are terminal for the request that produced them.

use thiserror::Error;

use crate::types::ChannelId;

/// The main error type for the channel receiver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed or mismatched request fields
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No channel record exists for the ID
    #[error("Channel not found: {0}")]
    NotFound(ChannelId),

    /// The protocol engine rejected a transition
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Chain oracle lookup failed or returned an unusable output
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Funding output is outside the accepted confirmation window
    #[error(transparent)]
    ConfirmationPolicy(#[from] ConfirmationPolicyError),

    /// Payment target is not registered in the directory
    #[error("Payment target not authorized: {target}")]
    Authorization {
        /// The rejected target
        target: String,
    },

    /// The persisted state no longer matches the state the update was computed from
    #[error("Concurrent update conflict on channel {0}")]
    Conflict(ChannelId),

    /// Persistent store infrastructure failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The close transaction was rejected by the chain
    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    /// The key tree could not produce the child key
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Invalid receiver or protocol configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Returns true when the caller may re-read state, recompute and resubmit.
    pub fn is_retriable(&self) -> bool { matches!(self, Error::Conflict(_)) }
}

/// Errors raised by request validation, before any store mutation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// Requested protocol version is not the supported one
    #[error("Unsupported version: requested {requested}, supported {supported}")]
    UnsupportedVersion {
        /// Version named in the request
        requested: u32,
        /// Version this receiver speaks
        supported: u32,
    },

    /// Requested network is not the configured one
    #[error("Unsupported network: requested {requested}, configured {configured}")]
    UnsupportedNetwork {
        /// Network named in the request
        requested: String,
        /// Network this receiver is configured for
        configured: String,
    },

    /// Sender public key could not be parsed
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Payment envelope is malformed or missing required fields
    #[error("Invalid payment envelope: {0}")]
    InvalidEnvelope(String),

    /// Channel ID is not a 32-byte base64url token
    #[error("Invalid channel id: {0}")]
    InvalidChannelId(String),

    /// Funding transaction ID could not be parsed
    #[error("Invalid txid: {0}")]
    InvalidTxid(String),
}

/// Errors raised by the channel protocol engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The transition is not allowed from the channel's current status
    #[error("Invalid channel status: expected {expected}, found {found}")]
    InvalidStatus {
        /// Status the transition requires
        expected: String,
        /// Status the channel is in
        found: String,
    },

    /// Payment signature or amount did not verify against current state
    #[error("Invalid payment")]
    InvalidPayment,

    /// Payment amount must be positive
    #[error("Payment amount cannot be zero")]
    ZeroPayment,

    /// Balance would exceed what the funding output can pay after fees
    #[error("Insufficient capacity: balance {balance} exceeds spendable {spendable}")]
    InsufficientCapacity {
        /// Balance the payment would produce
        balance: u64,
        /// Funded value minus the close fee
        spendable: u64,
    },

    /// Funding output does not cover the close fee
    #[error("Funding amount {amount} does not cover close fee {fee}")]
    FundingTooSmall {
        /// Funded value in satoshis
        amount: u64,
        /// Required close fee in satoshis
        fee: u64,
    },

    /// Balance is too small to be paid out in a standard transaction
    #[error("Balance {balance} is below dust limit {dust_limit}")]
    DustBalance {
        /// Current balance
        balance: u64,
        /// Smallest standard output value
        dust_limit: u64,
    },

    /// Balance or counter overflow
    #[error("Arithmetic overflow")]
    Overflow,

    /// No payment has been received, so there is no sender signature to close with
    #[error("Nothing to close: no payments received")]
    NothingToClose,

    /// Channel state is internally inconsistent
    #[error("Invalid channel state: {0}")]
    InvalidState(String),
}

/// Errors raised while resolving chain facts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChainError {
    /// The output does not exist or is already spent
    #[error("Output not found: {txid}:{vout}")]
    OutputNotFound {
        /// Transaction ID
        txid: String,
        /// Output index
        vout: u32,
    },

    /// Coinbase outputs cannot fund a channel
    #[error("Cannot use coinbase output")]
    Coinbase,

    /// The output script must resolve to exactly one address
    #[error("Wrong number of addresses: {0}")]
    WrongAddressCount(usize),

    /// The output pays an address other than the channel's funding address
    #[error("Address mismatch: expected {expected}, found {found}")]
    AddressMismatch {
        /// Funding address derived from channel state
        expected: String,
        /// Address found on chain
        found: String,
    },

    /// The oracle itself failed
    #[error("Chain oracle error: {0}")]
    Oracle(String),
}

/// Errors raised by the funding confirmation window
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfirmationPolicyError {
    /// Funding has not settled deeply enough
    #[error("Too few confirmations: {confirmations} < {minimum}")]
    TooFew {
        /// Observed confirmations
        confirmations: u32,
        /// Required minimum
        minimum: u32,
    },

    /// Funding is older than the soft timeout
    #[error("Too many confirmations: {confirmations} > {maximum}")]
    TooMany {
        /// Observed confirmations
        confirmations: u32,
        /// Soft timeout
        maximum: u32,
    },
}

/// Errors raised by the persistent store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    /// A record with this ID already exists
    #[error("Channel id collision: {0}")]
    IdCollision(ChannelId),

    /// Every non-hardened key path has been issued
    #[error("Key paths exhausted")]
    KeyPathsExhausted,

    /// Underlying I/O failure
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Persisted data could not be encoded or decoded
    #[error("Storage encoding error: {0}")]
    Encoding(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
