#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Paychan Receiver
//!
//! Receiver-side lifecycle orchestrator for unidirectional Bitcoin payment
//! channels: create, open against a confirmed funding output, accept
//! payments, and close with a single broadcast.

// Chain oracle interface and funding output checks
pub mod chain;

// Channel state, lifecycle status and payment envelopes
pub mod channel;

// Receiver and protocol configuration
pub mod config;

// Payment target registry
pub mod directory;

// Error types
pub mod errors;

// Per-channel key derivation
pub mod keys;

// Request and response messages
pub mod messages;

// Channel protocol engine
pub mod protocol;

// Lifecycle orchestrator
pub mod receiver;

// Channel persistence
pub mod store;

// Identifiers and protocol constants
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types and functions
pub use chain::{ChainOracle, TxOutInfo};
pub use channel::{ChannelStatus, PaymentEnvelope, SharedState};
pub use config::{ProtocolConfig, ReceiverConfig};
pub use directory::{Directory, MemoryDirectory};
pub use errors::{Error, Result};
pub use keys::{Bip32KeyTree, KeyTree};
pub use protocol::{ChannelProtocol, SpilmanProtocol};
pub use receiver::Receiver;
pub use store::{ChannelRecord, ChannelStore, FileStore, MemoryStore};
pub use types::{ChannelId, KeyPath};
