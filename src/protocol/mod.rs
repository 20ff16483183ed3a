//! Channel protocol engine
//!
//! The engine owns the meaning of [`SharedState`]. Every operation is a pure
//! function of the channel key, the current state and the request: it
//! returns the response together with the next state and never touches the
//! store, the chain or the directory. The orchestrator persists whatever
//! state the engine returns.
//!
//! # Invariants
//!
//! - A returned state never has a lower balance or an earlier status than
//!   its input
//! - `validate` accepts exactly the payments `send` would accept

use bitcoin::secp256k1::SecretKey;
use bitcoin::{Address, Network};

use crate::channel::{FundingOutput, PaymentEnvelope, SharedState};
use crate::errors::Result;
use crate::messages::{ChannelTerms, CloseResponse, CreateRequest, OpenResponse, SendResponse};

pub mod script;
pub mod spilman;
pub mod tx;

pub use script::FundingScript;
pub use spilman::SpilmanProtocol;

/// A one-way payment channel protocol, seen from the receiver
pub trait ChannelProtocol: Send + Sync {
    /// Network the engine builds scripts and addresses for
    fn network(&self) -> Network;

    /// Agrees on channel terms and produces the initial state
    ///
    /// `key` is the receiver's freshly derived channel key; `payout` is
    /// where the close transaction will pay the receiver.
    fn create(
        &self,
        key: &SecretKey,
        payout: &Address,
        request: &CreateRequest,
    ) -> Result<(ChannelTerms, SharedState)>;

    /// Gets the script and address the channel must be funded to
    fn funding_script(&self, state: &SharedState) -> Result<FundingScript>;

    /// Moves a created channel to open once its funding output is known
    fn open(
        &self,
        key: &SecretKey,
        state: &SharedState,
        funding: &FundingOutput,
    ) -> Result<(OpenResponse, SharedState)>;

    /// Checks a payment's signature and amount against the current state
    ///
    /// Returns `Ok(false)` for payments that are well formed but would be
    /// rejected by [`ChannelProtocol::send`].
    fn validate(
        &self,
        key: &SecretKey,
        state: &SharedState,
        payment: &PaymentEnvelope,
    ) -> Result<bool>;

    /// Applies a payment
    fn send(
        &self,
        key: &SecretKey,
        state: &SharedState,
        payment: &PaymentEnvelope,
    ) -> Result<(SendResponse, SharedState)>;

    /// Produces the fully signed close transaction and the closed state
    fn close(&self, key: &SecretKey, state: &SharedState) -> Result<(CloseResponse, SharedState)>;
}
