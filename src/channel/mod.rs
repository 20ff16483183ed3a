//! Channel module for unidirectional payment channels
//!
//! This module holds the data the receiver keeps per channel: the lifecycle
//! status, the shared protocol state, the cumulative payments hash and the
//! strictly-typed payment envelope.
//!
//! # Structure
//!
//! - `status`: Lifecycle stages (Created, Open, Closed)
//! - `shared_state`: Protocol state persisted per channel
//! - `payments_hash`: Cumulative digest over accepted payments
//! - `payment`: Payment envelope parsing

pub mod payment;
pub mod payments_hash;
pub mod shared_state;
pub mod status;

pub use payment::PaymentEnvelope;
pub use payments_hash::next_payments_hash;
pub use shared_state::{FundingOutput, SharedState};
pub use status::ChannelStatus;
