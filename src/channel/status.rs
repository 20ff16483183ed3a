//! Channel lifecycle status
//!
//! The lifecycle is a strictly forward state machine:
//! - Created → Open (via open, once funding is observed on chain)
//! - Open → Open (via send, balance advances in place)
//! - Open → Closed (via close)
//!
//! Closed is terminal. A status never moves backwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle stage of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    /// Channel terms agreed, funding not yet observed
    Created,
    /// Funding confirmed, payments can be accepted
    Open,
    /// Close transaction produced, no further transitions allowed
    Closed,
}

impl ChannelStatus {
    /// Returns true if moving from `self` to `next` keeps the lifecycle monotonic
    ///
    /// Open → Open is the only self-transition, used by payments.
    pub fn can_advance_to(self, next: ChannelStatus) -> bool {
        match (self, next) {
            (ChannelStatus::Open, ChannelStatus::Open) => true,
            (from, to) => to > from,
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelStatus::Created => "created",
            ChannelStatus::Open => "open",
            ChannelStatus::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_advance_to() {
        assert!(ChannelStatus::Created.can_advance_to(ChannelStatus::Open));
        assert!(ChannelStatus::Created.can_advance_to(ChannelStatus::Closed));
        assert!(ChannelStatus::Open.can_advance_to(ChannelStatus::Open));
        assert!(ChannelStatus::Open.can_advance_to(ChannelStatus::Closed));

        assert!(!ChannelStatus::Created.can_advance_to(ChannelStatus::Created));
        assert!(!ChannelStatus::Open.can_advance_to(ChannelStatus::Created));
        assert!(!ChannelStatus::Closed.can_advance_to(ChannelStatus::Open));
        assert!(!ChannelStatus::Closed.can_advance_to(ChannelStatus::Closed));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&ChannelStatus::Open).unwrap(), "\"open\"");
        let parsed: ChannelStatus = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(parsed, ChannelStatus::Closed);
        assert_eq!(ChannelStatus::Closed.to_string(), "closed");
    }
}
