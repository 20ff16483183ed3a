//! Request and response messages
//!
//! These are the structures exchanged with the sender. All of them are
//! serde-serializable so a transport can carry them as JSON.

use std::str::FromStr;

use bitcoin::{Network, PublicKey};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelStatus;
use crate::errors::ValidationError;
use crate::types::{Bytes32, ChannelId, PROTOCOL_VERSION};

/// Request to create a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Hex-encoded SEC1 public key of the sender
    pub sender_pubkey: String,
    /// Network the sender intends to fund on
    pub network: String,
    /// Protocol version the sender speaks
    pub version: u32,
}

impl CreateRequest {
    /// Checks version, network and public key against what this receiver speaks
    ///
    /// # Returns
    /// The parsed sender public key
    ///
    /// # Errors
    /// * `ValidationError::UnsupportedVersion` - version is not [`PROTOCOL_VERSION`]
    /// * `ValidationError::UnsupportedNetwork` - network does not parse or differs from `network`
    /// * `ValidationError::InvalidPublicKey` - key is not a compressed SEC1 public key
    pub fn validate(&self, network: Network) -> Result<PublicKey, ValidationError> {
        if self.version != PROTOCOL_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                requested: self.version,
                supported: PROTOCOL_VERSION,
            });
        }

        let unsupported = || ValidationError::UnsupportedNetwork {
            requested: self.network.clone(),
            configured: network.to_string(),
        };
        let requested = Network::from_str(&self.network).map_err(|_| unsupported())?;
        if requested != network {
            return Err(unsupported());
        }

        let pubkey = PublicKey::from_str(&self.sender_pubkey)
            .map_err(|e| ValidationError::InvalidPublicKey(e.to_string()))?;
        if !pubkey.compressed {
            return Err(ValidationError::InvalidPublicKey("uncompressed key".to_string()));
        }
        Ok(pubkey)
    }
}

/// Channel terms chosen by the receiver at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTerms {
    /// Hex-encoded receiver public key for this channel
    pub receiver_pubkey: String,
    /// Address the sender must pay to fund the channel
    pub funding_address: String,
    /// Receiver's settlement address
    pub payout_address: String,
    /// CSV delay before the sender can reclaim the funding output
    pub refund_timeout: u16,
    /// Fee the close transaction pays
    pub close_fee: u64,
}

/// Response to a create request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResponse {
    /// Assigned channel ID
    pub id: ChannelId,
    /// Channel terms
    #[serde(flatten)]
    pub terms: ChannelTerms,
}

/// Request to open a channel once its funding transaction has confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRequest {
    /// Channel ID
    pub id: ChannelId,
    /// Hex funding transaction ID
    pub txid: String,
    /// Funding output index
    pub vout: u32,
}

/// Response to an open request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenResponse {
    /// Maximum balance the channel can reach, in satoshis
    pub capacity: u64,
}

/// Request to check a payment without applying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRequest {
    /// Channel ID
    pub id: ChannelId,
    /// Raw payment envelope
    pub payment: Vec<u8>,
}

/// Response to a validate request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// Whether the payment would be accepted
    pub valid: bool,
}

/// Request to apply a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    /// Channel ID
    pub id: ChannelId,
    /// Raw payment envelope
    pub payment: Vec<u8>,
}

/// Response to a send request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    /// Balance after the payment
    pub balance: u64,
    /// Payments hash after the payment
    pub payments_hash: Bytes32,
}

/// Request to close a channel cooperatively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequest {
    /// Channel ID
    pub id: ChannelId,
}

/// Response to a close request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResponse {
    /// Consensus-serialized close transaction
    pub close_tx: Vec<u8>,
}

/// Request for a channel's status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest {
    /// Channel ID
    pub id: ChannelId,
}

/// Response to a status request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Lifecycle stage
    pub status: ChannelStatus,
    /// Current balance
    pub balance: u64,
    /// Current payments hash
    pub payments_hash: Bytes32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sender_secret, to_public};

    fn request() -> CreateRequest {
        CreateRequest {
            sender_pubkey: to_public(&sender_secret()).to_string(),
            network: "regtest".to_string(),
            version: PROTOCOL_VERSION,
        }
    }

    #[test]
    fn test_create_request_validate() {
        let pubkey = request().validate(Network::Regtest).unwrap();
        assert_eq!(pubkey, to_public(&sender_secret()));
    }

    #[test]
    fn test_create_request_validate_rejections() {
        let mut req = request();
        req.version = 1;
        assert_eq!(
            req.validate(Network::Regtest),
            Err(ValidationError::UnsupportedVersion { requested: 1, supported: PROTOCOL_VERSION })
        );

        let mut req = request();
        req.network = "bitcoin".to_string();
        assert!(matches!(
            req.validate(Network::Regtest),
            Err(ValidationError::UnsupportedNetwork { .. })
        ));

        let mut req = request();
        req.network = "moonnet".to_string();
        assert!(matches!(
            req.validate(Network::Regtest),
            Err(ValidationError::UnsupportedNetwork { .. })
        ));

        let mut req = request();
        req.sender_pubkey = "02zz".to_string();
        assert!(matches!(
            req.validate(Network::Regtest),
            Err(ValidationError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_create_response_flattens_terms() {
        let resp = CreateResponse {
            id: ChannelId::from_bytes([3u8; 32]),
            terms: ChannelTerms {
                receiver_pubkey: "02aa".to_string(),
                funding_address: "bcrt1qfunding".to_string(),
                payout_address: "bcrt1qpayout".to_string(),
                refund_timeout: 1008,
                close_fee: 1000,
            },
        };

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["id"], serde_json::Value::String(resp.id.to_string()));
        assert_eq!(json["refund_timeout"], 1008);
        assert_eq!(json["funding_address"], "bcrt1qfunding");

        let back: CreateResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, resp);
    }
}
