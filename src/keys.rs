//! Key tree
//!
//! Each channel's private key is derived from a single root by integer
//! index. The orchestrator only ever asks for "the child key at this
//! index"; the derivation scheme lives behind [`KeyTree`].

use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::secp256k1::{All, Secp256k1, SecretKey};
use bitcoin::Network;

use crate::errors::{Error, Result};
use crate::types::KeyPath;

/// Deterministic private key source
pub trait KeyTree: Send + Sync {
    /// Derives the private key at `path`
    ///
    /// The same path always yields the same key.
    fn derive(&self, path: KeyPath) -> Result<SecretKey>;
}

/// BIP32 key tree deriving non-hardened children of one extended key
pub struct Bip32KeyTree {
    root: Xpriv,
    secp: Secp256k1<All>,
}

impl Bip32KeyTree {
    /// Creates a key tree rooted at `root`
    pub fn new(root: Xpriv) -> Self { Self { root, secp: Secp256k1::new() } }

    /// Creates a key tree from a master seed
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyDerivation` if the seed hashes to an invalid master key.
    pub fn from_seed(network: Network, seed: &[u8]) -> Result<Self> {
        let root =
            Xpriv::new_master(network, seed).map_err(|e| Error::KeyDerivation(e.to_string()))?;
        Ok(Self::new(root))
    }
}

impl KeyTree for Bip32KeyTree {
    fn derive(&self, path: KeyPath) -> Result<SecretKey> {
        let child =
            ChildNumber::from_normal_idx(path).map_err(|e| Error::KeyDerivation(e.to_string()))?;
        let derived = self
            .root
            .derive_priv(&self.secp, &[child])
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        Ok(derived.private_key)
    }
}
