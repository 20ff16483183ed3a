//! Chain oracle
//!
//! The receiver never indexes the chain itself. It asks a node-backed
//! [`ChainOracle`] for unspent outputs and block heights, and hands it the
//! close transaction to broadcast.

use bitcoin::{Address, BlockHash, Transaction, Txid};

use crate::errors::{ChainError, Result};

/// An unspent output as reported by the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutInfo {
    /// Output value in satoshis
    pub value: u64,
    /// Depth of the containing block (1 = in the tip)
    pub confirmations: u32,
    /// Whether the output belongs to a coinbase transaction
    pub coinbase: bool,
    /// Addresses the output script resolves to
    pub addresses: Vec<String>,
    /// Hash of the block containing the transaction
    pub block_hash: BlockHash,
}

/// Source of chain facts and broadcast sink
pub trait ChainOracle: Send + Sync {
    /// Looks up an unspent output
    ///
    /// Returns `Ok(None)` if the output does not exist or is spent.
    fn get_tx_out(&self, txid: &Txid, vout: u32) -> Result<Option<TxOutInfo>>;

    /// Resolves the height of a block
    fn block_height(&self, block_hash: &BlockHash) -> Result<u64>;

    /// Submits a signed transaction to the network
    fn broadcast(&self, tx: &Transaction) -> Result<Txid>;
}

/// A funding output that passed the output checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOutput {
    /// Output value in satoshis
    pub value: u64,
    /// Depth of the containing block
    pub confirmations: u32,
    /// Hash of the containing block
    pub block_hash: BlockHash,
}

/// Looks up a prospective funding output and checks that it can fund a channel
///
/// # Errors
///
/// Returns an error if:
/// - The output is unknown or spent (`ChainError::OutputNotFound`)
/// - The output is a coinbase output (`ChainError::Coinbase`)
/// - The output resolves to zero or several addresses (`ChainError::WrongAddressCount`)
/// - The output pays anything but `expected` (`ChainError::AddressMismatch`)
pub fn resolve_funding_output(
    oracle: &dyn ChainOracle,
    txid: &Txid,
    vout: u32,
    expected: &Address,
) -> Result<ResolvedOutput> {
    let out = oracle
        .get_tx_out(txid, vout)?
        .ok_or_else(|| ChainError::OutputNotFound { txid: txid.to_string(), vout })?;

    if out.coinbase {
        return Err(ChainError::Coinbase.into());
    }
    if out.addresses.len() != 1 {
        return Err(ChainError::WrongAddressCount(out.addresses.len()).into());
    }
    let expected = expected.to_string();
    if out.addresses[0] != expected {
        return Err(
            ChainError::AddressMismatch { expected, found: out.addresses[0].clone() }.into()
        );
    }

    Ok(ResolvedOutput {
        value: out.value,
        confirmations: out.confirmations,
        block_hash: out.block_hash,
    })
}

#[cfg(test)]
mod tests {
    use bitcoin::address::NetworkUnchecked;
    use bitcoin::hashes::Hash;
    use bitcoin::Network;

    use super::*;
    use crate::errors::Error;
    use crate::test_utils::{FakeChain, PAYOUT_ADDRESS};

    fn expected() -> Address {
        PAYOUT_ADDRESS
            .parse::<Address<NetworkUnchecked>>()
            .unwrap()
            .require_network(Network::Regtest)
            .unwrap()
    }

    fn output(addresses: Vec<String>, coinbase: bool) -> TxOutInfo {
        TxOutInfo {
            value: 100_000,
            confirmations: 6,
            coinbase,
            addresses,
            block_hash: BlockHash::from_byte_array([9u8; 32]),
        }
    }

    #[test]
    fn test_resolve_funding_output() {
        let chain = FakeChain::new();
        let txid = Txid::from_byte_array([1u8; 32]);
        chain.insert_output(txid, 1, output(vec![PAYOUT_ADDRESS.to_string()], false));

        let resolved = resolve_funding_output(&chain, &txid, 1, &expected()).unwrap();
        assert_eq!(resolved.value, 100_000);
        assert_eq!(resolved.confirmations, 6);
        assert_eq!(resolved.block_hash, BlockHash::from_byte_array([9u8; 32]));
    }

    #[test]
    fn test_resolve_funding_output_rejections() {
        let chain = FakeChain::new();
        let txid = Txid::from_byte_array([1u8; 32]);

        // Missing
        let err = resolve_funding_output(&chain, &txid, 0, &expected()).unwrap_err();
        assert!(matches!(err, Error::Chain(ChainError::OutputNotFound { vout: 0, .. })));

        // Coinbase
        chain.insert_output(txid, 0, output(vec![PAYOUT_ADDRESS.to_string()], true));
        let err = resolve_funding_output(&chain, &txid, 0, &expected()).unwrap_err();
        assert_eq!(err, Error::Chain(ChainError::Coinbase));

        // No address
        chain.insert_output(txid, 0, output(vec![], false));
        let err = resolve_funding_output(&chain, &txid, 0, &expected()).unwrap_err();
        assert_eq!(err, Error::Chain(ChainError::WrongAddressCount(0)));

        // Bare multisig style output
        chain.insert_output(
            txid,
            0,
            output(vec![PAYOUT_ADDRESS.to_string(), "bcrt1qother".to_string()], false),
        );
        let err = resolve_funding_output(&chain, &txid, 0, &expected()).unwrap_err();
        assert_eq!(err, Error::Chain(ChainError::WrongAddressCount(2)));

        // Wrong address
        chain.insert_output(txid, 0, output(vec!["bcrt1qother".to_string()], false));
        let err = resolve_funding_output(&chain, &txid, 0, &expected()).unwrap_err();
        assert!(matches!(err, Error::Chain(ChainError::AddressMismatch { .. })));
    }
}
