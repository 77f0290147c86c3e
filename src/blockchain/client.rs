// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! EVM chain client shared by the payment gateway adapter and swap executor.

use alloy::{
    network::{Ethereum, EthereumWallet},
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    signers::local::PrivateKeySigner,
};

use super::types::NetworkConfig;

/// HTTP provider type with all fillers but no signing capability.
pub type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// HTTP provider type that also signs and submits transactions.
pub type SignerProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
>;

/// Errors that can occur during blockchain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

/// Chain client holding the network configuration and a signing provider.
pub struct ChainClient {
    network: NetworkConfig,
    rpc_url: String,
    signer: PrivateKeySigner,
    provider: SignerProvider,
}

impl ChainClient {
    /// Create a client for the given network, RPC override, and service key.
    pub fn new(
        network: NetworkConfig,
        rpc_url_override: Option<&str>,
        private_key_hex: &str,
    ) -> Result<Self, ChainClientError> {
        let rpc_url = rpc_url_override.unwrap_or(network.rpc_url).to_string();
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainClientError::InvalidRpcUrl(e.to_string()))?;

        let signer = Self::create_signer(private_key_hex)?;
        let wallet = EthereumWallet::from(signer.clone());
        let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

        Ok(Self {
            network,
            rpc_url,
            signer,
            provider,
        })
    }

    /// Get the signing provider.
    pub fn provider(&self) -> &SignerProvider {
        &self.provider
    }

    /// Get the service signer.
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Get the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// The RPC endpoint in use.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the current block number (liveness probe).
    pub async fn block_number(&self) -> Result<u64, ChainClientError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainClientError::RpcError(e.to_string()))
    }

    /// Create a signer from a hex private key (64 characters, no 0x prefix).
    pub fn create_signer(private_key_hex: &str) -> Result<PrivateKeySigner, ChainClientError> {
        let key_bytes = alloy::hex::decode(private_key_hex.trim_start_matches("0x"))
            .map_err(|e| ChainClientError::InvalidPrivateKey(e.to_string()))?;

        PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|e| ChainClientError::InvalidPrivateKey(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known Anvil development key, never used against real funds.
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn create_signer_accepts_hex_with_and_without_prefix() {
        let plain = ChainClient::create_signer(TEST_KEY).expect("plain hex");
        let prefixed = ChainClient::create_signer(&format!("0x{TEST_KEY}")).expect("0x hex");
        assert_eq!(plain.address(), prefixed.address());
    }

    #[test]
    fn create_signer_rejects_garbage() {
        assert!(ChainClient::create_signer("not-a-key").is_err());
        assert!(ChainClient::create_signer("abcd").is_err());
    }

    #[test]
    fn client_builds_against_preset_network() {
        let client = ChainClient::new(crate::blockchain::types::ETH_SEPOLIA, None, TEST_KEY)
            .expect("client should build without contacting the RPC");
        assert_eq!(client.network().chain_id, 11155111);
        assert_eq!(client.rpc_url(), crate::blockchain::types::ETH_SEPOLIA.rpc_url);
    }
}
