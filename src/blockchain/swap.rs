// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! AMM swap executor.
//!
//! Converts native currency into the settlement token through a
//! Uniswap-V2-compatible router. The path is always the single hop
//! `[wrapped-native, token]`, and every submission carries a router-enforced
//! deadline of submission time plus the configured window (20 minutes by
//! default); a swap not mined by then is rejected by the router itself.

use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};

sol! {
    #[sol(rpc)]
    interface IUniswapV2Router {
        function swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline) external payable returns (uint256[] amounts);
        function getAmountsOut(uint256 amountIn, address[] path) external view returns (uint256[] amounts);
        function WETH() external pure returns (address);
    }
}

/// Errors raised by the swap executor.
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Swap reverted: {0}")]
    Reverted(String),

    #[error("Router returned no output amount")]
    EmptyRoute,

    #[error("Chain call exceeded the {0}s deadline")]
    Timeout(u64),
}

/// Router deadline for a swap submitted at `now_unix`.
pub fn deadline_from_unix(now_unix: u64, window: Duration) -> U256 {
    U256::from(now_unix.saturating_add(window.as_secs()))
}

/// Swap executor over a Uniswap-V2-compatible router.
pub struct SwapExecutor<P> {
    contract: IUniswapV2Router::IUniswapV2RouterInstance<P>,
    wrapped_native: Address,
    token: Address,
    swap_deadline: Duration,
    call_timeout: Duration,
}

impl<P: Provider + Clone> SwapExecutor<P> {
    /// Create a new executor for the given router and token pair.
    pub fn new(
        provider: &P,
        router_address: &str,
        wrapped_native_address: &str,
        token_address: &str,
        swap_deadline: Duration,
        call_timeout: Duration,
    ) -> Result<Self, SwapError> {
        let router = Address::from_str(router_address)
            .map_err(|e| SwapError::InvalidAddress(format!("router: {e}")))?;
        let wrapped_native = Address::from_str(wrapped_native_address)
            .map_err(|e| SwapError::InvalidAddress(format!("wrapped native: {e}")))?;
        let token = Address::from_str(token_address)
            .map_err(|e| SwapError::InvalidAddress(format!("token: {e}")))?;

        Ok(Self {
            contract: IUniswapV2Router::new(router, provider.clone()),
            wrapped_native,
            token,
            swap_deadline,
            call_timeout,
        })
    }

    /// The single-hop swap path `[wrapped-native, token]`.
    pub fn path(&self) -> Vec<Address> {
        vec![self.wrapped_native, self.token]
    }

    /// Token output the router currently quotes for `eth_wei` input.
    pub async fn expected_output(&self, eth_wei: U256) -> Result<U256, SwapError> {
        let amounts = tokio::time::timeout(
            self.call_timeout,
            self.contract.getAmountsOut(eth_wei, self.path()).call(),
        )
        .await
        .map_err(|_| SwapError::Timeout(self.call_timeout.as_secs()))?
        .map_err(|e| SwapError::Rpc(e.to_string()))?;

        amounts.last().copied().ok_or(SwapError::EmptyRoute)
    }

    /// Execute the swap, delivering at least `min_tokens_wei` to the buyer.
    ///
    /// Blocks until the transaction is mined; returns the transaction hash.
    pub async fn swap(
        &self,
        eth_wei: U256,
        min_tokens_wei: U256,
        destination_wallet: &str,
    ) -> Result<String, SwapError> {
        let destination = Address::from_str(destination_wallet)
            .map_err(|e| SwapError::InvalidAddress(e.to_string()))?;

        let now_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SwapError::Rpc(format!("system clock before epoch: {e}")))?
            .as_secs();
        let deadline = deadline_from_unix(now_unix, self.swap_deadline);

        let receipt = tokio::time::timeout(self.call_timeout, async {
            self.contract
                .swapExactETHForTokens(min_tokens_wei, self.path(), destination, deadline)
                .value(eth_wei)
                .send()
                .await
                .map_err(|e| SwapError::Rpc(e.to_string()))?
                .get_receipt()
                .await
                .map_err(|e| SwapError::Rpc(e.to_string()))
        })
        .await
        .map_err(|_| SwapError::Timeout(self.call_timeout.as_secs()))??;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        if !receipt.status() {
            return Err(SwapError::Reverted(format!(
                "swapExactETHForTokens reverted in {tx_hash}"
            )));
        }

        tracing::info!(
            tx_hash = %tx_hash,
            destination = %destination,
            "swap executed"
        );
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::providers::ProviderBuilder;

    const ROUTER: &str = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D";
    const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
    const TOKEN: &str = "0x5425890298aed601595a70AB815c96711a31Bc65";

    fn test_executor() -> SwapExecutor<impl Provider + Clone> {
        let provider = ProviderBuilder::new()
            .connect_http("http://localhost:8545".parse().unwrap());
        SwapExecutor::new(
            &provider,
            ROUTER,
            WETH,
            TOKEN,
            Duration::from_secs(1200),
            Duration::from_secs(180),
        )
        .expect("executor should build")
    }

    #[test]
    fn path_is_a_single_hop_from_wrapped_native() {
        let executor = test_executor();
        let path = executor.path();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0], Address::from_str(WETH).unwrap());
        assert_eq!(path[1], Address::from_str(TOKEN).unwrap());
    }

    #[test]
    fn deadline_is_submission_time_plus_window() {
        let deadline = deadline_from_unix(1_700_000_000, Duration::from_secs(1200));
        assert_eq!(deadline, U256::from(1_700_001_200u64));
    }

    #[test]
    fn invalid_addresses_are_rejected_up_front() {
        let provider = ProviderBuilder::new()
            .connect_http("http://localhost:8545".parse().unwrap());
        let result = SwapExecutor::new(
            &provider,
            "not-an-address",
            WETH,
            TOKEN,
            Duration::from_secs(1200),
            Duration::from_secs(180),
        );
        assert!(matches!(result, Err(SwapError::InvalidAddress(_))));
    }
}
