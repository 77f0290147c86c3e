// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Blockchain types, network presets, and unit conversion.

use alloy::primitives::U256;

/// EVM network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Ethereum mainnet configuration.
pub const ETH_MAINNET: NetworkConfig = NetworkConfig {
    name: "Ethereum Mainnet",
    chain_id: 1,
    rpc_url: "https://eth.llamarpc.com",
    explorer_url: "https://etherscan.io",
};

/// Sepolia testnet configuration.
pub const ETH_SEPOLIA: NetworkConfig = NetworkConfig {
    name: "Sepolia Testnet",
    chain_id: 11155111,
    rpc_url: "https://ethereum-sepolia-rpc.publicnode.com",
    explorer_url: "https://sepolia.etherscan.io",
};

/// Resolve a network preset by its configuration name.
pub fn network_by_name(name: &str) -> Option<NetworkConfig> {
    match name.trim().to_ascii_lowercase().as_str() {
        "mainnet" | "ethereum" => Some(ETH_MAINNET),
        "sepolia" => Some(ETH_SEPOLIA),
        _ => None,
    }
}

/// Native and gateway token decimals.
pub const NATIVE_DECIMALS: u8 = 18;

/// Convert a decimal amount to the smallest unit.
///
/// Used at the chain boundary only; all quote math stays in plain decimals.
/// Truncation at the sub-wei level is acceptable for the amounts involved.
pub fn to_units(amount: f64, decimals: u8) -> U256 {
    if amount <= 0.0 {
        return U256::ZERO;
    }
    let scale = 10f64.powi(decimals as i32);
    U256::from((amount * scale) as u128)
}

/// Convert a decimal ETH amount to wei.
pub fn eth_to_wei(amount: f64) -> U256 {
    to_units(amount, NATIVE_DECIMALS)
}

/// Format a smallest-unit amount back to a human-readable decimal string.
pub fn format_units(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_to_wei_scales_by_eighteen_decimals() {
        assert_eq!(eth_to_wei(1.0), U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(eth_to_wei(0.005), U256::from(5_000_000_000_000_000u64));
        assert_eq!(eth_to_wei(0.0), U256::ZERO);
        assert_eq!(eth_to_wei(-1.0), U256::ZERO);
    }

    #[test]
    fn to_units_handles_token_decimals() {
        // 97 tokens at 18 decimals
        assert_eq!(
            to_units(97.0, 18),
            U256::from(97_000_000_000_000_000_000u128)
        );
        // 1.5 at 6 decimals
        assert_eq!(to_units(1.5, 6), U256::from(1_500_000u64));
    }

    #[test]
    fn format_units_round_trips() {
        let one_and_half = U256::from(1_500_000_000_000_000_000u64);
        assert_eq!(format_units(one_and_half, 18), "1.5");
        assert_eq!(format_units(U256::ZERO, 18), "0");
        assert_eq!(format_units(U256::from(1_000_000u64), 6), "1");
    }

    #[test]
    fn network_presets_resolve_by_name() {
        assert_eq!(network_by_name("sepolia").unwrap().chain_id, 11155111);
        assert_eq!(network_by_name("Mainnet").unwrap().chain_id, 1);
        assert!(network_by_name("base").is_none());
    }
}
