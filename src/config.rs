// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! # Runtime Configuration
//!
//! All configuration is loaded from the environment once at startup into a
//! [`Config`] record that is shared by reference; there are no ambient
//! globals. Fallback constants (prices, gas deposit) live here rather than
//! buried in call sites so that substitutions are visible and tunable.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for order storage | `/data` |
//! | `CHAIN_NETWORK` | Network preset (`mainnet` or `sepolia`) | `sepolia` |
//! | `CHAIN_RPC_URL` | RPC endpoint override | preset RPC |
//! | `GATEWAY_CONTRACT_ADDRESS` | Payment gateway contract | Required |
//! | `SWAP_ROUTER_ADDRESS` | AMM router contract | preset router |
//! | `WRAPPED_NATIVE_ADDRESS` | Wrapped native token (swap path hop 0) | preset WETH |
//! | `SETTLEMENT_TOKEN_ADDRESS` | Target token contract | Required |
//! | `SETTLEMENT_TOKEN_SYMBOL` | Target token symbol | `RMP` |
//! | `TOKEN_QUOTE_URL` | Token quoting endpoint | Required for quotes |
//! | `SERVICE_PRIVATE_KEY` | Hex service key (no 0x prefix) | Required for settlement |
//! | `GATEWAY_NAME` | Gateway label written on-chain | `rampline` |
//! | `ORDER_REF_PREFIX` | External order reference prefix | `rl-` |
//! | `MIDTRANS_SERVER_KEY` | Midtrans server key | Optional |
//! | `MIDTRANS_API_BASE_URL` | Midtrans Snap API base | sandbox |
//! | `TRANSAK_API_KEY` | Transak API key | Optional |
//! | `TRANSAK_WIDGET_BASE_URL` | Transak hosted widget base | staging |
//! | `FIAT_RATES_URL` | USD-based fiat rate table source | open.er-api.com |
//! | `ETH_USD_TICKER_URL` | Direct ETH/USD ticker source | Binance |
//! | `FALLBACK_ETH_USD_PRICE` | ETH/USD used when the ticker is down | `1810.75` |
//! | `FALLBACK_GAS_DEPOSIT_ETH` | Gas deposit used when the contract read fails | `0.00015` |
//! | `SLIPPAGE_TOLERANCE` | Swap slippage tolerance | `0.03` |
//! | `SETTLEMENT_WORKERS` | Concurrent settlement workers | `4` |
//! | `SETTLEMENT_QUEUE_DEPTH` | Pending settlement queue bound | `64` |
//! | `CHAIN_CALL_TIMEOUT_SECS` | Per-call chain deadline | `180` |
//! | `SWAP_DEADLINE_SECS` | Router-enforced swap deadline | `1200` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DATA_DIR: &str = "/data";
const DEFAULT_MIDTRANS_API_BASE_URL: &str = "https://app.sandbox.midtrans.com";
const DEFAULT_TRANSAK_WIDGET_BASE_URL: &str = "https://global-stg.transak.com";
const DEFAULT_FIAT_RATES_URL: &str = "https://open.er-api.com/v6/latest/USD";
const DEFAULT_ETH_USD_TICKER_URL: &str =
    "https://api.binance.com/api/v3/ticker/price?symbol=ETHUSDT";

/// Process-wide configuration record, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,

    pub chain_network: String,
    pub chain_rpc_url: Option<String>,
    pub gateway_contract_address: Option<String>,
    pub swap_router_address: Option<String>,
    pub wrapped_native_address: Option<String>,
    pub settlement_token_address: Option<String>,
    pub settlement_token_symbol: String,
    pub token_quote_url: Option<String>,
    pub service_private_key: Option<String>,
    pub gateway_name: String,
    pub order_ref_prefix: String,

    pub midtrans_server_key: Option<String>,
    pub midtrans_api_base_url: String,
    pub transak_api_key: Option<String>,
    pub transak_widget_base_url: String,

    pub fiat_rates_url: String,
    pub eth_usd_ticker_url: String,
    pub fallback_eth_usd_price: f64,
    pub fallback_gas_deposit_eth: f64,
    pub slippage_tolerance: f64,

    pub settlement_workers: usize,
    pub settlement_queue_depth: usize,
    pub chain_call_timeout: Duration,
    pub swap_deadline: Duration,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            host: env_or_default("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8080),
            data_dir: PathBuf::from(env_or_default("DATA_DIR", DEFAULT_DATA_DIR)),

            chain_network: env_or_default("CHAIN_NETWORK", "sepolia").to_ascii_lowercase(),
            chain_rpc_url: env_optional("CHAIN_RPC_URL"),
            gateway_contract_address: env_optional("GATEWAY_CONTRACT_ADDRESS"),
            swap_router_address: env_optional("SWAP_ROUTER_ADDRESS"),
            wrapped_native_address: env_optional("WRAPPED_NATIVE_ADDRESS"),
            settlement_token_address: env_optional("SETTLEMENT_TOKEN_ADDRESS"),
            settlement_token_symbol: env_or_default("SETTLEMENT_TOKEN_SYMBOL", "RMP"),
            token_quote_url: env_optional("TOKEN_QUOTE_URL"),
            service_private_key: env_optional("SERVICE_PRIVATE_KEY"),
            gateway_name: env_or_default("GATEWAY_NAME", "rampline"),
            order_ref_prefix: env_or_default("ORDER_REF_PREFIX", "rl-"),

            midtrans_server_key: env_optional("MIDTRANS_SERVER_KEY"),
            midtrans_api_base_url: env_or_default(
                "MIDTRANS_API_BASE_URL",
                DEFAULT_MIDTRANS_API_BASE_URL,
            ),
            transak_api_key: env_optional("TRANSAK_API_KEY"),
            transak_widget_base_url: env_or_default(
                "TRANSAK_WIDGET_BASE_URL",
                DEFAULT_TRANSAK_WIDGET_BASE_URL,
            ),

            fiat_rates_url: env_or_default("FIAT_RATES_URL", DEFAULT_FIAT_RATES_URL),
            eth_usd_ticker_url: env_or_default("ETH_USD_TICKER_URL", DEFAULT_ETH_USD_TICKER_URL),
            fallback_eth_usd_price: env_parse_or("FALLBACK_ETH_USD_PRICE", 1810.75),
            fallback_gas_deposit_eth: env_parse_or("FALLBACK_GAS_DEPOSIT_ETH", 0.000_15),
            slippage_tolerance: env_parse_or("SLIPPAGE_TOLERANCE", 0.03),

            settlement_workers: env_parse_or("SETTLEMENT_WORKERS", 4),
            settlement_queue_depth: env_parse_or("SETTLEMENT_QUEUE_DEPTH", 64),
            chain_call_timeout: Duration::from_secs(env_parse_or("CHAIN_CALL_TIMEOUT_SECS", 180)),
            swap_deadline: Duration::from_secs(env_parse_or("SWAP_DEADLINE_SECS", 1200)),
        }
    }
}

fn env_optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(_) => None,
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T: FromStr + Copy>(name: &str, default: T) -> T {
    env_optional(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_absent() {
        let config = Config::from_env();
        assert_eq!(config.settlement_token_symbol, "RMP");
        assert_eq!(config.order_ref_prefix, "rl-");
        assert_eq!(config.slippage_tolerance, 0.03);
        assert_eq!(config.settlement_workers, 4);
        assert_eq!(config.swap_deadline, Duration::from_secs(1200));
    }

    #[test]
    fn fallback_constants_reproduce_reference_quote() {
        let config = Config::from_env();
        // 100 tokens at 20_000 tokens/ETH with the default fallbacks lands on
        // the documented reference quote of roughly 9.60 USD.
        let eth = 100.0 / 20_000.0;
        let fiat = (eth + config.fallback_gas_deposit_eth) * config.fallback_eth_usd_price * 1.03;
        assert!((fiat - 9.60).abs() < 0.02, "got {fiat}");
    }
}
