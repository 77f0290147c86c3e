// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Quote engine.
//!
//! Converts between fiat, ETH, and token amounts. All math here is plain
//! decimal; wei conversion happens only once a settlement touches the chain.
//! Price sources degrade to configured fallbacks so a quote is always
//! produced; only the token's own quoting endpoint is a hard dependency.

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::blockchain::{format_units, PaymentGateway, SignerProvider};
use crate::config::Config;

use super::rates::{self, RateCache};

/// Which side of the conversion the caller pinned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuoteSide {
    /// Buyer asked for this many tokens.
    TokenAmount(f64),
    /// Buyer wants to spend this much fiat.
    FiatAmount(f64),
}

/// Reference prices gathered for one quote.
#[derive(Debug, Clone, Copy)]
pub struct QuotePrices {
    /// USD per 1 ETH.
    pub eth_usd: f64,
    /// Fiat units per 1 USD.
    pub usd_to_fiat: f64,
    /// Tokens returned for exactly 1 ETH.
    pub tokens_per_eth: f64,
    /// Contract gas deposit, in ETH.
    pub gas_deposit_eth: f64,
}

/// A computed quote.
#[derive(Debug, Clone)]
pub struct Quote {
    pub fiat_currency: String,
    /// Fiat amount including the slippage buffer, rounded per currency.
    pub fiat_amount: f64,
    pub eth_amount: f64,
    pub token_amount: f64,
    /// `token_amount * (1 - slippage_tolerance)`.
    pub min_token_amount: f64,
    pub gas_fee_eth: f64,
    pub gas_fee_fiat: f64,
    /// Reference ETH price in USD.
    pub eth_usd_price: f64,
    /// Reference ETH price in the quote currency.
    pub eth_fiat_price: f64,
}

/// Errors raised while computing a quote.
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Amount must be positive")]
    NonPositiveAmount,

    #[error("Amount does not cover the gas deposit")]
    AmountTooSmall,

    #[error("Token quote source failed: {0}")]
    TokenQuote(String),
}

/// Round a fiat amount per currency convention: IDR to whole units,
/// everything else to 2 decimals.
pub fn round_fiat(amount: f64, currency: &str) -> f64 {
    if currency.eq_ignore_ascii_case("IDR") {
        amount.round()
    } else {
        (amount * 100.0).round() / 100.0
    }
}

/// Parse the quoting endpoint's 18-decimal fixed-point integer string.
pub fn parse_raw_quote(raw: &str) -> Option<f64> {
    let units: u128 = raw.trim().parse().ok()?;
    Some(units as f64 / 1e18)
}

/// Pure quote computation from gathered prices.
pub fn compute_quote(
    side: QuoteSide,
    currency: &str,
    prices: &QuotePrices,
    slippage_tolerance: f64,
) -> Result<Quote, QuoteError> {
    let amount = match side {
        QuoteSide::TokenAmount(a) | QuoteSide::FiatAmount(a) => a,
    };
    if amount <= 0.0 || !amount.is_finite() {
        return Err(QuoteError::NonPositiveAmount);
    }
    if prices.tokens_per_eth <= 0.0 {
        return Err(QuoteError::TokenQuote("zero token rate".to_string()));
    }

    let eth_fiat = prices.eth_usd * prices.usd_to_fiat;
    let buffer = 1.0 + slippage_tolerance;

    let (token_amount, eth_amount, fiat_amount) = match side {
        QuoteSide::TokenAmount(tokens) => {
            let eth = tokens / prices.tokens_per_eth;
            let gross_fiat = (eth + prices.gas_deposit_eth) * eth_fiat;
            (tokens, eth, round_fiat(gross_fiat * buffer, currency))
        }
        QuoteSide::FiatAmount(fiat) => {
            let eth = fiat / buffer / eth_fiat - prices.gas_deposit_eth;
            if eth <= 0.0 {
                return Err(QuoteError::AmountTooSmall);
            }
            let tokens = eth * prices.tokens_per_eth;
            (tokens, eth, round_fiat(fiat, currency))
        }
    };

    Ok(Quote {
        fiat_currency: currency.to_ascii_uppercase(),
        fiat_amount,
        eth_amount,
        token_amount,
        min_token_amount: token_amount * (1.0 - slippage_tolerance),
        gas_fee_eth: prices.gas_deposit_eth,
        gas_fee_fiat: round_fiat(prices.gas_deposit_eth * eth_fiat, currency),
        eth_usd_price: prices.eth_usd,
        eth_fiat_price: eth_fiat,
    })
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuoteResponse {
    quote: TokenQuoteBody,
}

#[derive(Debug, Deserialize)]
struct TokenQuoteBody {
    #[serde(rename = "rawQuote")]
    raw_quote: String,
}

/// Quote engine gathering prices from the rate cache, the ETH ticker, the
/// token quoting endpoint, and the gateway contract.
pub struct QuoteEngine {
    http: reqwest::Client,
    rates: Arc<RateCache>,
    gateway: Option<Arc<PaymentGateway<SignerProvider>>>,
    config: Arc<Config>,
}

impl QuoteEngine {
    /// Wire the engine's collaborators.
    pub fn new(
        http: reqwest::Client,
        rates: Arc<RateCache>,
        gateway: Option<Arc<PaymentGateway<SignerProvider>>>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            http,
            rates,
            gateway,
            config,
        }
    }

    /// Produce a quote for the requested side and currency.
    pub async fn quote(&self, side: QuoteSide, currency: &str) -> Result<Quote, QuoteError> {
        let currency = currency.to_ascii_uppercase();
        if !rates::is_supported(&currency) {
            return Err(QuoteError::UnsupportedCurrency(currency));
        }

        let prices = QuotePrices {
            eth_usd: self.eth_usd_price().await,
            usd_to_fiat: self.rates.rate(&currency).await,
            tokens_per_eth: self.tokens_per_eth().await?,
            gas_deposit_eth: self.gas_deposit_eth().await,
        };

        compute_quote(side, &currency, &prices, self.config.slippage_tolerance)
    }

    /// Direct ETH/USD lookup; falls back to the configured price.
    async fn eth_usd_price(&self) -> f64 {
        let fetched: Result<TickerResponse, String> = async {
            self.http
                .get(&self.config.eth_usd_ticker_url)
                .send()
                .await
                .map_err(|e| e.to_string())?
                .error_for_status()
                .map_err(|e| e.to_string())?
                .json()
                .await
                .map_err(|e| e.to_string())
        }
        .await;

        match fetched.and_then(|t| t.price.parse::<f64>().map_err(|e| e.to_string())) {
            Ok(price) if price > 0.0 => price,
            Ok(_) | Err(_) => {
                warn!(
                    fallback = true,
                    price = self.config.fallback_eth_usd_price,
                    "ETH/USD ticker unavailable, using fallback price"
                );
                self.config.fallback_eth_usd_price
            }
        }
    }

    /// Tokens returned for exactly 1 ETH, from the token quoting endpoint.
    async fn tokens_per_eth(&self) -> Result<f64, QuoteError> {
        let url = self
            .config
            .token_quote_url
            .as_deref()
            .ok_or_else(|| QuoteError::TokenQuote("TOKEN_QUOTE_URL is not set".to_string()))?;

        let one_eth_wei = "1000000000000000000";
        let response: TokenQuoteResponse = self
            .http
            .get(url)
            .query(&[("amountIn", one_eth_wei)])
            .send()
            .await
            .map_err(|e| QuoteError::TokenQuote(e.to_string()))?
            .error_for_status()
            .map_err(|e| QuoteError::TokenQuote(e.to_string()))?
            .json()
            .await
            .map_err(|e| QuoteError::TokenQuote(e.to_string()))?;

        parse_raw_quote(&response.quote.raw_quote)
            .filter(|rate| *rate > 0.0)
            .ok_or_else(|| {
                QuoteError::TokenQuote(format!("invalid rawQuote {}", response.quote.raw_quote))
            })
    }

    /// Gas deposit the gateway contract requires, in ETH; falls back to the
    /// configured constant.
    async fn gas_deposit_eth(&self) -> f64 {
        let Some(gateway) = self.gateway.as_deref() else {
            return self.config.fallback_gas_deposit_eth;
        };

        match gateway.required_gas_deposit().await {
            Ok(wei) => format_units(wei, 18).parse().unwrap_or_else(|_| {
                warn!(fallback = true, "unparseable gas deposit, using fallback");
                self.config.fallback_gas_deposit_eth
            }),
            Err(e) => {
                warn!(
                    fallback = true,
                    error = %e,
                    deposit = self.config.fallback_gas_deposit_eth,
                    "gas deposit read failed, using fallback"
                );
                self.config.fallback_gas_deposit_eth
            }
        }
    }
}
