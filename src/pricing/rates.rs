// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Fiat exchange-rate cache.
//!
//! Rates are fetched as a USD-based table and cached for a fixed TTL.
//! Lookups sit on the critical path of every quote, so a failed refetch
//! degrades to the conservative fallback table instead of propagating an
//! error; every fallback substitution is logged.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::warn;

/// How long a fetched rate table stays valid.
pub const RATE_TTL: Duration = Duration::from_secs(15 * 60);

/// Conservative USD-based rates used when the upstream source is down.
const FALLBACK_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("IDR", 16_500.0),
    ("EUR", 0.95),
    ("GBP", 0.82),
    ("SGD", 1.38),
    ("JPY", 158.0),
];

/// Whether quotes can be issued in this currency.
pub fn is_supported(currency: &str) -> bool {
    FALLBACK_RATES
        .iter()
        .any(|(code, _)| *code == currency.to_ascii_uppercase())
}

/// Fallback USD rate for a supported currency.
pub fn fallback_rate(currency: &str) -> f64 {
    let upper = currency.to_ascii_uppercase();
    FALLBACK_RATES
        .iter()
        .find(|(code, _)| *code == upper)
        .map(|(_, rate)| *rate)
        .unwrap_or(1.0)
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

struct CachedTable {
    rates: HashMap<String, f64>,
    fetched_at: Instant,
}

impl CachedTable {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < RATE_TTL
    }
}

/// USD-based fiat rate cache with TTL refresh and fallback degradation.
pub struct RateCache {
    http: reqwest::Client,
    url: String,
    table: RwLock<Option<CachedTable>>,
}

impl RateCache {
    /// Create a cache fetching from the given rate-table URL.
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            table: RwLock::new(None),
        }
    }

    /// USD rate for a currency (units of `currency` per 1 USD).
    ///
    /// Never fails: a cache miss triggers a refetch, and a failed refetch
    /// returns the fallback table value.
    pub async fn rate(&self, currency: &str) -> f64 {
        let upper = currency.to_ascii_uppercase();
        if upper == "USD" {
            return 1.0;
        }

        if let Some(rate) = self.cached_rate(&upper).await {
            return rate;
        }

        match self.refresh().await {
            Ok(()) => {
                if let Some(rate) = self.cached_rate(&upper).await {
                    return rate;
                }
                warn!(currency = %upper, fallback = true, "rate table has no entry, using fallback");
                fallback_rate(&upper)
            }
            Err(e) => {
                warn!(currency = %upper, error = %e, fallback = true, "rate refresh failed, using fallback");
                fallback_rate(&upper)
            }
        }
    }

    /// Cross-rate between two currencies: units of `to` per unit of `from`.
    pub async fn cross_rate(&self, from: &str, to: &str) -> f64 {
        let from_rate = self.rate(from).await;
        let to_rate = self.rate(to).await;
        if from_rate <= 0.0 {
            warn!(currency = %from, fallback = true, "non-positive rate, using fallback");
            return to_rate / fallback_rate(from);
        }
        to_rate / from_rate
    }

    async fn cached_rate(&self, currency: &str) -> Option<f64> {
        let table = self.table.read().await;
        match table.as_ref() {
            Some(cached) if cached.is_fresh() => cached.rates.get(currency).copied(),
            _ => None,
        }
    }

    async fn refresh(&self) -> Result<(), reqwest::Error> {
        let response: RatesResponse = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut table = self.table.write().await;
        *table = Some(CachedTable {
            rates: response.rates,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    #[cfg(test)]
    async fn prime(&self, rates: HashMap<String, f64>) {
        let mut table = self.table.write().await;
        *table = Some(CachedTable {
            rates,
            fetched_at: Instant::now(),
        });
    }
}
