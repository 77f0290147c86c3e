// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Transak on-ramp integration.
//!
//! Sessions are hosted-widget URLs built client-side; no server call is
//! needed to start one. Webhook events carry no signature and are accepted
//! as-is; add verification here if the provider enables signed webhooks for
//! this account.

use serde::{Deserialize, Serialize};

use super::{NormalizedNotification, ProviderStatus};

/// Transak webhook event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransakEvent {
    /// Event name, e.g. `ORDER_COMPLETED`.
    #[serde(rename = "eventID", default)]
    pub event_id: Option<String>,
    /// Order payload.
    #[serde(rename = "webhookData")]
    pub webhook_data: TransakOrder,
}

/// Transak order payload inside a webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransakOrder {
    /// Transak order id.
    pub id: String,
    /// Transak order status vocabulary.
    pub status: String,
    #[serde(default)]
    pub fiat_amount: f64,
    #[serde(default)]
    pub fiat_currency: String,
    /// Our order reference, echoed back when the session set one.
    #[serde(default)]
    pub partner_order_id: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub crypto_currency: Option<String>,
}

impl TransakEvent {
    /// Reduce to the provider-agnostic notification.
    ///
    /// Correlation prefers our echoed `partnerOrderId`; the Transak order id
    /// is the fallback for sessions started outside this service.
    pub fn normalize(&self) -> NormalizedNotification {
        let order = &self.webhook_data;
        NormalizedNotification {
            external_order_id: order
                .partner_order_id
                .clone()
                .unwrap_or_else(|| order.id.clone()),
            status: map_order_status(&order.status),
            raw_status: order.status.clone(),
            gross_amount: order.fiat_amount,
            currency: order.fiat_currency.to_ascii_uppercase(),
        }
    }
}

/// Map the Transak order status vocabulary onto internal transitions.
pub fn map_order_status(raw_status: &str) -> ProviderStatus {
    let status = raw_status.trim().to_ascii_uppercase();
    match status.as_str() {
        "COMPLETED" | "ORDER_COMPLETED" => ProviderStatus::Paid,
        "FAILED" | "CANCELLED" | "EXPIRED" | "ORDER_FAILED" => ProviderStatus::Failed,
        _ => ProviderStatus::Pending,
    }
}

/// Build the hosted-widget URL for a new on-ramp session.
pub fn transak_widget_url(
    widget_base_url: &str,
    api_key: &str,
    order_ref: &str,
    wallet_address: &str,
    fiat_amount: f64,
    fiat_currency: &str,
    token_symbol: &str,
) -> String {
    let mut url = format!("{}/?", widget_base_url.trim_end_matches('/'));
    let params: &[(&str, String)] = &[
        ("apiKey", api_key.to_string()),
        ("partnerOrderId", order_ref.to_string()),
        ("walletAddress", wallet_address.to_string()),
        ("fiatAmount", format!("{fiat_amount}")),
        ("fiatCurrency", fiat_currency.to_string()),
        ("cryptoCurrencyCode", token_symbol.to_string()),
    ];

    let encoded: Vec<String> = params
        .iter()
        .map(|(key, value)| {
            let encoded_value: String =
                url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
            format!("{key}={encoded_value}")
        })
        .collect();

    url.push_str(&encoded.join("&"));
    url
}
