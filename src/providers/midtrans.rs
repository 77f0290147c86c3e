// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Midtrans Snap integration (card / bank-transfer checkout).
//!
//! Checkout sessions are created through the Snap API with server-key Basic
//! auth. Notifications carry an HMAC-SHA256 `signature_key` over
//! `order_id + status_code + gross_amount`, verified before any state
//! change.

use std::time::Duration;

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use tracing::info;

use super::{NormalizedNotification, ProviderError, ProviderStatus};

type HmacSha256 = Hmac<Sha256>;

const SNAP_TRANSACTIONS_PATH: &str = "/snap/v1/transactions";

/// Midtrans webhook notification payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidtransNotification {
    /// Order reference we supplied at session creation.
    pub order_id: String,
    /// Midtrans transaction status vocabulary.
    pub transaction_status: String,
    /// Midtrans status code string ("200", "201", ...).
    #[serde(default)]
    pub status_code: String,
    /// Gross amount as a decimal string.
    #[serde(default)]
    pub gross_amount: String,
    /// Fiat currency; Midtrans defaults to IDR.
    #[serde(default)]
    pub currency: Option<String>,
    /// HMAC signature over order_id + status_code + gross_amount.
    #[serde(default)]
    pub signature_key: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
}

impl MidtransNotification {
    /// Reduce to the provider-agnostic notification.
    pub fn normalize(&self) -> NormalizedNotification {
        NormalizedNotification {
            external_order_id: self.order_id.clone(),
            status: map_transaction_status(&self.transaction_status),
            raw_status: self.transaction_status.clone(),
            gross_amount: self.gross_amount.parse().unwrap_or(0.0),
            currency: self
                .currency
                .clone()
                .unwrap_or_else(|| "IDR".to_string())
                .to_ascii_uppercase(),
        }
    }
}

/// Map the Midtrans transaction status vocabulary onto internal transitions.
pub fn map_transaction_status(raw_status: &str) -> ProviderStatus {
    let status = raw_status.trim().to_ascii_lowercase();
    match status.as_str() {
        "capture" | "settlement" => ProviderStatus::Paid,
        "deny" | "cancel" | "expire" | "failure" => ProviderStatus::Failed,
        _ => ProviderStatus::Pending,
    }
}

/// HMAC-SHA256 signature over `order_id + status_code + gross_amount`.
pub fn compute_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut mac =
        HmacSha256::new_from_slice(server_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(order_id.as_bytes());
    mac.update(status_code.as_bytes());
    mac.update(gross_amount.as_bytes());
    alloy::hex::encode(mac.finalize().into_bytes())
}

/// Verify a notification's `signature_key` against the server key.
pub fn verify_signature(notification: &MidtransNotification, server_key: &str) -> bool {
    let Some(signature) = notification.signature_key.as_deref() else {
        return false;
    };
    let Ok(expected) = alloy::hex::decode(signature) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(server_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(notification.order_id.as_bytes());
    mac.update(notification.status_code.as_bytes());
    mac.update(notification.gross_amount.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Checkout session returned by the Snap API.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Snap session token.
    pub token: String,
    /// Hosted checkout page for the buyer.
    pub redirect_url: String,
}

/// Parameters for a new checkout session.
pub struct CreateCheckoutRequest<'a> {
    /// Our external order reference (echoed back in notifications).
    pub order_ref: &'a str,
    /// Gross fiat amount (already buffered and rounded).
    pub gross_amount: f64,
    /// Fiat currency code.
    pub currency: &'a str,
}

/// Midtrans Snap API client.
#[derive(Debug, Clone)]
pub struct MidtransClient {
    api_base_url: String,
    server_key: String,
    http: Client,
}

impl MidtransClient {
    /// Build a client when the server key is configured.
    pub fn new(api_base_url: impl Into<String>, server_key: impl Into<String>) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: api_base_url.into(),
            server_key: server_key.into(),
            http,
        })
    }

    /// Create a Snap checkout session for an order.
    pub async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest<'_>,
    ) -> Result<CheckoutSession, ProviderError> {
        let payload = json!({
            "transaction_details": {
                "order_id": request.order_ref,
                "gross_amount": request.gross_amount,
            },
            "currency": request.currency,
        });

        let response = self
            .http
            .post(format!(
                "{}{}",
                self.api_base_url.trim_end_matches('/'),
                SNAP_TRANSACTIONS_PATH
            ))
            .header("Authorization", self.basic_auth())
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("snap session request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!(
                "snap session returned {status}: {body}"
            )));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid snap response: {e}")))?;

        info!(
            order_ref = %request.order_ref,
            "Midtrans checkout session created"
        );
        Ok(session)
    }

    fn basic_auth(&self) -> String {
        // Midtrans Basic auth is base64("<server_key>:").
        let credentials = Base64::encode_string(format!("{}:", self.server_key).as_bytes());
        format!("Basic {credentials}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_notification(status: &str) -> MidtransNotification {
        MidtransNotification {
            order_id: "rl-0xabc-1700000000".to_string(),
            transaction_status: status.to_string(),
            status_code: "200".to_string(),
            gross_amount: "150000.00".to_string(),
            currency: Some("IDR".to_string()),
            signature_key: None,
            transaction_id: None,
            payment_type: None,
        }
    }

    #[test]
    fn transaction_status_mapping_is_stable() {
        assert_eq!(map_transaction_status("settlement"), ProviderStatus::Paid);
        assert_eq!(map_transaction_status("capture"), ProviderStatus::Paid);
        assert_eq!(map_transaction_status("EXPIRE"), ProviderStatus::Failed);
        assert_eq!(map_transaction_status("deny"), ProviderStatus::Failed);
        assert_eq!(map_transaction_status("pending"), ProviderStatus::Pending);
        assert_eq!(
            map_transaction_status("authorize"),
            ProviderStatus::Pending
        );
    }

    #[test]
    fn normalize_extracts_the_gross_amount_and_currency() {
        let note = sample_notification("settlement").normalize();
        assert_eq!(note.external_order_id, "rl-0xabc-1700000000");
        assert_eq!(note.status, ProviderStatus::Paid);
        assert_eq!(note.raw_status, "settlement");
        assert_eq!(note.gross_amount, 150_000.0);
        assert_eq!(note.currency, "IDR");
    }

    #[test]
    fn signature_round_trips_against_the_server_key() {
        let mut notification = sample_notification("settlement");
        let signature = compute_signature(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            "server-key",
        );
        notification.signature_key = Some(signature);

        assert!(verify_signature(&notification, "server-key"));
        assert!(!verify_signature(&notification, "other-key"));
    }

    #[test]
    fn tampered_or_missing_signatures_fail_verification() {
        let mut notification = sample_notification("settlement");
        assert!(!verify_signature(&notification, "server-key"));

        notification.signature_key = Some(compute_signature(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            "server-key",
        ));
        notification.gross_amount = "999999.00".to_string();
        assert!(!verify_signature(&notification, "server-key"));

        notification.signature_key = Some("zz-not-hex".to_string());
        assert!(!verify_signature(&notification, "server-key"));
    }
}
