// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Payment provider integrations.
//!
//! Each provider has its own payload schema; decoding them into the tagged
//! [`ProviderPayload`] union is the only provider-specific code on the
//! webhook path. Everything downstream works on the normalized notification.

pub mod midtrans;
pub mod transak;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use midtrans::{MidtransClient, MidtransNotification};
pub use transak::{transak_widget_url, TransakEvent};

/// Supported payment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    /// Card / bank-transfer checkout (Snap).
    Midtrans,
    /// Third-party crypto on-ramp.
    Transak,
}

impl PaymentProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentProvider::Midtrans => "midtrans",
            PaymentProvider::Transak => "transak",
        }
    }
}

/// Provider status vocabulary reduced to the transitions we act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    /// Funds confirmed; settlement may proceed.
    Paid,
    /// Nothing to do yet (idempotent re-delivery included).
    Pending,
    /// The provider gave up on this payment.
    Failed,
}

/// Provider-agnostic view of one webhook notification.
#[derive(Debug, Clone)]
pub struct NormalizedNotification {
    /// Provider-side order/session identifier.
    pub external_order_id: String,
    /// Normalized status.
    pub status: ProviderStatus,
    /// The provider's literal status string, kept for error details.
    pub raw_status: String,
    /// Gross fiat amount reported by the provider.
    pub gross_amount: f64,
    /// Fiat currency reported by the provider.
    pub currency: String,
}

/// Errors raised while talking to or decoding a provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider payload could not be decoded: {0}")]
    Decode(String),

    #[error("Provider signature verification failed")]
    InvalidSignature,

    #[error("Provider configuration missing: {0}")]
    MissingConfig(String),

    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Provider response was invalid: {0}")]
    InvalidResponse(String),
}

/// Tagged union of known provider payload shapes.
#[derive(Debug, Clone)]
pub enum ProviderPayload {
    Midtrans(MidtransNotification),
    Transak(TransakEvent),
}

impl ProviderPayload {
    /// Decode a raw webhook body for the named provider.
    pub fn decode(provider: PaymentProvider, raw: &[u8]) -> Result<Self, ProviderError> {
        match provider {
            PaymentProvider::Midtrans => serde_json::from_slice(raw)
                .map(ProviderPayload::Midtrans)
                .map_err(|e| ProviderError::Decode(e.to_string())),
            PaymentProvider::Transak => serde_json::from_slice(raw)
                .map(ProviderPayload::Transak)
                .map_err(|e| ProviderError::Decode(e.to_string())),
        }
    }

    /// Which provider produced this payload.
    pub fn provider(&self) -> PaymentProvider {
        match self {
            ProviderPayload::Midtrans(_) => PaymentProvider::Midtrans,
            ProviderPayload::Transak(_) => PaymentProvider::Transak,
        }
    }

    /// Reduce the payload to the provider-agnostic notification.
    pub fn normalize(&self) -> NormalizedNotification {
        match self {
            ProviderPayload::Midtrans(n) => n.normalize(),
            ProviderPayload::Transak(e) => e.normalize(),
        }
    }
}
