// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Provider webhook endpoints.
//!
//! Handlers hand the raw body to the reconciler and return its ack
//! immediately; settlement work continues on the worker pool. Reconciliation
//! misses are acked with 2xx (providers rarely retry intelligently on
//! errors), while undecodable bodies and bad signatures are rejected.

use axum::{body::Bytes, extract::State, Json};

use crate::{
    error::ApiError,
    providers::{PaymentProvider, ProviderError},
    settlement::{reconciler::ReconcileError, WebhookAck},
    state::AppState,
};

fn map_reconcile_error(error: ReconcileError) -> ApiError {
    match error {
        ReconcileError::Provider(ProviderError::InvalidSignature) => {
            ApiError::forbidden("Webhook signature rejected")
        }
        ReconcileError::Provider(ProviderError::Decode(message)) => {
            ApiError::bad_request(format!("Unparseable webhook payload: {message}"))
        }
        other => ApiError::internal(format!("Webhook processing failed: {other}")),
    }
}

/// Midtrans payment notification endpoint.
#[utoipa::path(
    post,
    path = "/v1/webhooks/midtrans",
    tag = "Webhooks",
    request_body(content = String, description = "Raw provider notification payload"),
    responses(
        (status = 200, description = "Notification processed", body = WebhookAck),
        (status = 400, description = "Unparseable payload"),
        (status = 403, description = "Signature rejected")
    )
)]
pub async fn midtrans_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    state
        .reconciler
        .handle(PaymentProvider::Midtrans, &body)
        .await
        .map(Json)
        .map_err(map_reconcile_error)
}

/// Transak order event endpoint.
#[utoipa::path(
    post,
    path = "/v1/webhooks/transak",
    tag = "Webhooks",
    request_body(content = String, description = "Raw provider notification payload"),
    responses(
        (status = 200, description = "Event processed", body = WebhookAck),
        (status = 400, description = "Unparseable payload")
    )
)]
pub async fn transak_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    state
        .reconciler
        .handle(PaymentProvider::Transak, &body)
        .await
        .map(Json)
        .map_err(map_reconcile_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn signature_failures_map_to_forbidden() {
        let error = ReconcileError::Provider(ProviderError::InvalidSignature);
        assert_eq!(map_reconcile_error(error).status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn decode_failures_map_to_bad_request() {
        let error = ReconcileError::Provider(ProviderError::Decode("eof".to_string()));
        assert_eq!(map_reconcile_error(error).status, StatusCode::BAD_REQUEST);
    }
}
