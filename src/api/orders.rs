// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Settlement order API: quote-and-create, polling, listing.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::Address;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    pricing::{QuoteError, QuoteSide},
    providers::{midtrans::CreateCheckoutRequest, transak_widget_url, PaymentProvider, ProviderError},
    settlement::{
        order::{OrderStatus, SettlementMode, SettlementOrder},
        reconciler::order_reference,
    },
    state::AppState,
    storage::OrderRepository,
};

/// Request body for creating a settlement order.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Destination wallet address.
    pub buyer_wallet: String,
    /// Fiat currency (ISO code).
    pub fiat_currency: String,
    /// Requested token amount; set this or `fiat_amount`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_amount: Option<f64>,
    /// Fiat budget; set this or `token_amount`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiat_amount: Option<f64>,
    /// Delivery mode (`direct-transfer` default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_mode: Option<SettlementMode>,
    /// Payment provider (`midtrans` default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<PaymentProvider>,
}

/// Settlement order response returned to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_payment_ref: Option<String>,
    pub buyer_wallet: String,
    pub fiat_currency: String,
    pub fiat_amount: f64,
    pub eth_amount: f64,
    pub token_amount: f64,
    pub min_token_amount: f64,
    pub token_symbol: String,
    pub settlement_mode: SettlementMode,
    pub gas_fee_eth: f64,
    pub gas_fee_fiat: f64,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_tx_hash: Option<String>,
    /// Hosted checkout page for the buyer, present on creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// List response for settlement orders.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: usize,
}

fn to_response(order: &SettlementOrder, checkout_url: Option<String>) -> OrderResponse {
    OrderResponse {
        order_id: order.order_id.clone(),
        external_payment_ref: order.external_payment_ref.clone(),
        buyer_wallet: order.buyer_wallet.clone(),
        fiat_currency: order.fiat_currency.clone(),
        fiat_amount: order.fiat_amount,
        eth_amount: order.eth_amount,
        token_amount: order.token_amount,
        min_token_amount: order.min_token_amount,
        token_symbol: order.token_symbol.clone(),
        settlement_mode: order.settlement_mode,
        gas_fee_eth: order.gas_fee_eth,
        gas_fee_fiat: order.gas_fee_fiat,
        status: order.status,
        error_detail: order.error_detail.clone(),
        chain_tx_hash: order.chain_tx_hash.clone(),
        swap_tx_hash: order.swap_tx_hash.clone(),
        checkout_url,
        created_at: order.created_at.to_rfc3339(),
        updated_at: order.updated_at.to_rfc3339(),
        completed_at: order.completed_at.map(|t| t.to_rfc3339()),
    }
}

pub(crate) fn map_quote_error(error: QuoteError) -> ApiError {
    match error {
        QuoteError::UnsupportedCurrency(_)
        | QuoteError::NonPositiveAmount
        | QuoteError::AmountTooSmall => ApiError::bad_request(error.to_string()),
        QuoteError::TokenQuote(message) => {
            ApiError::service_unavailable(format!("Token quote source failed: {message}"))
        }
    }
}

fn map_provider_error(error: ProviderError) -> ApiError {
    match error {
        ProviderError::MissingConfig(message) => {
            ApiError::service_unavailable(format!("Provider configuration error: {message}"))
        }
        ProviderError::InvalidSignature => ApiError::forbidden("Provider signature rejected"),
        ProviderError::Decode(message)
        | ProviderError::Request(message)
        | ProviderError::InvalidResponse(message) => {
            ApiError::service_unavailable(format!("Provider request failed: {message}"))
        }
    }
}

fn quote_side(request: &CreateOrderRequest) -> Result<QuoteSide, ApiError> {
    match (request.token_amount, request.fiat_amount) {
        (Some(tokens), None) => Ok(QuoteSide::TokenAmount(tokens)),
        (None, Some(fiat)) => Ok(QuoteSide::FiatAmount(fiat)),
        _ => Err(ApiError::bad_request(
            "Set exactly one of token_amount or fiat_amount",
        )),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Create a settlement order.
#[utoipa::path(
    post,
    path = "/v1/orders",
    tag = "Orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Settlement order created", body = OrderResponse),
        (status = 400, description = "Bad request"),
        (status = 503, description = "Provider or quote source unavailable")
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let buyer_wallet = request.buyer_wallet.trim().to_string();
    Address::from_str(&buyer_wallet)
        .map_err(|_| ApiError::bad_request("buyer_wallet must be a valid chain address"))?;

    let side = quote_side(&request)?;
    let quote = state
        .quoter
        .quote(side, &request.fiat_currency)
        .await
        .map_err(map_quote_error)?;

    let provider = request.provider.unwrap_or(PaymentProvider::Midtrans);
    let settlement_mode = match (provider, request.settlement_mode) {
        (PaymentProvider::Transak, Some(SettlementMode::DirectTransfer)) => {
            return Err(ApiError::bad_request(
                "Transak on-ramp settlements are swap-mediated",
            ))
        }
        (PaymentProvider::Transak, _) => SettlementMode::SwapMediated,
        (PaymentProvider::Midtrans, Some(mode)) => mode,
        (PaymentProvider::Midtrans, None) => SettlementMode::DirectTransfer,
    };

    let order_id = uuid::Uuid::new_v4().to_string();
    let external_ref = order_reference(&state.config.order_ref_prefix, &buyer_wallet, unix_now());

    let mut order = SettlementOrder::new_pending(
        order_id,
        buyer_wallet.clone(),
        quote.fiat_currency.clone(),
        quote.fiat_amount,
        quote.eth_amount,
        quote.token_amount,
        quote.min_token_amount,
        state.config.settlement_token_symbol.clone(),
        settlement_mode,
        quote.gas_fee_eth,
        quote.gas_fee_fiat,
    );

    let checkout_url = match provider {
        PaymentProvider::Midtrans => {
            let client = state.midtrans.as_deref().ok_or_else(|| {
                ApiError::service_unavailable(
                    "Midtrans is not configured. Set MIDTRANS_SERVER_KEY.",
                )
            })?;
            let session = client
                .create_checkout_session(CreateCheckoutRequest {
                    order_ref: &external_ref,
                    gross_amount: quote.fiat_amount,
                    currency: &quote.fiat_currency,
                })
                .await
                .map_err(map_provider_error)?;
            order.external_payment_ref = Some(external_ref);
            session.redirect_url
        }
        PaymentProvider::Transak => {
            let api_key = state.config.transak_api_key.as_deref().ok_or_else(|| {
                ApiError::service_unavailable("Transak is not configured. Set TRANSAK_API_KEY.")
            })?;
            let url = transak_widget_url(
                &state.config.transak_widget_base_url,
                api_key,
                &external_ref,
                &buyer_wallet,
                quote.fiat_amount,
                &quote.fiat_currency,
                &state.config.settlement_token_symbol,
            );
            order.external_payment_ref = Some(external_ref);
            order
                .transition(OrderStatus::ProviderInitiated)
                .map_err(|e| ApiError::internal(e.to_string()))?;
            url
        }
    };

    let repo = OrderRepository::new(&state.storage);
    repo.create(&order)
        .map_err(|e| ApiError::internal(format!("Failed to store order: {e}")))?;

    Ok((
        StatusCode::CREATED,
        Json(to_response(&order, Some(checkout_url))),
    ))
}

/// Get a settlement order by ID.
#[utoipa::path(
    get,
    path = "/v1/orders/{order_id}",
    tag = "Orders",
    params(
        ("order_id" = String, Path, description = "Settlement order ID")
    ),
    responses(
        (status = 200, description = "Settlement order details", body = OrderResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let repo = OrderRepository::new(&state.storage);
    let order = repo
        .get(&order_id)
        .map_err(|_| ApiError::not_found("Order not found"))?;
    Ok(Json(to_response(&order, None)))
}

/// Refund a completed settlement order.
///
/// Refunds are a record-level action: the order is the audit trail, and the
/// gateway contract handles gas-fund refunds through its own flow.
#[utoipa::path(
    post,
    path = "/v1/orders/{order_id}/refund",
    tag = "Orders",
    params(
        ("order_id" = String, Path, description = "Settlement order ID")
    ),
    responses(
        (status = 200, description = "Order refunded", body = OrderResponse),
        (status = 404, description = "Not found"),
        (status = 422, description = "Order is not refundable")
    )
)]
pub async fn refund_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let repo = OrderRepository::new(&state.storage);
    let mut order = repo
        .get(&order_id)
        .map_err(|_| ApiError::not_found("Order not found"))?;

    order
        .transition(OrderStatus::Refunded)
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;

    repo.update(&order)
        .map_err(|e| ApiError::internal(format!("Failed to store refund: {e}")))?;

    Ok(Json(to_response(&order, None)))
}

/// List settlement orders, newest first.
#[utoipa::path(
    get,
    path = "/v1/orders",
    tag = "Orders",
    responses(
        (status = 200, description = "Settlement orders listed", body = OrderListResponse)
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let repo = OrderRepository::new(&state.storage);
    let orders = repo
        .list()
        .map_err(|e| ApiError::internal(format!("Failed to list orders: {e}")))?;

    let mapped: Vec<OrderResponse> = orders.iter().map(|order| to_response(order, None)).collect();
    Ok(Json(OrderListResponse {
        total: mapped.len(),
        orders: mapped,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(token: Option<f64>, fiat: Option<f64>) -> CreateOrderRequest {
        CreateOrderRequest {
            buyer_wallet: "0x00000000000000000000000000000000000000aa".to_string(),
            fiat_currency: "USD".to_string(),
            token_amount: token,
            fiat_amount: fiat,
            settlement_mode: None,
            provider: None,
        }
    }

    #[test]
    fn quote_side_requires_exactly_one_amount() {
        assert!(matches!(
            quote_side(&request(Some(100.0), None)),
            Ok(QuoteSide::TokenAmount(_))
        ));
        assert!(matches!(
            quote_side(&request(None, Some(9.6))),
            Ok(QuoteSide::FiatAmount(_))
        ));
        assert!(quote_side(&request(None, None)).is_err());
        assert!(quote_side(&request(Some(100.0), Some(9.6))).is_err());
    }

    #[test]
    fn quote_errors_map_to_api_statuses() {
        assert_eq!(
            map_quote_error(QuoteError::NonPositiveAmount).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            map_quote_error(QuoteError::UnsupportedCurrency("XAU".to_string())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            map_quote_error(QuoteError::TokenQuote("down".to_string())).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn response_hides_empty_error_detail() {
        let order = SettlementOrder::new_pending(
            "ord-1".to_string(),
            "0x00000000000000000000000000000000000000aa".to_string(),
            "USD".to_string(),
            9.6,
            0.005,
            100.0,
            97.0,
            "RMP".to_string(),
            SettlementMode::DirectTransfer,
            0.000_15,
            0.27,
        );
        let json = serde_json::to_value(to_response(&order, None)).unwrap();
        assert!(json.get("error_detail").is_none());
        assert_eq!(json["status"], "pending");
    }
}
