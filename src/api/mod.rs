// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::{error::ApiError, state::AppState};

pub mod orders;
pub mod quotes;
pub mod webhooks;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route("/orders/{order_id}", get(orders::get_order))
        .route("/orders/{order_id}/refund", post(orders::refund_order))
        .route("/quotes", get(quotes::get_quote))
        .route("/webhooks/midtrans", post(webhooks::midtrans_webhook))
        .route("/webhooks/transak", post(webhooks::transak_webhook))
        .with_state(state.clone());

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health).with_state(state))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
}

/// Health probe response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Data directory is writable.
    pub storage: bool,
    /// Chain RPC is reachable; absent when the chain is not configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<bool>,
}

/// Service liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "A dependency is unavailable")
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let storage_ok = state.storage.health_check().is_ok();

    let chain_ok = match state.chain.as_deref() {
        Some(chain) => Some(chain.block_number().await.is_ok()),
        None => None,
    };

    let healthy = storage_ok && chain_ok != Some(false);
    if !healthy {
        return Err(ApiError::service_unavailable("Dependency check failed"));
    }

    Ok(Json(HealthResponse {
        status: "ok",
        storage: storage_ok,
        chain: chain_ok,
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        orders::create_order,
        orders::get_order,
        orders::refund_order,
        orders::list_orders,
        quotes::get_quote,
        webhooks::midtrans_webhook,
        webhooks::transak_webhook
    ),
    components(
        schemas(
            HealthResponse,
            orders::CreateOrderRequest,
            orders::OrderResponse,
            orders::OrderListResponse,
            quotes::QuoteResponse,
            crate::settlement::order::SettlementOrder,
            crate::settlement::order::OrderStatus,
            crate::settlement::order::SettlementMode,
            crate::settlement::WebhookAck,
            crate::settlement::reconciler::AckAction,
            crate::providers::PaymentProvider
        )
    ),
    tags(
        (name = "Health", description = "Service liveness"),
        (name = "Orders", description = "Settlement order lifecycle"),
        (name = "Quotes", description = "Fiat/ETH/token conversion"),
        (name = "Webhooks", description = "Provider payment notifications")
    )
)]
struct ApiDoc;
