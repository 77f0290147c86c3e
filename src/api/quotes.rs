// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Standalone quote API.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::ApiError,
    pricing::{Quote, QuoteSide},
    state::AppState,
};

use super::orders::map_quote_error;

/// Query params for a quote.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct QuoteQuery {
    /// Fiat currency (ISO code).
    pub currency: String,
    /// Requested token amount; set this or `fiat_amount`.
    pub token_amount: Option<f64>,
    /// Fiat budget; set this or `token_amount`.
    pub fiat_amount: Option<f64>,
}

/// Quote response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub fiat_currency: String,
    /// Fiat amount including the slippage buffer, rounded per currency.
    pub fiat_amount: f64,
    pub eth_amount: f64,
    pub token_amount: f64,
    pub min_token_amount: f64,
    pub gas_fee_eth: f64,
    pub gas_fee_fiat: f64,
    pub eth_usd_price: f64,
    pub eth_fiat_price: f64,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            fiat_currency: quote.fiat_currency,
            fiat_amount: quote.fiat_amount,
            eth_amount: quote.eth_amount,
            token_amount: quote.token_amount,
            min_token_amount: quote.min_token_amount,
            gas_fee_eth: quote.gas_fee_eth,
            gas_fee_fiat: quote.gas_fee_fiat,
            eth_usd_price: quote.eth_usd_price,
            eth_fiat_price: quote.eth_fiat_price,
        }
    }
}

/// Compute a quote without creating an order.
#[utoipa::path(
    get,
    path = "/v1/quotes",
    tag = "Quotes",
    params(QuoteQuery),
    responses(
        (status = 200, description = "Quote computed", body = QuoteResponse),
        (status = 400, description = "Bad request"),
        (status = 503, description = "Quote source unavailable")
    )
)]
pub async fn get_quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let side = match (query.token_amount, query.fiat_amount) {
        (Some(tokens), None) => QuoteSide::TokenAmount(tokens),
        (None, Some(fiat)) => QuoteSide::FiatAmount(fiat),
        _ => {
            return Err(ApiError::bad_request(
                "Set exactly one of token_amount or fiat_amount",
            ))
        }
    };

    let quote = state
        .quoter
        .quote(side, &query.currency)
        .await
        .map_err(map_quote_error)?;

    Ok(Json(quote.into()))
}
