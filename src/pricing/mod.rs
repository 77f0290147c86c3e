// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Pricing: fiat rate cache and the quote engine.

pub mod quote;
pub mod rates;

pub use quote::{Quote, QuoteEngine, QuoteError, QuoteSide};
pub use rates::RateCache;
