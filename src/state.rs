// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

use std::sync::Arc;

use crate::blockchain::ChainClient;
use crate::config::Config;
use crate::pricing::QuoteEngine;
use crate::providers::MidtransClient;
use crate::settlement::Reconciler;
use crate::storage::JsonStorage;

/// Shared application state: every collaborator is constructed once at
/// startup and handed out by reference.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<JsonStorage>,
    pub quoter: Arc<QuoteEngine>,
    pub reconciler: Arc<Reconciler>,
    pub midtrans: Option<Arc<MidtransClient>>,
    pub chain: Option<Arc<ChainClient>>,
}
