// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Settlement: the order state machine, the on-chain settlement engine, the
//! bounded worker pool, and the webhook reconciler.

pub mod engine;
pub mod order;
pub mod reconciler;
pub mod worker;

pub use engine::{SettlementEngine, SettlementError};
pub use order::{OrderStatus, SettlementMode, SettlementOrder};
pub use reconciler::{Reconciler, WebhookAck};
pub use worker::{Settle, SettlementPool, SettlementQueue};
