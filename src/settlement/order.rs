// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Settlement order entity and its lifecycle state machine.
//!
//! A [`SettlementOrder`] is the persisted record of one fiat-to-token
//! purchase intent. Its `order_id` doubles as the on-chain payment key and
//! as the idempotency key for provider correlation. Orders are never
//! deleted; terminal records stay behind as the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How the purchased tokens reach the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SettlementMode {
    /// The gateway contract releases tokens it already escrows.
    DirectTransfer,
    /// Native currency is swapped into the target token through the AMM.
    SwapMediated,
}

/// Settlement order lifecycle status.
///
/// ```text
/// pending -> processing -> {completed | failed}
/// pending -> provider_initiated -> provider_completed -> ready_for_swap
///         -> swap_pending -> completed
/// completed -> refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Quote issued, waiting for the provider payment.
    Pending,
    /// Payment confirmed; on-chain settlement in flight.
    Processing,
    /// Crypto on-ramp session opened with the provider.
    ProviderInitiated,
    /// Provider reports the on-ramp delivered funds.
    ProviderCompleted,
    /// Funds available; swap not yet submitted.
    ReadyForSwap,
    /// Swap transaction submitted, awaiting the mined receipt.
    SwapPending,
    /// Tokens delivered.
    Completed,
    /// Settlement failed; see `error_detail`.
    Failed,
    /// Completed order refunded through the explicit refund action.
    Refunded,
}

impl OrderStatus {
    /// Terminal states admit no further transitions (`Completed` only the
    /// explicit refund).
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Failed | OrderStatus::Refunded)
    }

    /// Whether the state machine permits `self -> next`.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, ProviderInitiated)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (ProviderInitiated, ProviderCompleted)
                | (ProviderInitiated, Failed)
                | (ProviderCompleted, ReadyForSwap)
                | (ProviderCompleted, Failed)
                | (ReadyForSwap, SwapPending)
                | (ReadyForSwap, Failed)
                | (SwapPending, Completed)
                | (SwapPending, Failed)
                | (Completed, Refunded)
        )
    }
}

/// Error returned for a disallowed state transition.
#[derive(Debug, thiserror::Error)]
#[error("invalid order transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Persisted record of one fiat-to-token purchase intent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettlementOrder {
    /// Unique order identifier; reused as the on-chain payment key.
    pub order_id: String,
    /// Provider-assigned session/order id, set once a checkout exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_payment_ref: Option<String>,
    /// Destination address; immutable once set.
    pub buyer_wallet: String,
    /// Quoted fiat currency (ISO code).
    pub fiat_currency: String,
    /// Quoted fiat amount including slippage buffer and fee surcharge.
    pub fiat_amount: f64,
    /// ETH equivalent used for settlement.
    pub eth_amount: f64,
    /// Requested token amount.
    pub token_amount: f64,
    /// Slippage-adjusted floor: `token_amount * (1 - slippage_tolerance)`.
    pub min_token_amount: f64,
    /// Target token symbol.
    pub token_symbol: String,
    /// Direct transfer vs swap-mediated delivery.
    pub settlement_mode: SettlementMode,
    /// Contract gas reserve quoted in ETH.
    pub gas_fee_eth: f64,
    /// Contract gas reserve quoted in the order's fiat currency.
    pub gas_fee_fiat: f64,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Last failure reason; empty on success.
    #[serde(default)]
    pub error_detail: String,
    /// Payment registration / completion transaction hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_tx_hash: Option<String>,
    /// Swap transaction hash (swap-mediated orders only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_tx_hash: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Set when the order reaches `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SettlementOrder {
    /// Construct a new pending order from quote output.
    #[allow(clippy::too_many_arguments)]
    pub fn new_pending(
        order_id: String,
        buyer_wallet: String,
        fiat_currency: String,
        fiat_amount: f64,
        eth_amount: f64,
        token_amount: f64,
        min_token_amount: f64,
        token_symbol: String,
        settlement_mode: SettlementMode,
        gas_fee_eth: f64,
        gas_fee_fiat: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            external_payment_ref: None,
            buyer_wallet,
            fiat_currency,
            fiat_amount,
            eth_amount,
            token_amount,
            min_token_amount,
            token_symbol,
            settlement_mode,
            gas_fee_eth,
            gas_fee_fiat,
            status: OrderStatus::Pending,
            error_detail: String::new(),
            chain_tx_hash: None,
            swap_tx_hash: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Apply a state transition, stamping `updated_at` (and `completed_at`
    /// when reaching `Completed`). Returns an error when the state machine
    /// does not permit the move, which keeps terminal states immutable.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next == OrderStatus::Completed {
            self.completed_at = Some(self.updated_at);
            self.error_detail.clear();
        }
        Ok(())
    }

    /// Transition to `Failed`, recording a non-empty failure reason.
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), InvalidTransition> {
        let detail = detail.into();
        debug_assert!(!detail.is_empty(), "failure detail must not be empty");
        self.transition(OrderStatus::Failed)?;
        self.error_detail = detail;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order(mode: SettlementMode) -> SettlementOrder {
        SettlementOrder::new_pending(
            "ord-1".to_string(),
            "0x00000000000000000000000000000000000000aa".to_string(),
            "USD".to_string(),
            9.6,
            0.005,
            100.0,
            97.0,
            "RMP".to_string(),
            mode,
            0.000_15,
            0.27,
        )
    }

    #[test]
    fn direct_path_reaches_completed() {
        let mut order = sample_order(SettlementMode::DirectTransfer);
        order.transition(OrderStatus::Processing).unwrap();
        order.transition(OrderStatus::Completed).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.completed_at.is_some());
        assert!(order.error_detail.is_empty());
    }

    #[test]
    fn onramp_path_reaches_completed_via_swap() {
        let mut order = sample_order(SettlementMode::SwapMediated);
        for next in [
            OrderStatus::ProviderInitiated,
            OrderStatus::ProviderCompleted,
            OrderStatus::ReadyForSwap,
            OrderStatus::SwapPending,
            OrderStatus::Completed,
        ] {
            order.transition(next).unwrap();
        }
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let mut order = sample_order(SettlementMode::DirectTransfer);
        order.transition(OrderStatus::Processing).unwrap();
        order.fail("provider said expire").unwrap();
        assert_eq!(order.status, OrderStatus::Failed);

        for next in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Refunded,
        ] {
            assert!(order.transition(next).is_err(), "failed -> {next:?} allowed");
        }
        assert_eq!(order.error_detail, "provider said expire");
    }

    #[test]
    fn refund_is_reachable_only_from_completed() {
        let mut order = sample_order(SettlementMode::DirectTransfer);
        assert!(order.transition(OrderStatus::Refunded).is_err());

        order.transition(OrderStatus::Processing).unwrap();
        order.transition(OrderStatus::Completed).unwrap();
        order.transition(OrderStatus::Refunded).unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);

        // Refunded is terminal.
        assert!(order.transition(OrderStatus::Completed).is_err());
    }

    #[test]
    fn transition_updates_timestamp() {
        let mut order = sample_order(SettlementMode::DirectTransfer);
        let before = order.updated_at;
        order.transition(OrderStatus::Processing).unwrap();
        assert!(order.updated_at >= before);
    }

    #[test]
    fn serde_uses_snake_case_status_names() {
        let order = sample_order(SettlementMode::SwapMediated);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["settlement_mode"], "swap-mediated");
    }
}
