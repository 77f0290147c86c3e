// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Settlement engine.
//!
//! Executes the on-chain half of an order: register the payment with the
//! gateway contract (idempotently), then either finalize the contract-native
//! delivery or swap native currency into the token. Each step awaits its
//! mined receipt before the next, so within one settlement the sequence is
//! strictly ordered. Across settlements no ordering is enforced beyond the
//! on-chain existence gate; two attempts for the same order id can still
//! interleave between `exists` and `create`, which the adapter resolves by
//! classifying the duplicate revert as already-registered.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::blockchain::{
    eth_to_wei, to_units, GatewayError, PaymentGateway, PaymentStatusCode, SignerProvider,
    SwapError, SwapExecutor,
};
use crate::config::Config;
use crate::settlement::order::{InvalidTransition, OrderStatus, SettlementMode, SettlementOrder};
use crate::storage::{JsonStorage, OrderRepository, StorageError};

use super::worker::Settle;

/// Token decimals used at the chain boundary.
const TOKEN_DECIMALS: u8 = 18;

/// Errors terminal to one settlement attempt.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error("Order {0} is not in a settleable state ({1:?})")]
    NotSettleable(String, OrderStatus),

    #[error("Chain settlement is not configured")]
    NotConfigured,

    #[error("Swap executor is not configured")]
    SwapUnavailable,
}

/// Fiat amount in the contract's integer representation: minor units for
/// 2-decimal currencies, whole units for IDR.
fn fiat_to_contract_units(amount: f64, currency: &str) -> alloy::primitives::U256 {
    if currency.eq_ignore_ascii_case("IDR") {
        to_units(amount, 0)
    } else {
        to_units(amount, 2)
    }
}

/// Settlement engine wiring storage and the chain adapters.
pub struct SettlementEngine {
    storage: Arc<JsonStorage>,
    gateway: Option<Arc<PaymentGateway<SignerProvider>>>,
    swapper: Option<Arc<SwapExecutor<SignerProvider>>>,
    config: Arc<Config>,
}

impl SettlementEngine {
    /// Wire the engine's collaborators.
    pub fn new(
        storage: Arc<JsonStorage>,
        gateway: Option<Arc<PaymentGateway<SignerProvider>>>,
        swapper: Option<Arc<SwapExecutor<SignerProvider>>>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            storage,
            gateway,
            swapper,
            config,
        }
    }

    async fn settle_inner(&self, order_id: &str) -> Result<(), SettlementError> {
        let repo = OrderRepository::new(&self.storage);
        let mut order = repo.get(order_id)?;

        match order.status {
            OrderStatus::Processing | OrderStatus::ReadyForSwap => {}
            OrderStatus::Completed => {
                info!(order_id = %order_id, "order already completed, nothing to settle");
                return Ok(());
            }
            other => {
                return Err(SettlementError::NotSettleable(order_id.to_string(), other));
            }
        }

        let gateway = self
            .gateway
            .as_deref()
            .ok_or(SettlementError::NotConfigured)?;

        let result = match order.settlement_mode {
            SettlementMode::DirectTransfer => self.settle_direct(gateway, &mut order).await,
            SettlementMode::SwapMediated => self.settle_swap(gateway, &mut order).await,
        };

        match result {
            Ok(()) => {
                repo.update(&order)?;
                Ok(())
            }
            Err(e) => {
                if order.fail(e.to_string()).is_ok() {
                    if let Err(persist_err) = repo.update(&order) {
                        warn!(
                            order_id = %order_id,
                            error = %persist_err,
                            "failed to persist settlement failure"
                        );
                    }
                } else {
                    warn!(
                        order_id = %order_id,
                        status = ?order.status,
                        "settlement failed in a state that cannot transition to failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Gas deposit required by the contract, degrading to the configured
    /// fallback.
    async fn gas_deposit_wei(
        &self,
        gateway: &PaymentGateway<SignerProvider>,
    ) -> alloy::primitives::U256 {
        match gateway.required_gas_deposit().await {
            Ok(deposit) => deposit,
            Err(e) => {
                warn!(
                    fallback = true,
                    error = %e,
                    "gas deposit read failed, using fallback"
                );
                eth_to_wei(self.config.fallback_gas_deposit_eth)
            }
        }
    }

    /// Register the payment on-chain (idempotent) and remember the tx hash.
    async fn register_payment(
        &self,
        gateway: &PaymentGateway<SignerProvider>,
        order: &mut SettlementOrder,
    ) -> Result<(), SettlementError> {
        let gas_deposit = self.gas_deposit_wei(gateway).await;
        let created = gateway
            .create_if_absent(
                &order.order_id,
                to_units(order.token_amount, TOKEN_DECIMALS),
                fiat_to_contract_units(order.fiat_amount, &order.fiat_currency),
                &order.buyer_wallet,
                gas_deposit,
            )
            .await?;

        if let Some(tx_hash) = created {
            order.chain_tx_hash = Some(tx_hash);
        }
        Ok(())
    }

    /// Contract-native delivery: register, then finalize with the
    /// self-signed completion callback.
    async fn settle_direct(
        &self,
        gateway: &PaymentGateway<SignerProvider>,
        order: &mut SettlementOrder,
    ) -> Result<(), SettlementError> {
        self.register_payment(gateway, order).await?;

        let finalize_tx = gateway
            .finalize(&order.order_id, PaymentStatusCode::Completed, None)
            .await?;

        // Creation may have been skipped as already-registered; the completed
        // order must still carry a mined hash.
        if order.chain_tx_hash.is_none() {
            order.chain_tx_hash = Some(finalize_tx);
        }
        order.transition(OrderStatus::Completed)?;
        Ok(())
    }

    /// Swap-mediated delivery: register, then swap native currency into the
    /// token with the slippage floor and router deadline.
    async fn settle_swap(
        &self,
        gateway: &PaymentGateway<SignerProvider>,
        order: &mut SettlementOrder,
    ) -> Result<(), SettlementError> {
        let swapper = self
            .swapper
            .as_deref()
            .ok_or(SettlementError::SwapUnavailable)?;

        self.register_payment(gateway, order).await?;

        if order.status == OrderStatus::ReadyForSwap {
            order.transition(OrderStatus::SwapPending)?;
            OrderRepository::new(&self.storage).update(order)?;
        }

        let tx_hash = swapper
            .swap(
                eth_to_wei(order.eth_amount),
                to_units(order.min_token_amount, TOKEN_DECIMALS),
                &order.buyer_wallet,
            )
            .await?;

        order.swap_tx_hash = Some(tx_hash.clone());
        order.chain_tx_hash = Some(tx_hash);
        order.transition(OrderStatus::Completed)?;
        Ok(())
    }
}

#[async_trait]
impl Settle for SettlementEngine {
    async fn settle(&self, order_id: &str) -> Result<(), SettlementError> {
        self.settle_inner(order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use std::env;
    use std::fs;

    fn test_storage() -> Arc<JsonStorage> {
        let dir = env::temp_dir().join(format!("rampline-engine-{}", uuid::Uuid::new_v4()));
        let mut storage = JsonStorage::new(StoragePaths::new(&dir));
        storage.initialize().expect("initialize test storage");
        Arc::new(storage)
    }

    fn cleanup(storage: &JsonStorage) {
        let _ = fs::remove_dir_all(storage.paths().root());
    }

    fn engine_without_chain(storage: Arc<JsonStorage>) -> SettlementEngine {
        SettlementEngine::new(storage, None, None, Arc::new(Config::from_env()))
    }

    fn sample_order(id: &str, status: OrderStatus) -> SettlementOrder {
        let mut order = SettlementOrder::new_pending(
            id.to_string(),
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
        // Drive the order to the requested state through legal transitions.
        match status {
            OrderStatus::Pending => {}
            OrderStatus::Processing => order.transition(OrderStatus::Processing).unwrap(),
            OrderStatus::Completed => {
                order.transition(OrderStatus::Processing).unwrap();
                order.transition(OrderStatus::Completed).unwrap();
            }
            other => panic!("unsupported test state {other:?}"),
        }
        order
    }

    #[test]
    fn fiat_contract_units_follow_currency_convention() {
        use alloy::primitives::U256;
        assert_eq!(fiat_to_contract_units(9.6, "USD"), U256::from(960u64));
        assert_eq!(
            fiat_to_contract_units(150_000.0, "IDR"),
            U256::from(150_000u64)
        );
    }

    #[tokio::test]
    async fn completed_orders_settle_as_a_no_op() {
        let storage = test_storage();
        let repo = OrderRepository::new(&storage);
        repo.create(&sample_order("ord-done", OrderStatus::Completed))
            .unwrap();

        let engine = engine_without_chain(storage.clone());
        engine.settle("ord-done").await.expect("no-op settle");

        cleanup(&storage);
    }

    #[tokio::test]
    async fn pending_orders_are_not_settleable() {
        let storage = test_storage();
        let repo = OrderRepository::new(&storage);
        repo.create(&sample_order("ord-pending", OrderStatus::Pending))
            .unwrap();

        let engine = engine_without_chain(storage.clone());
        let err = engine.settle("ord-pending").await.expect_err("must refuse");
        assert!(matches!(err, SettlementError::NotSettleable(_, _)));

        cleanup(&storage);
    }

    #[tokio::test]
    async fn missing_chain_configuration_is_reported_without_failing_the_order() {
        let storage = test_storage();
        let repo = OrderRepository::new(&storage);
        repo.create(&sample_order("ord-x", OrderStatus::Processing))
            .unwrap();

        let engine = engine_without_chain(storage.clone());
        let err = engine.settle("ord-x").await.expect_err("not configured");
        assert!(matches!(err, SettlementError::NotConfigured));

        // The order stays in processing for a later, configured attempt.
        let order = repo.get("ord-x").unwrap();
        assert_eq!(order.status, OrderStatus::Processing);

        cleanup(&storage);
    }

    #[tokio::test]
    async fn unknown_orders_surface_a_storage_error() {
        let storage = test_storage();
        let engine = engine_without_chain(storage.clone());
        let err = engine.settle("no-such-order").await.expect_err("missing");
        assert!(matches!(err, SettlementError::Storage(_)));
        cleanup(&storage);
    }
}
