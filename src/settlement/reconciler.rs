// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! Webhook reconciler.
//!
//! Translates asynchronous provider notifications into settlement order
//! transitions. The handler persists the transition synchronously and then
//! submits a job to the worker pool; the HTTP ack returns before any chain
//! work happens so provider webhook deliveries never time out on us.
//!
//! When no persisted order matches a notification (a provider webhook can
//! outrace our own write), the reconciler degrades to deriving settlement
//! parameters directly from the payload instead of rejecting the
//! notification: the buyer wallet is recovered from the order-reference
//! convention and amounts come from a fresh quote.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::Config;
use crate::pricing::{QuoteEngine, QuoteError, QuoteSide};
use crate::providers::{
    midtrans, NormalizedNotification, PaymentProvider, ProviderError, ProviderPayload,
    ProviderStatus,
};
use crate::settlement::order::{
    InvalidTransition, OrderStatus, SettlementMode, SettlementOrder,
};
use crate::storage::{JsonStorage, OrderRepository, StorageError};

use super::worker::SettlementQueue;

/// What the reconciler did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AckAction {
    /// Order advanced and a settlement job was queued.
    SettlementQueued,
    /// Order moved to failed on a provider failure status.
    MarkedFailed,
    /// Nothing to do (pending status, duplicate delivery, terminal order).
    Ignored,
    /// No matching order; settlement derived from the payload and queued.
    DerivedQueued,
}

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookAck {
    /// The affected order, when one was found or derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub action: AckAction,
}

/// Errors surfaced to the webhook handler.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Quote(#[from] QuoteError),
}

/// External order reference under the correlation convention:
/// `<prefix><buyer_wallet>-<nonce>`.
pub fn order_reference(prefix: &str, buyer_wallet: &str, nonce: u64) -> String {
    format!("{prefix}{buyer_wallet}-{nonce}")
}

/// Recover the buyer wallet from an external order reference.
pub fn wallet_from_order_ref(external_id: &str, prefix: &str) -> Option<String> {
    use std::str::FromStr;

    let rest = external_id.strip_prefix(prefix)?;
    let wallet = rest.split('-').next()?;
    alloy::primitives::Address::from_str(wallet).ok()?;
    Some(wallet.to_string())
}

/// Webhook reconciler driving the settlement order state machine.
pub struct Reconciler {
    storage: Arc<JsonStorage>,
    queue: SettlementQueue,
    quoter: Option<Arc<QuoteEngine>>,
    config: Arc<Config>,
}

impl Reconciler {
    /// Wire the reconciler's collaborators.
    pub fn new(
        storage: Arc<JsonStorage>,
        queue: SettlementQueue,
        quoter: Option<Arc<QuoteEngine>>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            storage,
            queue,
            quoter,
            config,
        }
    }

    /// Handle one raw webhook delivery.
    pub async fn handle(
        &self,
        provider: PaymentProvider,
        raw: &[u8],
    ) -> Result<WebhookAck, ReconcileError> {
        let payload = ProviderPayload::decode(provider, raw)?;

        if let ProviderPayload::Midtrans(notification) = &payload {
            match self.config.midtrans_server_key.as_deref() {
                Some(server_key) => {
                    if !midtrans::verify_signature(notification, server_key) {
                        warn!(
                            order_ref = %notification.order_id,
                            "rejecting Midtrans notification with bad signature"
                        );
                        return Err(ProviderError::InvalidSignature.into());
                    }
                }
                None => {
                    // Transak events are unsigned by contract; for Midtrans
                    // this only happens when the server key is missing.
                    warn!("MIDTRANS_SERVER_KEY not set, accepting unverified notification");
                }
            }
        }

        let note = payload.normalize();
        info!(
            provider = provider.as_str(),
            external_order_id = %note.external_order_id,
            status = %note.raw_status,
            "webhook notification received"
        );

        let repo = OrderRepository::new(&self.storage);
        match repo.find_by_external_ref(&note.external_order_id) {
            Ok(order) => self.apply(&repo, order, &note),
            Err(StorageError::NotFound(_)) => self.process_unmatched(provider, &note).await,
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a notification to a persisted order.
    fn apply(
        &self,
        repo: &OrderRepository<'_>,
        mut order: SettlementOrder,
        note: &NormalizedNotification,
    ) -> Result<WebhookAck, ReconcileError> {
        let order_id = order.order_id.clone();

        match note.status {
            ProviderStatus::Pending => {
                info!(order_id = %order_id, "provider still pending, nothing to do");
                Ok(WebhookAck {
                    order_id: Some(order_id),
                    action: AckAction::Ignored,
                })
            }
            ProviderStatus::Failed => {
                if order.status.is_terminal() || order.status == OrderStatus::Completed {
                    info!(order_id = %order_id, "failure notification for settled order ignored");
                    return Ok(WebhookAck {
                        order_id: Some(order_id),
                        action: AckAction::Ignored,
                    });
                }
                order.fail(format!("provider reported status `{}`", note.raw_status))?;
                repo.update(&order)?;
                info!(order_id = %order_id, raw_status = %note.raw_status, "order failed by provider");
                Ok(WebhookAck {
                    order_id: Some(order_id),
                    action: AckAction::MarkedFailed,
                })
            }
            ProviderStatus::Paid => {
                match order.status {
                    OrderStatus::Completed | OrderStatus::Failed | OrderStatus::Refunded => {
                        info!(order_id = %order_id, "duplicate notification for settled order ignored");
                        Ok(WebhookAck {
                            order_id: Some(order_id),
                            action: AckAction::Ignored,
                        })
                    }
                    OrderStatus::Processing | OrderStatus::SwapPending => {
                        // A settlement task is already in flight; queueing a
                        // second would race it for the same payment id.
                        info!(order_id = %order_id, "settlement already in flight, duplicate ignored");
                        Ok(WebhookAck {
                            order_id: Some(order_id),
                            action: AckAction::Ignored,
                        })
                    }
                    OrderStatus::ReadyForSwap => {
                        // Re-queue: the earlier job may have been dropped on
                        // a full queue.
                        self.queue.submit(order_id.clone());
                        Ok(WebhookAck {
                            order_id: Some(order_id),
                            action: AckAction::SettlementQueued,
                        })
                    }
                    OrderStatus::Pending
                    | OrderStatus::ProviderInitiated
                    | OrderStatus::ProviderCompleted => {
                        advance_for_settlement(&mut order)?;
                        repo.update(&order)?;
                        self.queue.submit(order_id.clone());
                        Ok(WebhookAck {
                            order_id: Some(order_id),
                            action: AckAction::SettlementQueued,
                        })
                    }
                }
            }
        }
    }

    /// Degraded path: derive an order from the notification itself.
    async fn process_unmatched(
        &self,
        provider: PaymentProvider,
        note: &NormalizedNotification,
    ) -> Result<WebhookAck, ReconcileError> {
        if note.status != ProviderStatus::Paid {
            info!(
                external_order_id = %note.external_order_id,
                "no matching order and nothing to settle, ignoring"
            );
            return Ok(WebhookAck {
                order_id: None,
                action: AckAction::Ignored,
            });
        }

        let Some(buyer_wallet) =
            wallet_from_order_ref(&note.external_order_id, &self.config.order_ref_prefix)
        else {
            warn!(
                external_order_id = %note.external_order_id,
                "unmatched notification without a recoverable wallet, ignoring"
            );
            return Ok(WebhookAck {
                order_id: None,
                action: AckAction::Ignored,
            });
        };

        let Some(quoter) = self.quoter.as_deref() else {
            warn!(
                external_order_id = %note.external_order_id,
                "cannot derive settlement without a quote engine, ignoring"
            );
            return Ok(WebhookAck {
                order_id: None,
                action: AckAction::Ignored,
            });
        };

        let quote = quoter
            .quote(QuoteSide::FiatAmount(note.gross_amount), &note.currency)
            .await?;

        let settlement_mode = match provider {
            PaymentProvider::Midtrans => SettlementMode::DirectTransfer,
            PaymentProvider::Transak => SettlementMode::SwapMediated,
        };

        let mut order = SettlementOrder::new_pending(
            uuid::Uuid::new_v4().to_string(),
            buyer_wallet,
            quote.fiat_currency.clone(),
            quote.fiat_amount,
            quote.eth_amount,
            quote.token_amount,
            quote.min_token_amount,
            self.config.settlement_token_symbol.clone(),
            settlement_mode,
            quote.gas_fee_eth,
            quote.gas_fee_fiat,
        );
        order.external_payment_ref = Some(note.external_order_id.clone());
        advance_for_settlement(&mut order)?;

        let repo = OrderRepository::new(&self.storage);
        repo.create(&order)?;
        self.queue.submit(order.order_id.clone());

        warn!(
            order_id = %order.order_id,
            external_order_id = %note.external_order_id,
            "settlement derived from unmatched notification"
        );
        Ok(WebhookAck {
            order_id: Some(order.order_id),
            action: AckAction::DerivedQueued,
        })
    }
}

/// Advance an order to its settleable state after a paid notification.
fn advance_for_settlement(order: &mut SettlementOrder) -> Result<(), InvalidTransition> {
    match order.settlement_mode {
        SettlementMode::DirectTransfer => order.transition(OrderStatus::Processing),
        SettlementMode::SwapMediated => {
            if order.status == OrderStatus::Pending {
                order.transition(OrderStatus::ProviderInitiated)?;
            }
            if order.status == OrderStatus::ProviderInitiated {
                order.transition(OrderStatus::ProviderCompleted)?;
            }
            order.transition(OrderStatus::ReadyForSwap)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::worker::{Settle, SettlementPool};
    use crate::storage::StoragePaths;
    use async_trait::async_trait;
    use std::env;
    use std::fs;
    use tokio_util::sync::CancellationToken;

    struct NeverSettler;

    #[async_trait]
    impl Settle for NeverSettler {
        async fn settle(&self, _order_id: &str) -> Result<(), super::super::engine::SettlementError> {
            Ok(())
        }
    }

    fn test_storage() -> Arc<JsonStorage> {
        let dir = env::temp_dir().join(format!("rampline-reconciler-{}", uuid::Uuid::new_v4()));
        let mut storage = JsonStorage::new(StoragePaths::new(&dir));
        storage.initialize().expect("initialize test storage");
        Arc::new(storage)
    }

    fn cleanup(storage: &JsonStorage) {
        let _ = fs::remove_dir_all(storage.paths().root());
    }

    /// Queue with no workers so submitted jobs stay put during a test.
    fn idle_queue() -> SettlementQueue {
        SettlementPool::start(Arc::new(NeverSettler), 0, 16, CancellationToken::new())
    }

    fn reconciler(storage: Arc<JsonStorage>, config: Config) -> Reconciler {
        Reconciler::new(storage, idle_queue(), None, Arc::new(config))
    }

    fn unsigned_config() -> Config {
        let mut config = Config::from_env();
        config.midtrans_server_key = None;
        config
    }

    fn stored_order(
        storage: &JsonStorage,
        id: &str,
        external_ref: &str,
        mode: SettlementMode,
    ) -> SettlementOrder {
        let mut order = SettlementOrder::new_pending(
            id.to_string(),
            "0x00000000000000000000000000000000000000aa".to_string(),
            "IDR".to_string(),
            150_000.0,
            0.005,
            100.0,
            97.0,
            "RMP".to_string(),
            mode,
            0.000_15,
            4_500.0,
        );
        order.external_payment_ref = Some(external_ref.to_string());
        OrderRepository::new(storage).create(&order).unwrap();
        order
    }

    fn midtrans_body(order_ref: &str, status: &str) -> Vec<u8> {
        serde_json::json!({
            "order_id": order_ref,
            "transaction_status": status,
            "status_code": "200",
            "gross_amount": "150000.00",
            "currency": "IDR"
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn settlement_notification_advances_and_queues() {
        let storage = test_storage();
        stored_order(&storage, "ord-1", "mt-ref-1", SettlementMode::DirectTransfer);
        let reconciler = reconciler(storage.clone(), unsigned_config());

        let ack = reconciler
            .handle(PaymentProvider::Midtrans, &midtrans_body("mt-ref-1", "settlement"))
            .await
            .expect("handle");

        assert_eq!(ack.action, AckAction::SettlementQueued);
        let order = OrderRepository::new(&storage).get("ord-1").unwrap();
        assert_eq!(order.status, OrderStatus::Processing);

        cleanup(&storage);
    }

    #[tokio::test]
    async fn expire_notification_fails_the_order_with_the_literal_status() {
        let storage = test_storage();
        stored_order(&storage, "ord-1", "mt-ref-1", SettlementMode::DirectTransfer);
        let reconciler = reconciler(storage.clone(), unsigned_config());

        let ack = reconciler
            .handle(PaymentProvider::Midtrans, &midtrans_body("mt-ref-1", "expire"))
            .await
            .expect("handle");

        assert_eq!(ack.action, AckAction::MarkedFailed);
        let order = OrderRepository::new(&storage).get("ord-1").unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert!(order.error_detail.contains("expire"));
        assert!(order.chain_tx_hash.is_none());

        cleanup(&storage);
    }

    #[tokio::test]
    async fn pending_notification_is_an_idempotent_no_op() {
        let storage = test_storage();
        stored_order(&storage, "ord-1", "mt-ref-1", SettlementMode::DirectTransfer);
        let reconciler = reconciler(storage.clone(), unsigned_config());

        let ack = reconciler
            .handle(PaymentProvider::Midtrans, &midtrans_body("mt-ref-1", "pending"))
            .await
            .expect("handle");

        assert_eq!(ack.action, AckAction::Ignored);
        let order = OrderRepository::new(&storage).get("ord-1").unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        cleanup(&storage);
    }

    #[tokio::test]
    async fn duplicate_settlement_notification_does_not_queue_twice() {
        let storage = test_storage();
        stored_order(&storage, "ord-1", "mt-ref-1", SettlementMode::DirectTransfer);
        let reconciler = reconciler(storage.clone(), unsigned_config());

        let first = reconciler
            .handle(PaymentProvider::Midtrans, &midtrans_body("mt-ref-1", "settlement"))
            .await
            .expect("first");
        let second = reconciler
            .handle(PaymentProvider::Midtrans, &midtrans_body("mt-ref-1", "settlement"))
            .await
            .expect("second");

        assert_eq!(first.action, AckAction::SettlementQueued);
        assert_eq!(second.action, AckAction::Ignored);

        cleanup(&storage);
    }

    #[tokio::test]
    async fn transak_completion_walks_the_onramp_branch() {
        let storage = test_storage();
        stored_order(&storage, "ord-1", "rl-ref-1", SettlementMode::SwapMediated);
        let reconciler = reconciler(storage.clone(), unsigned_config());

        let body = serde_json::json!({
            "eventID": "ORDER_COMPLETED",
            "webhookData": {
                "id": "tk-1",
                "status": "COMPLETED",
                "fiatAmount": 25.5,
                "fiatCurrency": "EUR",
                "partnerOrderId": "rl-ref-1"
            }
        })
        .to_string();

        let ack = reconciler
            .handle(PaymentProvider::Transak, body.as_bytes())
            .await
            .expect("handle");

        assert_eq!(ack.action, AckAction::SettlementQueued);
        let order = OrderRepository::new(&storage).get("ord-1").unwrap();
        assert_eq!(order.status, OrderStatus::ReadyForSwap);

        cleanup(&storage);
    }

    #[tokio::test]
    async fn bad_midtrans_signature_is_rejected() {
        let storage = test_storage();
        stored_order(&storage, "ord-1", "mt-ref-1", SettlementMode::DirectTransfer);

        let mut config = Config::from_env();
        config.midtrans_server_key = Some("server-key".to_string());
        let reconciler = reconciler(storage.clone(), config);

        let err = reconciler
            .handle(PaymentProvider::Midtrans, &midtrans_body("mt-ref-1", "settlement"))
            .await
            .expect_err("unsigned body must fail");
        assert!(matches!(
            err,
            ReconcileError::Provider(ProviderError::InvalidSignature)
        ));

        cleanup(&storage);
    }

    #[tokio::test]
    async fn correctly_signed_midtrans_notification_is_accepted() {
        let storage = test_storage();
        stored_order(&storage, "ord-1", "mt-ref-1", SettlementMode::DirectTransfer);

        let mut config = Config::from_env();
        config.midtrans_server_key = Some("server-key".to_string());
        let reconciler = reconciler(storage.clone(), config);

        let signature = midtrans::compute_signature("mt-ref-1", "200", "150000.00", "server-key");
        let body = serde_json::json!({
            "order_id": "mt-ref-1",
            "transaction_status": "settlement",
            "status_code": "200",
            "gross_amount": "150000.00",
            "currency": "IDR",
            "signature_key": signature
        })
        .to_string();

        let ack = reconciler
            .handle(PaymentProvider::Midtrans, body.as_bytes())
            .await
            .expect("signed body accepted");
        assert_eq!(ack.action, AckAction::SettlementQueued);

        cleanup(&storage);
    }

    #[tokio::test]
    async fn unmatched_notification_without_quoter_is_acked_and_ignored() {
        let storage = test_storage();
        let reconciler = reconciler(storage.clone(), unsigned_config());

        let ack = reconciler
            .handle(
                PaymentProvider::Midtrans,
                &midtrans_body("rl-0x00000000000000000000000000000000000000aa-17", "settlement"),
            )
            .await
            .expect("degraded path still acks");
        assert_eq!(ack.action, AckAction::Ignored);

        cleanup(&storage);
    }

    #[test]
    fn wallet_recovery_follows_the_reference_convention() {
        let wallet = "0x00000000000000000000000000000000000000aa";
        let reference = order_reference("rl-", wallet, 1_700_000_000);
        assert_eq!(
            wallet_from_order_ref(&reference, "rl-").as_deref(),
            Some(wallet)
        );

        assert!(wallet_from_order_ref("other-prefix-1", "rl-").is_none());
        assert!(wallet_from_order_ref("rl-nothex-1", "rl-").is_none());
    }
}
