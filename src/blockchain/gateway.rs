// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! On-chain payment gateway adapter.
//!
//! Wraps the payment-gateway contract that escrows fiat-funded token
//! payments keyed by the settlement order id. Registration is idempotent
//! with respect to that key: `exists` gates every `create`, and a create
//! that reverts because the key appeared concurrently is reported as
//! [`GatewayError::AlreadyRegistered`] rather than a hard failure, so
//! concurrent settlement attempts converge.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};

use super::signing::{CallbackSigner, SigningError};

sol! {
    #[sol(rpc)]
    interface IPaymentGateway {
        function createPayment(string paymentId, uint256 tokenAmount, uint256 fiatAmount, string gateway, address destinationWallet) external payable;
        function processPaymentCallback(string paymentId, uint8 status, bytes signature) external;
        function getPaymentStatus(string paymentId) external view returns (uint8);
        function payments(string paymentId) external view returns (address buyer, address destinationWallet, uint256 tokenAmount, uint256 fiatAmount, uint256 timestamp, string gateway, uint8 status, uint256 gasFundAmount, bool gasRefunded);
        function requiredGasDeposit() external view returns (uint256);
        function tokenBalance(address account) external view returns (uint256);
    }
}

/// Payment status codes as stored by the gateway contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatusCode {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatusCode {
    /// Contract-side numeric code.
    pub fn as_u8(self) -> u8 {
        match self {
            PaymentStatusCode::Pending => 0,
            PaymentStatusCode::Completed => 1,
            PaymentStatusCode::Failed => 2,
            PaymentStatusCode::Refunded => 3,
        }
    }

    /// Decode a contract-side numeric code.
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(PaymentStatusCode::Pending),
            1 => Some(PaymentStatusCode::Completed),
            2 => Some(PaymentStatusCode::Failed),
            3 => Some(PaymentStatusCode::Refunded),
            _ => None,
        }
    }
}

/// Read-only view of an on-chain payment record.
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub buyer: Address,
    pub destination_wallet: Address,
    pub token_amount: U256,
    pub fiat_amount: U256,
    pub timestamp: U256,
    pub gateway: String,
    pub status: Option<PaymentStatusCode>,
    pub gas_fund_amount: U256,
    pub gas_refunded: bool,
}

/// Errors raised by the payment gateway adapter.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Payment {0} is already registered on-chain")]
    AlreadyRegistered(String),

    #[error("Chain call exceeded the {0}s deadline")]
    Timeout(u64),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Payment gateway contract adapter.
pub struct PaymentGateway<P> {
    contract: IPaymentGateway::IPaymentGatewayInstance<P>,
    gateway_name: String,
    signer: Arc<dyn CallbackSigner>,
    call_timeout: Duration,
}

impl<P: Provider + Clone> PaymentGateway<P> {
    /// Create a new adapter over an already-connected provider.
    ///
    /// The provider carries the service wallet, so the "private key present"
    /// precondition is enforced by construction.
    pub fn new(
        provider: &P,
        contract_address: &str,
        gateway_name: impl Into<String>,
        signer: Arc<dyn CallbackSigner>,
        call_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let address = Address::from_str(contract_address)
            .map_err(|e| GatewayError::InvalidAddress(e.to_string()))?;

        Ok(Self {
            contract: IPaymentGateway::new(address, provider.clone()),
            gateway_name: gateway_name.into(),
            signer,
            call_timeout,
        })
    }

    /// The callback signer's chain address.
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn with_deadline<T, F>(&self, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| GatewayError::Timeout(self.call_timeout.as_secs()))?
    }

    /// True iff the contract holds a non-zero token amount for the id.
    ///
    /// This is the idempotency gate consulted before every creation.
    pub async fn exists(&self, payment_id: &str) -> Result<bool, GatewayError> {
        let record = self
            .with_deadline(async {
                self.contract
                    .payments(payment_id.to_string())
                    .call()
                    .await
                    .map_err(|e| GatewayError::Rpc(e.to_string()))
            })
            .await?;

        Ok(record.tokenAmount > U256::ZERO)
    }

    /// Register a pending payment on-chain, funding it with `gas_deposit`.
    ///
    /// Must only be called after [`exists`](Self::exists) returned false.
    /// Waits for the transaction to be mined; a zero-status receipt is
    /// re-classified as [`GatewayError::AlreadyRegistered`] when the record
    /// appeared concurrently, otherwise reported as a terminal revert.
    pub async fn create(
        &self,
        payment_id: &str,
        token_amount: U256,
        fiat_amount: U256,
        destination_wallet: &str,
        gas_deposit: U256,
    ) -> Result<String, GatewayError> {
        let destination = Address::from_str(destination_wallet)
            .map_err(|e| GatewayError::InvalidAddress(e.to_string()))?;

        let receipt = self
            .with_deadline(async {
                self.contract
                    .createPayment(
                        payment_id.to_string(),
                        token_amount,
                        fiat_amount,
                        self.gateway_name.clone(),
                        destination,
                    )
                    .value(gas_deposit)
                    .send()
                    .await
                    .map_err(|e| GatewayError::Rpc(e.to_string()))?
                    .get_receipt()
                    .await
                    .map_err(|e| GatewayError::Rpc(e.to_string()))
            })
            .await?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        if !receipt.status() {
            if self.exists(payment_id).await.unwrap_or(false) {
                return Err(GatewayError::AlreadyRegistered(payment_id.to_string()));
            }
            return Err(GatewayError::Reverted(format!(
                "createPayment reverted in {tx_hash}"
            )));
        }

        tracing::info!(
            payment_id = %payment_id,
            tx_hash = %tx_hash,
            "payment registered on-chain"
        );
        Ok(tx_hash)
    }

    /// Register a payment only when the id is not yet on-chain.
    ///
    /// Returns `Ok(None)` when the record already existed (idempotent no-op)
    /// and `Ok(Some(tx_hash))` after a fresh registration.
    pub async fn create_if_absent(
        &self,
        payment_id: &str,
        token_amount: U256,
        fiat_amount: U256,
        destination_wallet: &str,
        gas_deposit: U256,
    ) -> Result<Option<String>, GatewayError> {
        if self.exists(payment_id).await? {
            tracing::info!(payment_id = %payment_id, "payment already on-chain, skipping create");
            return Ok(None);
        }

        match self
            .create(
                payment_id,
                token_amount,
                fiat_amount,
                destination_wallet,
                gas_deposit,
            )
            .await
        {
            Ok(tx_hash) => Ok(Some(tx_hash)),
            Err(GatewayError::AlreadyRegistered(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Submit the completion callback.
    ///
    /// When no signature is supplied, the adapter signs the callback itself
    /// through the configured [`CallbackSigner`] (the service is the
    /// registered gateway signer for its own entry).
    pub async fn finalize(
        &self,
        payment_id: &str,
        status: PaymentStatusCode,
        signature: Option<Vec<u8>>,
    ) -> Result<String, GatewayError> {
        let signature = match signature {
            Some(bytes) => bytes,
            None => self.signer.sign_callback(payment_id, status.as_u8())?,
        };

        let receipt = self
            .with_deadline(async {
                self.contract
                    .processPaymentCallback(
                        payment_id.to_string(),
                        status.as_u8(),
                        signature.into(),
                    )
                    .send()
                    .await
                    .map_err(|e| GatewayError::Rpc(e.to_string()))?
                    .get_receipt()
                    .await
                    .map_err(|e| GatewayError::Rpc(e.to_string()))
            })
            .await?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        if !receipt.status() {
            return Err(GatewayError::Reverted(format!(
                "processPaymentCallback reverted in {tx_hash}"
            )));
        }

        tracing::info!(
            payment_id = %payment_id,
            status = status.as_u8(),
            tx_hash = %tx_hash,
            "payment callback finalized"
        );
        Ok(tx_hash)
    }

    /// The gas deposit the contract requires for new payments.
    pub async fn required_gas_deposit(&self) -> Result<U256, GatewayError> {
        self.with_deadline(async {
            self.contract
                .requiredGasDeposit()
                .call()
                .await
                .map_err(|e| GatewayError::Rpc(e.to_string()))
        })
        .await
    }

    /// Token balance the contract tracks for an address.
    pub async fn token_balance(&self, account: &str) -> Result<U256, GatewayError> {
        let account = Address::from_str(account)
            .map_err(|e| GatewayError::InvalidAddress(e.to_string()))?;

        self.with_deadline(async {
            self.contract
                .tokenBalance(account)
                .call()
                .await
                .map_err(|e| GatewayError::Rpc(e.to_string()))
        })
        .await
    }

    /// The contract-side status code for a payment.
    pub async fn payment_status(
        &self,
        payment_id: &str,
    ) -> Result<Option<PaymentStatusCode>, GatewayError> {
        let code = self
            .with_deadline(async {
                self.contract
                    .getPaymentStatus(payment_id.to_string())
                    .call()
                    .await
                    .map_err(|e| GatewayError::Rpc(e.to_string()))
            })
            .await?;

        Ok(PaymentStatusCode::from_u8(code))
    }

    /// Full on-chain payment record.
    pub async fn payment_details(&self, payment_id: &str) -> Result<PaymentDetails, GatewayError> {
        let record = self
            .with_deadline(async {
                self.contract
                    .payments(payment_id.to_string())
                    .call()
                    .await
                    .map_err(|e| GatewayError::Rpc(e.to_string()))
            })
            .await?;

        Ok(PaymentDetails {
            buyer: record.buyer,
            destination_wallet: record.destinationWallet,
            token_amount: record.tokenAmount,
            fiat_amount: record.fiatAmount,
            timestamp: record.timestamp,
            gateway: record.gateway,
            status: PaymentStatusCode::from_u8(record.status),
            gas_fund_amount: record.gasFundAmount,
            gas_refunded: record.gasRefunded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_the_contract_vocabulary() {
        assert_eq!(PaymentStatusCode::Pending.as_u8(), 0);
        assert_eq!(PaymentStatusCode::Completed.as_u8(), 1);
        assert_eq!(PaymentStatusCode::Failed.as_u8(), 2);
        assert_eq!(PaymentStatusCode::Refunded.as_u8(), 3);
    }

    #[test]
    fn status_codes_round_trip_and_reject_unknown() {
        for code in [
            PaymentStatusCode::Pending,
            PaymentStatusCode::Completed,
            PaymentStatusCode::Failed,
            PaymentStatusCode::Refunded,
        ] {
            assert_eq!(PaymentStatusCode::from_u8(code.as_u8()), Some(code));
        }
        assert_eq!(PaymentStatusCode::from_u8(4), None);
    }
}
