// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! EVM integration: chain client, payment gateway adapter, swap executor,
//! and the callback-signing capability.

pub mod client;
pub mod gateway;
pub mod signing;
pub mod swap;
pub mod types;

pub use client::{ChainClient, ChainClientError, SignerProvider};
pub use gateway::{GatewayError, PaymentGateway, PaymentStatusCode};
pub use signing::{CallbackSigner, LocalCallbackSigner};
pub use swap::{SwapError, SwapExecutor};
pub use types::{eth_to_wei, format_units, network_by_name, to_units, NetworkConfig};
