// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rampline_server::{
    api::router,
    blockchain::{
        network_by_name, CallbackSigner, ChainClient, LocalCallbackSigner, PaymentGateway,
        SwapExecutor,
    },
    config::Config,
    pricing::{QuoteEngine, RateCache},
    providers::MidtransClient,
    settlement::{Reconciler, SettlementEngine, SettlementPool},
    state::AppState,
    storage::{JsonStorage, StoragePaths},
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug"));

    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Arc::new(Config::from_env());

    // Storage is mandatory; refuse to start without a writable data dir.
    let mut storage = JsonStorage::new(StoragePaths::new(&config.data_dir));
    storage.initialize().expect("Failed to initialize order storage");
    let storage = Arc::new(storage);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build HTTP client");

    // Chain wiring is optional: without a key and gateway address the service
    // still quotes and records orders, but settlement stays parked.
    let network = network_by_name(&config.chain_network).unwrap_or_else(|| {
        warn!(network = %config.chain_network, "unknown CHAIN_NETWORK, defaulting to sepolia");
        rampline_server::blockchain::types::ETH_SEPOLIA
    });

    let mut chain: Option<Arc<ChainClient>> = None;
    let mut gateway = None;
    let mut swapper = None;

    match (
        config.service_private_key.as_deref(),
        config.gateway_contract_address.as_deref(),
    ) {
        (Some(private_key), Some(gateway_address)) => {
            match ChainClient::new(network, config.chain_rpc_url.as_deref(), private_key) {
                Ok(client) => {
                    let client = Arc::new(client);
                    let signer: Arc<dyn CallbackSigner> =
                        Arc::new(LocalCallbackSigner::new(client.signer().clone()));

                    match PaymentGateway::new(
                        client.provider(),
                        gateway_address,
                        config.gateway_name.clone(),
                        signer,
                        config.chain_call_timeout,
                    ) {
                        Ok(adapter) => gateway = Some(Arc::new(adapter)),
                        Err(e) => warn!(error = %e, "payment gateway disabled"),
                    }

                    if let (Some(router_addr), Some(weth), Some(token)) = (
                        config.swap_router_address.as_deref(),
                        config.wrapped_native_address.as_deref(),
                        config.settlement_token_address.as_deref(),
                    ) {
                        match SwapExecutor::new(
                            client.provider(),
                            router_addr,
                            weth,
                            token,
                            config.swap_deadline,
                            config.chain_call_timeout,
                        ) {
                            Ok(executor) => swapper = Some(Arc::new(executor)),
                            Err(e) => warn!(error = %e, "swap executor disabled"),
                        }
                    } else {
                        info!("swap executor not configured, swap-mediated settlement disabled");
                    }

                    chain = Some(client);
                }
                Err(e) => warn!(error = %e, "chain client disabled"),
            }
        }
        _ => warn!(
            "SERVICE_PRIVATE_KEY / GATEWAY_CONTRACT_ADDRESS not set, chain settlement disabled"
        ),
    }

    let rates = Arc::new(RateCache::new(http.clone(), config.fiat_rates_url.clone()));
    let quoter = Arc::new(QuoteEngine::new(
        http.clone(),
        rates,
        gateway.clone(),
        config.clone(),
    ));

    let shutdown = CancellationToken::new();
    let engine = Arc::new(SettlementEngine::new(
        storage.clone(),
        gateway,
        swapper,
        config.clone(),
    ));
    let queue = SettlementPool::start(
        engine,
        config.settlement_workers,
        config.settlement_queue_depth,
        shutdown.clone(),
    );
    let reconciler = Arc::new(Reconciler::new(
        storage.clone(),
        queue,
        Some(quoter.clone()),
        config.clone(),
    ));

    let midtrans = match config.midtrans_server_key.as_deref() {
        Some(server_key) => {
            match MidtransClient::new(config.midtrans_api_base_url.clone(), server_key) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!(error = %e, "Midtrans client disabled");
                    None
                }
            }
        }
        None => {
            info!("MIDTRANS_SERVER_KEY not set, Midtrans checkout disabled");
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        storage,
        quoter,
        reconciler,
        midtrans,
        chain,
    };
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");

    info!(%addr, "Rampline settlement service listening (docs at /docs)");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .expect("HTTP server failed");
}
