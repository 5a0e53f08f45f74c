#![forbid(unsafe_code)]

//! Draw keeper daemon entry point.

use std::sync::Arc;

use clap::Parser;
use keeper_daemon::{
    chain::{rpc::RpcClient, ContractClient, ContractClientOptions, RemoteStateClient},
    config::{Args, KeeperConfig},
    http,
    keeper::{spawn_keeper, KeeperLoop, KeeperSettings},
    status::{spawn_status_refresher, StatusCache, StatusProjector},
};
use tokio::{signal, sync::watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; flags and the real environment still apply.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&args.log))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = KeeperConfig::from_args(&args)?;
    // Node URLs often embed an API key; log the host only.
    tracing::info!(
        rpc_host = config.rpc_url.host_str().unwrap_or_default(),
        poll_secs = config.poll_interval.as_secs(),
        confirmation_timeout_secs = config.confirmation_timeout.as_secs(),
        cooldown_secs = config.cooldown.as_secs(),
        status_refresh_secs = config.status_refresh.as_secs(),
        "starting keeper"
    );

    let rpc = RpcClient::new(config.rpc_url.as_str(), config.rpc_timeout)?;
    let contract = ContractClient::new(
        rpc,
        config.contract_address,
        config.signer()?,
        ContractClientOptions {
            receipt_poll_interval: config.receipt_poll,
            gas_buffer_percent: config.gas_buffer_percent,
        },
    );
    tracing::info!(
        signer = contract.signer_address(),
        contract = contract.contract_address(),
        "contract client ready"
    );
    let client: Arc<dyn RemoteStateClient> = Arc::new(contract);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let keeper = KeeperLoop::new(Arc::clone(&client), KeeperSettings::from(&config));
    let keeper_task = spawn_keeper(keeper, shutdown_rx.clone());

    let cache = StatusCache::new();
    let projector = StatusProjector::new(Arc::clone(&client), cache.clone());
    let refresher_task = spawn_status_refresher(projector, config.status_refresh, shutdown_rx);

    let app = http::router(cache);

    tracing::info!(listen = %config.listen, "status api listening");
    axum::serve(tokio::net::TcpListener::bind(config.listen).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(keeper_task, refresher_task);
    tracing::info!("keeper stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown requested");
}
