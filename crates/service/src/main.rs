//! The `permakey` JSON-RPC server.

use clap::Parser;
use permakey_service::{Args, Config, from_config, http, process};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_args(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    let _guards = process::init_logging(config.log_level, config.log_dir.as_deref());
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        gateway = %config.gateway_url,
        rpc = %config.polygon_rpc_url,
        router = %config.router,
        key_bits = config.settings.key_bits,
        funding_wallet = ?config.settings.funding_wallet.as_ref().map(|w| w.address()),
        "service starting up"
    );

    let state = match from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating service state: {e}");
            std::process::exit(3);
        }
    };

    let (graceful_waiter, _shutdown_tx, shutdown_rx) = process::graceful_shutdown_blocker()?;
    http::run(config.listen_addr, config.log_level, state, shutdown_rx).await?;
    let _ = graceful_waiter.await;

    tracing::info!("service stopped");
    Ok(())
}
