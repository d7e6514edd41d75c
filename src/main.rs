use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trade_router::bootstrap::Deployment;
use trade_router::config::AppConfig;
use trade_router::router::api::create_api_router;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal router service error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration from environment")?;
    let admin = config.admin_address().context("derive administrator address")?;
    let listen_addr = config.listen_addr()?;
    let genesis = config.genesis().context("load genesis")?;

    let deployment =
        Deployment::from_genesis(&genesis, admin).context("deploy router and registry")?;
    let router = deployment.router.clone();

    let app = create_api_router(deployment)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("bind API server address {listen_addr}"))?;

    info!(
        address = %listen_addr,
        router = %router.address(),
        admin = %admin,
        genesis = ?config.genesis_path,
        "trade router online"
    );

    let heartbeat = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let stats = router.stats();
            info!(
                total_executions = stats.total_executions,
                successful = stats.successful_executions,
                failed = stats.failed_executions,
                success_rate = stats.success_rate,
                avg_execution_ms = ?stats.avg_execution_time_ms,
                "execution statistics"
            );
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve HTTP API")?;

    heartbeat.abort();
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl_c listener error");
    }
    info!("shutdown signal received, draining");
}

fn init_tracing() -> Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
