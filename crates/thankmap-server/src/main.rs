use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use thankmap_gateway::Gateway;
use thankmap_gateway::rate_limit;
use thankmap_server::config::Config;

/// How often expired rate-limit entries are dropped.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "thankmap=debug,thankmap_server=debug,thankmap_gateway=debug,thankmap_api=debug,thankmap_db=info,tower_http=info".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(thankmap_db::Database::open(&config.db_path)?);

    let gateway = Gateway::new(db, config.gateway.clone());
    tokio::spawn(rate_limit::run_sweep_loop(gateway.limiter.clone(), SWEEP_INTERVAL));

    let app = thankmap_server::router(gateway, config.trust_proxy);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("ThankMap server listening on {}", addr);
    info!(
        "Cooldown {}s, jitter {} degrees, share links under {}",
        config.gateway.cooldown.as_secs(),
        config.gateway.jitter_degrees,
        config.gateway.share_base_url
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
