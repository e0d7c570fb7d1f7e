use std::net::SocketAddr;

use dotenvy::dotenv;
use tokio::task::JoinHandle;
use tracing::{error, info};

use bridge::bootstrap::app_context::{AppContext, AppServices};
use bridge::bootstrap::config::Config;
use bridge::infrastructure::source::build_data_source;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "bridge=debug,axum=info,tower_http=info".into()),
        )
        .init();

    let cfg = Config::from_env()?;
    info!(?cfg, "Starting port bridge");

    let source = build_data_source(&cfg).await?;
    let policy = cfg.delivery_policy();
    info!(
        backend = ?cfg.source_backend,
        item = %policy.item,
        feed = %policy.feed,
        dedupe = cfg.dedupe_continuous,
        "data_source_ready"
    );

    let ctx = AppContext::new(cfg.clone(), AppServices::new(source, policy));
    let app = bridge::presentation::router(ctx);

    let api_addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    info!(%api_addr, "HTTP API listening");
    let listener = tokio::net::TcpListener::bind(api_addr).await?;

    let api_handle: JoinHandle<anyhow::Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    });

    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(?e, "API server task failed"),
        Err(e) => error!(?e, "API server task panicked"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(?e, "ctrl_c_listener_failed");
        std::future::pending::<()>().await;
    }
    info!("shutdown_requested");
}
