use session_throttle_api::{
    app, config,
    session::{SessionManager, SessionManagerState, spawn_sweeper},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_throttle_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_config = config::load_config_with_fallback();
    let session_config = app_config.session.to_session_config();

    let manager = Arc::new(SessionManager::new(session_config.clone()));
    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        manager.clone(),
        session_config.sweep_interval,
        shutdown.child_token(),
    );

    let router = app::build_router(
        SessionManagerState::new(manager),
        &app_config.server.static_dir,
    );

    let port = config::port_from_env(app_config.server.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting session API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    sweeper.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolve on Ctrl-C or when the shutdown token is cancelled elsewhere
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                // keep serving until cancelled some other way
                shutdown.cancelled().await;
            }
            tracing::info!("Shutdown signal received");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
