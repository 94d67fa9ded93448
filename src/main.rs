use std::{sync::Arc, time::Duration};
use storefront_gateway::{
    AppState, HttpUserSync, IdentityState, JwtIdentityProvider, SyncState,
    config::{AppConfig, Env},
    create_router, spawn_sweeper,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, identity provider, backend sync client
/// and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging
    // RUST_LOG wins; otherwise a sensible default for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storefront_gateway=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Gateway starting in {:?} mode", config.env);

    // 3. Identity Provider & Backend Sync
    let identity = Arc::new(JwtIdentityProvider::new(&config)) as IdentityState;
    let sync = Arc::new(HttpUserSync::new(&config.backend_url)) as SyncState;
    tracing::info!(backend = %config.backend_url, "user sync endpoint configured");

    // 4. State Assembly
    // Rejects denial destinations that sit behind a gate.
    let bind_addr = config.bind_addr.clone();
    let sweep_period = (config.session_ttl / 4).max(Duration::from_secs(1));
    let app_state = AppState::new(config, identity, sync)
        .expect("FATAL: invalid gate configuration. Check SIGN_IN_PATH / UNAUTHORIZED_PATH.");

    // Idle browser sessions are evicted in the background.
    let _sweeper = spawn_sweeper(&app_state.sessions, sweep_period);

    // 5. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: failed to bind listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: server terminated unexpectedly");
}
