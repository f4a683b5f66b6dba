// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;

use device_management::{
    api::router, auth::TokenVerifier, config::Settings, db, objectstore::ObjectStore,
    state::AppState,
};

#[tokio::main]
async fn main() {
    let settings = Settings::from_env();
    init_tracing();

    let mut state = AppState::new(settings.clone());

    match db::connect(&settings.database) {
        Some(pool) => state = state.with_db(pool),
        None => tracing::warn!(
            "PostgreSQL is not configured (PSQL_*); provisioning and audit logging are disabled"
        ),
    }

    match ObjectStore::from_settings(&settings).await {
        Some(store) => state = state.with_object_store(store),
        None => tracing::warn!(
            "S3 bucket is not configured (DM_S3_BUCKET); enrollment uploads and binaries are disabled"
        ),
    }

    match TokenVerifier::from_settings(&settings.auth) {
        Some(verifier) => state = state.with_verifier(verifier),
        None => tracing::warn!(
            "JWT verification is not configured (KEYCLOAK_ISSUER_URL); endpoints requiring auth will fail closed"
        ),
    }

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!("Device Management API listening on http://{addr} (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");
}

/// Initialize tracing from `RUST_LOG` and `LOG_FORMAT`.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received, stopping server");
}
