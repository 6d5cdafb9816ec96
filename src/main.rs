// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketplace Receipts API Server
//!
//! Records app installs, signs and verifies install receipts, and serves
//! discovery recommendations.

use marketplace_receipts::{
    config::{Config, DbBackend},
    db::{seed::SeedData, Db, FirestoreDb, MemoryDb},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Marketplace Receipts API");

    let db = match config.db_backend {
        DbBackend::Firestore => Db::Firestore(FirestoreDb::new(&config.gcp_project_id).await?),
        DbBackend::Memory => {
            let memory = MemoryDb::new();
            if let Some(path) = &config.seed_data_path {
                tracing::info!(path = %path, "Loading seed data");
                SeedData::load_from_file(path)?.apply(&memory).await?;
            }
            tracing::warn!("Using in-memory database; data is lost on restart");
            Db::Memory(memory)
        }
    };

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db)?);
    tracing::info!(
        kid = %state.verifier.key_id(),
        remote_signer = state.issuer.signer().is_remote(),
        "Receipt signing initialized"
    );

    // Build router
    let app = marketplace_receipts::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("marketplace_receipts=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
