// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pring Access API Server
//!
//! Serves the access-request workflow and the privacy-filtered profile
//! gate behind Pring's permanent QR profile links.

use pring_access::{
    config::{Config, StoreBackend},
    db::{AccessRequestStore, FirestoreDb, MemoryStore, ProfileStore},
    services::{AccessService, LogNotifier, Notifier, ResendNotifier},
    time_utils::SystemClock,
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
    tracing::info!(
        port = config.port,
        store = ?config.store_backend,
        "Starting Pring Access API"
    );

    let (requests, profiles): (Arc<dyn AccessRequestStore>, Arc<dyn ProfileStore>) =
        match config.store_backend {
            StoreBackend::Firestore => {
                let db = Arc::new(FirestoreDb::new(&config.gcp_project_id).await?);
                let requests: Arc<dyn AccessRequestStore> = db.clone();
                let profiles: Arc<dyn ProfileStore> = db;
                (requests, profiles)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                let requests: Arc<dyn AccessRequestStore> = store.clone();
                let profiles: Arc<dyn ProfileStore> = store;
                (requests, profiles)
            }
        };

    let notifier: Arc<dyn Notifier> = match &config.resend_api_key {
        Some(api_key) => {
            tracing::info!(from = %config.email_from, "Email notifications enabled");
            Arc::new(ResendNotifier::new(
                api_key.clone(),
                config.email_from.clone(),
            ))
        }
        None => {
            tracing::warn!("RESEND_API_KEY not set; notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let access = AccessService::new(
        requests,
        profiles,
        notifier,
        Arc::new(SystemClock),
        config.app_url.clone(),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        access,
    });

    // Build router
    let app = pring_access::routes::create_router(state);

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
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pring_access=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
