// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Wires the JSON stores, media staging, the bridge transport factory, the
//! session registry, the scheduler, user accounts and the gateway together,
//! then runs until SIGINT/SIGTERM.

use std::sync::Arc;

use courier_config::CourierConfig;
use courier_core::{CourierError, HealthStatus};
use courier_gateway::{GatewayState, JwtAuthenticator, UserAccounts};
use courier_scheduler::Scheduler;
use courier_session::SessionRegistry;
use courier_storage::{JsonStore, MediaStaging};
use courier_whatsapp::BridgeTransportFactory;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::shutdown;

/// Runs the `courier serve` command.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.server.log_level);

    let schedules = Arc::new(JsonStore::open(config.storage.schedules_path()));
    let sessions = Arc::new(JsonStore::open(config.storage.sessions_path()));
    let users = Arc::new(JsonStore::open(config.storage.users_path()));
    let media = Arc::new(MediaStaging::new(config.storage.media_dir.clone()).await?);
    info!(
        schedules = %schedules.path().display(),
        media = %media.dir().display(),
        "storage ready"
    );

    let factory = Arc::new(BridgeTransportFactory::new(&config.transport)?);
    match factory.client().health().await {
        HealthStatus::Healthy => info!(url = %config.transport.bridge_url, "bridge reachable"),
        status => warn!(url = %config.transport.bridge_url, ?status, "bridge not healthy yet"),
    }

    let registry = SessionRegistry::with_store(factory, sessions);
    let scheduler = Scheduler::new(
        schedules,
        Arc::new(registry.clone()),
        media.clone(),
        &config.scheduler,
    )?;

    let auth = Arc::new(JwtAuthenticator::new(&config.auth));
    if !auth.is_configured() {
        warn!("auth.jwt_secret is not set, every API request will be rejected");
    }

    let cancel = CancellationToken::new();
    shutdown::install_signal_handler(cancel.clone());

    scheduler.start().await;
    let accounts = Arc::new(UserAccounts::new(users));
    let state = GatewayState::new(registry.clone(), scheduler.clone(), media, auth.clone())
        .with_accounts(accounts, auth);
    let served = courier_gateway::serve(&config.server, state, cancel.clone()).await;
    cancel.cancel();

    scheduler.stop().await;
    registry.shutdown().await;
    info!("courier stopped");
    served
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides `server.log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    // Targets match by prefix, so this covers every courier_* crate.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
