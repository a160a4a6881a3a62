// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::{Router, middleware as axum_middleware};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use courier_config::ServerConfig;
use courier_core::{AuthAdapter, CourierError};
use courier_scheduler::Scheduler;
use courier_session::SessionRegistry;
use courier_storage::MediaStaging;

use crate::accounts::UserAccounts;
use crate::auth::{JwtAuthenticator, auth_middleware};
use crate::{handlers, ws};

/// Largest accepted media upload.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: SessionRegistry,
    pub scheduler: Scheduler,
    pub media: Arc<MediaStaging>,
    pub auth: Arc<dyn AuthAdapter>,
    /// Enables `/auth/*`; those routes answer 404 without it.
    pub accounts: Option<Accounts>,
    /// Process start, for uptime on `/health`.
    pub started: Instant,
}

/// User storage plus the authenticator that signs their login tokens.
#[derive(Clone)]
pub struct Accounts {
    pub users: Arc<UserAccounts>,
    pub issuer: Arc<JwtAuthenticator>,
}

impl GatewayState {
    pub fn new(
        registry: SessionRegistry,
        scheduler: Scheduler,
        media: Arc<MediaStaging>,
        auth: Arc<dyn AuthAdapter>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            media,
            auth,
            accounts: None,
            started: Instant::now(),
        }
    }

    pub fn with_accounts(mut self, users: Arc<UserAccounts>, issuer: Arc<JwtAuthenticator>) -> Self {
        self.accounts = Some(Accounts { users, issuer });
        self
    }
}

/// Build the full application router.
///
/// - GET /health (public)
/// - POST /auth/register, POST /auth/login (public)
/// - GET /auth/profile (token required)
/// - /api/* (token required)
/// - GET /ws (token required, usually passed as `?token=`)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/auth/profile", get(handlers::profile))
        .route("/api/schedule", post(handlers::create_schedule))
        .route("/api/schedules", get(handlers::list_schedules))
        .route("/api/schedule/{id}", delete(handlers::delete_schedule))
        .route(
            "/api/media",
            post(handlers::upload_media).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/session", get(handlers::session_status))
        .route("/api/send-message", post(handlers::send_message))
        .route("/api/send-image", post(handlers::send_image))
        .route("/api/send-video", post(handlers::send_video))
        .route("/api/send-document", post(handlers::send_document))
        .route("/api/send-sticker", post(handlers::send_sticker))
        .route("/ws", get(ws::ws_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state.auth),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Serve the gateway until `shutdown` is cancelled.
pub async fn serve(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), CourierError> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!(addr = %addr, "gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| CourierError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("gateway stopped");
    Ok(())
}
