// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use courier_core::{
    CourierError, JobContent, JobId, OutboundMessage, PayloadKind, ScheduledJob, TenantIdentity,
};
use courier_scheduler::JobRequest;
use courier_session::SessionSnapshot;

use crate::accounts::UserProfile;
use crate::error::ApiError;
use crate::server::{Accounts, GatewayState};

/// Request body for POST /api/schedule.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleBody {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub message: Option<String>,
    /// RFC 3339 or naive local time in the scheduler's zone.
    #[serde(default)]
    pub time: String,
    #[serde(default, rename = "type")]
    pub kind: Option<PayloadKind>,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    /// `media` is a handle from POST /api/media, deleted once the job is done.
    #[serde(default)]
    pub temporary: bool,
}

/// Request body shared by the immediate-send routes.
#[derive(Debug, Default, Deserialize)]
pub struct SendBody {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(
        default,
        alias = "imageUrl",
        alias = "videoUrl",
        alias = "docUrl",
        alias = "stickerUrl"
    )]
    pub media: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub handle: String,
    pub size: usize,
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

/// Request body for POST /auth/register and POST /auth/login.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsBody {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: LoginUser,
}

fn accounts(state: &GatewayState) -> Result<&Accounts, ApiError> {
    state
        .accounts
        .as_ref()
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "user accounts are not enabled"))
}

/// POST /auth/register
pub async fn register(
    State(state): State<GatewayState>,
    Json(body): Json<CredentialsBody>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    accounts(&state)?
        .users
        .register(&body.username, &body.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "user created".into(),
            id: None,
        }),
    ))
}

/// POST /auth/login
///
/// The token's subject is the user id, so every tenant-scoped route acts on
/// that user's session and jobs.
pub async fn login(
    State(state): State<GatewayState>,
    Json(body): Json<CredentialsBody>,
) -> Result<Json<LoginResponse>, ApiError> {
    let accounts = accounts(&state)?;
    let user = accounts.users.login(&body.username, &body.password).await?;
    let token = accounts
        .issuer
        .mint(&user.tenant_id(), Some(user.username.as_str()), None)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: LoginUser {
            id: user.id,
            username: user.username,
        },
    }))
}

/// GET /auth/profile
pub async fn profile(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = accounts(&state)?
        .users
        .profile(identity.tenant_id.as_str())
        .await?;
    Ok(Json(profile))
}

/// POST /api/schedule
pub async fn create_schedule(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
    Json(body): Json<ScheduleBody>,
) -> Result<(StatusCode, Json<ScheduledJob>), ApiError> {
    let mut media = body.media;
    if body.temporary {
        let staged = match media.as_deref() {
            Some(handle) if state.media.is_staged(handle).await => state.media.resolve(handle),
            _ => None,
        };
        let Some(path) = staged else {
            return Err(CourierError::Validation(
                "temporary media must be uploaded through /api/media first".into(),
            )
            .into());
        };
        media = Some(path.display().to_string());
    }

    let request = JobRequest {
        recipient: body.number,
        payload_kind: body.kind.unwrap_or(PayloadKind::Text),
        content: JobContent {
            text: body.message,
            media,
            filename: body.filename,
            is_temporary_file: body.temporary,
        },
        due_at: body.time,
    };
    let job = state.scheduler.schedule(&identity.tenant_id, request).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/schedules
pub async fn list_schedules(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
) -> Result<Json<Vec<ScheduledJob>>, ApiError> {
    Ok(Json(state.scheduler.list(&identity.tenant_id).await?))
}

/// DELETE /api/schedule/{id}
pub async fn delete_schedule(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let job_id = JobId(id);
    if state.scheduler.cancel(&identity.tenant_id, &job_id).await? {
        Ok(Json(MessageResponse {
            message: "schedule deleted".into(),
            id: Some(job_id.0),
        }))
    } else {
        Err(CourierError::NotFound(format!("schedule {job_id}")).into())
    }
}

/// POST /api/media
///
/// The raw body is the file; `x-filename` optionally names it so the staged
/// copy keeps its extension.
pub async fn upload_media(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let original_name = headers.get("x-filename").and_then(|v| v.to_str().ok());
    let staged = state.media.stage(&body, original_name).await?;
    info!(tenant_id = %identity.tenant_id, size = staged.size, "media uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            handle: staged.handle,
            size: staged.size,
        }),
    ))
}

/// GET /api/session
pub async fn session_status(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
) -> Json<SessionSnapshot> {
    Json(state.registry.snapshot(&identity.tenant_id).await)
}

async fn send_now(
    state: GatewayState,
    identity: TenantIdentity,
    kind: PayloadKind,
    body: SendBody,
) -> Result<Json<MessageResponse>, ApiError> {
    let recipient = body.number.trim();
    if recipient.is_empty() {
        return Err(CourierError::Validation("number is required".into()).into());
    }
    let content = match kind {
        PayloadKind::Text => JobContent {
            text: body.message,
            ..JobContent::default()
        },
        _ => JobContent {
            text: body.caption.or(body.message),
            media: body.media,
            filename: body.filename,
            is_temporary_file: false,
        },
    }
    .normalize_for(kind)?;

    let message = OutboundMessage {
        recipient: recipient.to_string(),
        kind,
        content,
    };
    let id = state
        .scheduler
        .bridge()
        .dispatch(&identity.tenant_id, &message)
        .await?;
    Ok(Json(MessageResponse {
        message: format!("{kind} sent"),
        id: Some(id.0),
    }))
}

/// POST /api/send-message
pub async fn send_message(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
    Json(body): Json<SendBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    send_now(state, identity, PayloadKind::Text, body).await
}

/// POST /api/send-image
pub async fn send_image(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
    Json(body): Json<SendBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    send_now(state, identity, PayloadKind::Image, body).await
}

/// POST /api/send-video
pub async fn send_video(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
    Json(body): Json<SendBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    send_now(state, identity, PayloadKind::Video, body).await
}

/// POST /api/send-document
pub async fn send_document(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
    Json(body): Json<SendBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    send_now(state, identity, PayloadKind::Document, body).await
}

/// POST /api/send-sticker
pub async fn send_sticker(
    State(state): State<GatewayState>,
    Extension(identity): Extension<TenantIdentity>,
    Json(body): Json<SendBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    send_now(state, identity, PayloadKind::Sticker, body).await
}
