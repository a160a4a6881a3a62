// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token authentication for the gateway.
//!
//! Tokens are HS256 JWTs whose subject is the tenant id. They are accepted
//! from (checked in order):
//! 1. `Authorization: Bearer <token>`
//! 2. `?token=<token>`
//! 3. `?api_key=<token>`
//!
//! Without a configured secret every token is rejected (fail-closed).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use courier_config::AuthConfig;
use courier_core::{
    AdapterType, AuthAdapter, CourierError, HealthStatus, PluginAdapter, TenantId,
    TenantIdentity,
};

use crate::error::ApiError;

/// JWT claims carried by Courier tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Tenant id.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Mints and verifies tenant tokens with a shared HS256 secret.
pub struct JwtAuthenticator {
    keys: Option<Keys>,
    default_ttl_hours: u64,
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("secret", &self.keys.as_ref().map(|_| "[redacted]"))
            .field("default_ttl_hours", &self.default_ttl_hours)
            .finish()
    }
}

impl JwtAuthenticator {
    pub fn new(config: &AuthConfig) -> Self {
        let keys = config.jwt_secret.as_deref().map(|secret| Keys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        });
        Self {
            keys,
            default_ttl_hours: config.token_ttl_hours,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    /// Issue a token for `tenant_id`, valid for `ttl_hours` (or the configured
    /// default).
    pub fn mint(
        &self,
        tenant_id: &TenantId,
        username: Option<&str>,
        ttl_hours: Option<u64>,
    ) -> Result<String, CourierError> {
        let keys = self.keys.as_ref().ok_or_else(|| {
            CourierError::Config("auth.jwt_secret is required to issue tokens".into())
        })?;
        if tenant_id.as_str().is_empty() {
            return Err(CourierError::Validation("tenant id must not be empty".into()));
        }
        let ttl_hours = ttl_hours.unwrap_or(self.default_ttl_hours);
        let ttl_hours = i64::try_from(ttl_hours)
            .map_err(|_| CourierError::Validation(format!("token ttl {ttl_hours}h is too long")))?;

        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: tenant_id.to_string(),
            username: username.map(str::to_string),
            iat: now,
            exp: now.saturating_add(ttl_hours.saturating_mul(3600)),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| CourierError::Internal(format!("failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, CourierError> {
        let keys = self
            .keys
            .as_ref()
            .ok_or_else(|| CourierError::Unauthorized("token authentication is not configured".into()))?;
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &keys.decoding,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| CourierError::Unauthorized(format!("invalid token: {e}")))?;
        if data.claims.sub.is_empty() {
            return Err(CourierError::Unauthorized("token has no subject".into()));
        }
        Ok(data.claims)
    }
}

#[async_trait]
impl PluginAdapter for JwtAuthenticator {
    fn name(&self) -> &str {
        "jwt"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Auth
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(if self.is_configured() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded("no jwt secret configured, all requests are rejected".into())
        })
    }
}

#[async_trait]
impl AuthAdapter for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<TenantIdentity, CourierError> {
        let claims = self.verify(token)?;
        Ok(TenantIdentity {
            tenant_id: TenantId(claims.sub),
            username: claims.username,
        })
    }
}

/// Find the request's token in the header or the query string.
fn extract_token(request: &Request) -> Option<String> {
    let bearer = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(request.uri()).ok()?;
    ["token", "api_key"]
        .iter()
        .filter_map(|key| params.get(*key))
        .find(|t| !t.is_empty())
        .cloned()
}

/// Resolve the caller to a [`TenantIdentity`] request extension, or reject.
///
/// A request without any token gets 403; a token that does not verify gets 401.
pub async fn auth_middleware(
    State(auth): State<Arc<dyn AuthAdapter>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_token(&request) else {
        return ApiError::new(StatusCode::FORBIDDEN, "no token provided").into_response();
    };

    match auth.authenticate(&token).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            debug!(error = %e, path = %request.uri().path(), "request rejected");
            ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized").into_response()
        }
    }
}
