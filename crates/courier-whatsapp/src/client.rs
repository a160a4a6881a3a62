// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp session bridge.
//!
//! The bridge owns the actual WhatsApp-Web sessions. Courier starts them,
//! polls their status, sends through them and tears them down.

use std::time::Duration;

use reqwest::{Response, StatusCode, Url};
use tracing::debug;

use courier_config::TransportConfig;
use courier_core::{CourierError, HealthStatus, MessageId, TenantId};

use crate::types::{BridgeErrorBody, BridgeStatus, SendRequest, SendResponse};

/// Thin, cloneable client over the bridge's REST API.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BridgeClient {
    pub fn new(config: &TransportConfig) -> Result<Self, CourierError> {
        let base_url = Url::parse(&config.bridge_url).map_err(|e| {
            CourierError::Config(format!(
                "invalid transport.bridge_url `{}`: {e}",
                config.bridge_url
            ))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CourierError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url, CourierError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CourierError::Config("transport.bridge_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Ask the bridge to start (or resume) the tenant's session.
    pub async fn start(&self, tenant_id: &TenantId) -> Result<(), CourierError> {
        let url = self.url(&["sessions", tenant_id.as_str(), "start"])?;
        let response = self.http.post(url).send().await.map_err(request_failed)?;
        check(response).await?;
        debug!(tenant_id = %tenant_id, "bridge session started");
        Ok(())
    }

    pub async fn status(&self, tenant_id: &TenantId) -> Result<BridgeStatus, CourierError> {
        let url = self.url(&["sessions", tenant_id.as_str(), "status"])?;
        let response = self.http.get(url).send().await.map_err(request_failed)?;
        check(response)
            .await?
            .json::<BridgeStatus>()
            .await
            .map_err(|e| CourierError::Transport {
                message: format!("unreadable bridge status: {e}"),
                source: Some(Box::new(e)),
            })
    }

    pub async fn send(
        &self,
        tenant_id: &TenantId,
        request: &SendRequest<'_>,
    ) -> Result<MessageId, CourierError> {
        let url = self.url(&["sessions", tenant_id.as_str(), "messages"])?;
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(request_failed)?;
        let body = check(response)
            .await?
            .json::<SendResponse>()
            .await
            .map_err(|e| CourierError::Transport {
                message: format!("unreadable bridge send response: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(MessageId(body.id))
    }

    /// Stop the tenant's session. A session the bridge does not know is
    /// already stopped.
    pub async fn stop(&self, tenant_id: &TenantId, purge: bool) -> Result<(), CourierError> {
        let mut url = self.url(&["sessions", tenant_id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("purge", if purge { "true" } else { "false" });
        let response = self.http.delete(url).send().await.map_err(request_failed)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    pub async fn health(&self) -> HealthStatus {
        let url = match self.url(&["health"]) {
            Ok(url) => url,
            Err(e) => return HealthStatus::Unhealthy(e.to_string()),
        };
        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            Ok(response) => HealthStatus::Degraded(format!("bridge returned {}", response.status())),
            Err(e) => HealthStatus::Unhealthy(format!("bridge unreachable: {e}")),
        }
    }
}

fn request_failed(e: reqwest::Error) -> CourierError {
    CourierError::Transport {
        message: format!("bridge request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Pass successful responses through; turn anything else into a transport
/// error carrying the bridge's own message when it sent one.
async fn check(response: Response) -> Result<Response, CourierError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<BridgeErrorBody>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) => body,
    };
    Err(CourierError::transport(format!(
        "bridge returned {status}: {detail}"
    )))
}
