// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `TransportProvider` backed by the session bridge.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_config::TransportConfig;
use courier_core::{
    AdapterType, CourierError, HealthStatus, MessageId, PayloadKind, PluginAdapter, TenantId,
    TransportEvent, TransportFactory, TransportProvider,
};

use crate::client::BridgeClient;
use crate::types::SendRequest;

/// Consecutive status poll failures before the poller starts warning.
const POLL_FAILURES_BEFORE_WARN: u32 = 5;

/// One tenant's WhatsApp session, driven through the bridge.
///
/// `initialize` starts the bridge session and spawns a poller that turns
/// status changes into [`TransportEvent`]s.
pub struct BridgeTransport {
    tenant_id: TenantId,
    client: BridgeClient,
    events: mpsc::UnboundedSender<TransportEvent>,
    credentials_dir: PathBuf,
    poll_interval: Duration,
    cancel: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeTransport {
    pub fn new(
        tenant_id: TenantId,
        client: BridgeClient,
        events: mpsc::UnboundedSender<TransportEvent>,
        credentials_dir: PathBuf,
        poll_interval: Duration,
    ) -> Self {
        Self {
            tenant_id,
            client,
            events,
            credentials_dir,
            poll_interval,
            cancel: CancellationToken::new(),
            poller: Mutex::new(None),
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    async fn send_request(&self, request: SendRequest<'_>) -> Result<MessageId, CourierError> {
        let id = self.client.send(&self.tenant_id, &request).await?;
        debug!(tenant_id = %self.tenant_id, kind = %request.kind, message_id = %id.0, "message sent via bridge");
        Ok(id)
    }

    async fn remove_credentials(&self) -> Result<(), CourierError> {
        match tokio::fs::remove_dir_all(&self.credentials_dir).await {
            Ok(()) => {
                info!(tenant_id = %self.tenant_id, "stored credentials removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CourierError::ResourceRelease {
                reference: self.credentials_dir.display().to_string(),
                source: Box::new(e),
            }),
        }
    }
}

async fn poll_status(
    client: BridgeClient,
    tenant_id: TenantId,
    events: mpsc::UnboundedSender<TransportEvent>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // `initialize` already reported this.
    let mut last = Some(TransportEvent::Connecting);
    let mut failures = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = client.status(&tenant_id) => result,
        };

        let status = match result {
            Ok(status) => {
                failures = 0;
                status
            }
            Err(e) => {
                failures += 1;
                if failures == POLL_FAILURES_BEFORE_WARN {
                    warn!(tenant_id = %tenant_id, error = %e, failures, "bridge status unavailable");
                } else {
                    debug!(tenant_id = %tenant_id, error = %e, "status poll failed");
                }
                continue;
            }
        };

        let Some(event) = status.to_event() else {
            continue;
        };
        if last.as_ref() == Some(&event) {
            continue;
        }
        let finished = event == TransportEvent::Disconnected;
        if events.send(event.clone()).is_err() || finished {
            break;
        }
        last = Some(event);
    }
    debug!(tenant_id = %tenant_id, "status poller stopped");
}

#[async_trait]
impl PluginAdapter for BridgeTransport {
    fn name(&self) -> &str {
        "whatsapp-bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(self.client.health().await)
    }
}

#[async_trait]
impl TransportProvider for BridgeTransport {
    async fn initialize(&self) -> Result<(), CourierError> {
        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return Ok(());
        }
        self.client.start(&self.tenant_id).await?;
        let _ = self.events.send(TransportEvent::Connecting);

        *poller = Some(tokio::spawn(poll_status(
            self.client.clone(),
            self.tenant_id.clone(),
            self.events.clone(),
            self.poll_interval,
            self.cancel.clone(),
        )));
        Ok(())
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<MessageId, CourierError> {
        self.send_request(SendRequest::text(recipient, text)).await
    }

    async fn send_image(
        &self,
        recipient: &str,
        media: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, CourierError> {
        self.send_request(SendRequest::media(recipient, PayloadKind::Image, media, caption))
            .await
    }

    async fn send_video(
        &self,
        recipient: &str,
        media: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, CourierError> {
        self.send_request(SendRequest::media(recipient, PayloadKind::Video, media, caption))
            .await
    }

    async fn send_document(
        &self,
        recipient: &str,
        media: &str,
        filename: Option<&str>,
        caption: Option<&str>,
    ) -> Result<MessageId, CourierError> {
        self.send_request(SendRequest {
            filename,
            ..SendRequest::media(recipient, PayloadKind::Document, media, caption)
        })
        .await
    }

    async fn send_sticker(&self, recipient: &str, media: &str) -> Result<MessageId, CourierError> {
        self.send_request(SendRequest::media(recipient, PayloadKind::Sticker, media, None))
            .await
    }

    /// Stops polling, stops the bridge session and, when purging, deletes the
    /// tenant's credential directory. Both teardown steps always run.
    async fn destroy(&self, purge_credentials: bool) -> Result<(), CourierError> {
        self.cancel.cancel();
        if let Some(handle) = self.poller.lock().await.take()
            && let Err(e) = handle.await
        {
            debug!(tenant_id = %self.tenant_id, error = %e, "status poller ended abnormally");
        }

        let stopped = self.client.stop(&self.tenant_id, purge_credentials).await;
        let removed = if purge_credentials {
            self.remove_credentials().await
        } else {
            Ok(())
        };
        stopped.and(removed)
    }
}

/// Builds one [`BridgeTransport`] per tenant.
pub struct BridgeTransportFactory {
    client: BridgeClient,
    session_dir: PathBuf,
    poll_interval: Duration,
}

impl BridgeTransportFactory {
    pub fn new(config: &TransportConfig) -> Result<Self, CourierError> {
        Ok(Self {
            client: BridgeClient::new(config)?,
            session_dir: config.session_dir.clone(),
            poll_interval: Duration::from_millis(config.status_poll_ms),
        })
    }

    pub fn client(&self) -> &BridgeClient {
        &self.client
    }
}

/// Tenant ids name credential directories, so they must be a single plain
/// path component.
fn check_tenant_id(tenant_id: &TenantId) -> Result<(), CourierError> {
    let id = tenant_id.as_str();
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(CourierError::Validation(format!(
            "tenant id `{id}` cannot name a session directory"
        )));
    }
    Ok(())
}

impl TransportFactory for BridgeTransportFactory {
    fn create(
        &self,
        tenant_id: &TenantId,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn TransportProvider>, CourierError> {
        check_tenant_id(tenant_id)?;
        Ok(Arc::new(BridgeTransport::new(
            tenant_id.clone(),
            self.client.clone(),
            events,
            self.session_dir.join(tenant_id.as_str()),
            self.poll_interval,
        )))
    }
}

#[cfg(test)]
mod tests {
    use courier_core::Identity;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    fn factory(server: &MockServer, session_dir: PathBuf) -> BridgeTransportFactory {
        BridgeTransportFactory::new(&TransportConfig {
            bridge_url: server.uri(),
            session_dir,
            status_poll_ms: 20,
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> Option<TransportEvent> {
        tokio::time::timeout(WAIT, rx.recv()).await.ok().flatten()
    }

    async fn mount_status(server: &MockServer, body: serde_json::Value, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path("/sessions/u1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body));
        match times {
            Some(n) => mock.up_to_n_times(n).mount(server).await,
            None => mock.mount(server).await,
        }
    }

    #[tokio::test]
    async fn status_changes_become_lifecycle_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/u1/start"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        mount_status(&server, serde_json::json!({"status": "starting"}), Some(1)).await;
        mount_status(&server, serde_json::json!({"status": "qr", "qr": "2@abc"}), Some(3)).await;
        mount_status(
            &server,
            serde_json::json!({"status": "connected", "user": {"id": "628123@c.us"}}),
            None,
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = factory(&server, dir.path().to_path_buf())
            .create(&TenantId::from("u1"), tx)
            .unwrap();
        transport.initialize().await.unwrap();

        assert_eq!(next(&mut rx).await, Some(TransportEvent::Connecting));
        assert_eq!(
            next(&mut rx).await,
            Some(TransportEvent::HandshakeArtifactReady("2@abc".into()))
        );
        assert_eq!(
            next(&mut rx).await,
            Some(TransportEvent::Connected(Identity {
                id: "628123@c.us".into(),
                name: None,
            }))
        );

        transport.destroy(false).await.unwrap();
    }

    #[tokio::test]
    async fn failed_start_is_an_initialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/u1/start"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "browser crashed"})),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = factory(&server, dir.path().to_path_buf())
            .create(&TenantId::from("u1"), tx)
            .unwrap();

        let err = transport.initialize().await.unwrap_err();
        assert!(err.to_string().contains("browser crashed"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn remote_disconnect_ends_polling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions/u1/start"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        mount_status(&server, serde_json::json!({"status": "disconnected"}), None).await;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = factory(&server, dir.path().to_path_buf())
            .create(&TenantId::from("u1"), tx)
            .unwrap();
        transport.initialize().await.unwrap();

        assert_eq!(next(&mut rx).await, Some(TransportEvent::Connecting));
        assert_eq!(next(&mut rx).await, Some(TransportEvent::Disconnected));
        // The poller has exited; nothing else arrives.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn purge_removes_stored_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/sessions/u1"))
            .and(query_param("purge", "true"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("u1");
        std::fs::create_dir_all(credentials.join("Default")).unwrap();
        std::fs::write(credentials.join("Default/state"), b"paired").unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = factory(&server, dir.path().to_path_buf())
            .create(&TenantId::from("u1"), tx)
            .unwrap();
        transport.destroy(true).await.unwrap();

        assert!(!credentials.exists());
    }

    #[tokio::test]
    async fn plain_destroy_keeps_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/sessions/u1"))
            .and(query_param("purge", "false"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("u1");
        std::fs::create_dir_all(&credentials).unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = factory(&server, dir.path().to_path_buf())
            .create(&TenantId::from("u1"), tx)
            .unwrap();
        transport.destroy(false).await.unwrap();

        assert!(credentials.exists());
    }

    #[tokio::test]
    async fn factory_rejects_path_like_tenant_ids() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(&server, dir.path().to_path_buf());

        for id in ["", "..", "a/b", "a\\b"] {
            let (tx, _rx) = mpsc::unbounded_channel();
            let result = factory.create(&TenantId::from(id), tx);
            assert!(matches!(result, Err(CourierError::Validation(_))), "accepted {id:?}");
        }
    }
}
