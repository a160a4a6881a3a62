// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic session and dispatch tests.
//!
//! `MockTransport` replays a scripted list of lifecycle events when it is
//! initialized, can be told to fail or stall, and captures every successful
//! send for assertions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use courier_core::{
    AdapterType, CourierError, HealthStatus, Identity, JobContent, MessageId, OutboundMessage,
    PayloadKind, PluginAdapter, TenantId, TransportEvent, TransportFactory, TransportProvider,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// How a mock transport behaves.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Emitted in order at the end of a successful `initialize`.
    pub on_initialize: Vec<TransportEvent>,
    pub init_delay: Option<Duration>,
    pub init_error: Option<String>,
    pub send_delay: Option<Duration>,
    pub send_error: Option<String>,
}

impl MockBehavior {
    /// Initializes without emitting anything; the test drives events by hand.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Connects straight away as `id`.
    pub fn connects_as(id: &str) -> Self {
        Self {
            on_initialize: vec![
                TransportEvent::Connecting,
                TransportEvent::Connected(Identity {
                    id: id.to_string(),
                    name: None,
                }),
            ],
            ..Self::default()
        }
    }

    /// Asks for a handshake with `artifact` and waits there.
    pub fn shows_qr(artifact: &str) -> Self {
        Self {
            on_initialize: vec![
                TransportEvent::Connecting,
                TransportEvent::HandshakeArtifactReady(artifact.to_string()),
            ],
            ..Self::default()
        }
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    pub fn failing_init(mut self, message: &str) -> Self {
        self.init_error = Some(message.to_string());
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    pub fn failing_sends(mut self, message: &str) -> Self {
        self.send_error = Some(message.to_string());
        self
    }
}

/// A scripted transport for one tenant.
pub struct MockTransport {
    tenant_id: TenantId,
    events: mpsc::UnboundedSender<TransportEvent>,
    behavior: MockBehavior,
    sent: Mutex<Vec<OutboundMessage>>,
    destroyed: Mutex<Vec<bool>>,
    init_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new(
        tenant_id: TenantId,
        events: mpsc::UnboundedSender<TransportEvent>,
        behavior: MockBehavior,
    ) -> Self {
        Self {
            tenant_id,
            events,
            behavior,
            sent: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
            init_calls: AtomicUsize::new(0),
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Push a lifecycle event as if the network produced it.
    /// Returns `false` once the registry has stopped listening.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        lock(&self.sent).clone()
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.sent).len()
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// The `purge_credentials` flag of every `destroy` call, in order.
    pub fn destroy_calls(&self) -> Vec<bool> {
        lock(&self.destroyed).clone()
    }

    async fn record(
        &self,
        recipient: &str,
        kind: PayloadKind,
        content: JobContent,
    ) -> Result<MessageId, CourierError> {
        if let Some(delay) = self.behavior.send_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.behavior.send_error {
            return Err(CourierError::transport(message.clone()));
        }
        lock(&self.sent).push(OutboundMessage {
            recipient: recipient.to_string(),
            kind,
            content,
        });
        Ok(MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4())))
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl TransportProvider for MockTransport {
    async fn initialize(&self) -> Result<(), CourierError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.behavior.init_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.behavior.init_error {
            return Err(CourierError::transport(message.clone()));
        }
        for event in &self.behavior.on_initialize {
            self.emit(event.clone());
        }
        Ok(())
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<MessageId, CourierError> {
        self.record(recipient, PayloadKind::Text, JobContent::text(text))
            .await
    }

    async fn send_image(
        &self,
        recipient: &str,
        media: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, CourierError> {
        let content = JobContent::media(media, caption.map(str::to_string));
        self.record(recipient, PayloadKind::Image, content).await
    }

    async fn send_video(
        &self,
        recipient: &str,
        media: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, CourierError> {
        let content = JobContent::media(media, caption.map(str::to_string));
        self.record(recipient, PayloadKind::Video, content).await
    }

    async fn send_document(
        &self,
        recipient: &str,
        media: &str,
        filename: Option<&str>,
        caption: Option<&str>,
    ) -> Result<MessageId, CourierError> {
        let content = JobContent {
            filename: filename.map(str::to_string),
            ..JobContent::media(media, caption.map(str::to_string))
        };
        self.record(recipient, PayloadKind::Document, content).await
    }

    async fn send_sticker(&self, recipient: &str, media: &str) -> Result<MessageId, CourierError> {
        self.record(recipient, PayloadKind::Sticker, JobContent::media(media, None))
            .await
    }

    async fn destroy(&self, purge_credentials: bool) -> Result<(), CourierError> {
        lock(&self.destroyed).push(purge_credentials);
        Ok(())
    }
}

/// Creates [`MockTransport`]s and keeps every one it created.
#[derive(Default)]
pub struct MockTransportFactory {
    default_behavior: Mutex<MockBehavior>,
    per_tenant: Mutex<HashMap<TenantId, MockBehavior>>,
    create_error: Mutex<Option<String>>,
    created: Mutex<Vec<Arc<MockTransport>>>,
}

impl MockTransportFactory {
    pub fn new(default_behavior: MockBehavior) -> Self {
        Self {
            default_behavior: Mutex::new(default_behavior),
            ..Self::default()
        }
    }

    pub fn set_default_behavior(&self, behavior: MockBehavior) {
        *lock(&self.default_behavior) = behavior;
    }

    pub fn set_behavior_for(&self, tenant_id: &str, behavior: MockBehavior) {
        lock(&self.per_tenant).insert(TenantId::from(tenant_id), behavior);
    }

    /// Make `create` itself fail (`None` restores normal creation).
    pub fn fail_creation(&self, message: Option<&str>) {
        *lock(&self.create_error) = message.map(str::to_string);
    }

    pub fn created_count(&self) -> usize {
        lock(&self.created).len()
    }

    pub fn created_for(&self, tenant_id: &str) -> Vec<Arc<MockTransport>> {
        lock(&self.created)
            .iter()
            .filter(|t| t.tenant_id.as_str() == tenant_id)
            .cloned()
            .collect()
    }

    /// Most recently created transport for `tenant_id`.
    pub fn latest(&self, tenant_id: &str) -> Option<Arc<MockTransport>> {
        self.created_for(tenant_id).pop()
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(
        &self,
        tenant_id: &TenantId,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn TransportProvider>, CourierError> {
        if let Some(message) = lock(&self.create_error).clone() {
            return Err(CourierError::transport(message));
        }
        let behavior = lock(&self.per_tenant)
            .get(tenant_id)
            .cloned()
            .unwrap_or_else(|| lock(&self.default_behavior).clone());
        let transport = Arc::new(MockTransport::new(tenant_id.clone(), events, behavior));
        lock(&self.created).push(Arc::clone(&transport));
        Ok(transport)
    }
}
