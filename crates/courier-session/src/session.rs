// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single tenant's live session and its bound observers.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use courier_core::{
    Identity, SessionEvent, SessionState, TenantId, TransportEvent, TransportProvider,
};

/// Receives a tenant's lifecycle events in order.
///
/// Registration is weak: once the receiving half is dropped the sender is
/// pruned on the next fan-out.
pub type Observer = mpsc::UnboundedSender<SessionEvent>;

/// Identifies one observer binding. Unique for the lifetime of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// Returned by `acquire`; pass it back to `detach_observer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub tenant_id: TenantId,
    pub observer_id: ObserverId,
}

/// Point-in-time view of a tenant's session, for status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub tenant_id: TenantId,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    /// A handshake artifact is waiting to be scanned.
    pub awaiting_scan: bool,
    pub observers: usize,
}

impl SessionSnapshot {
    pub(crate) fn absent(tenant_id: &TenantId) -> Self {
        Self {
            tenant_id: tenant_id.clone(),
            state: SessionState::Uninitialized,
            identity: None,
            awaiting_scan: false,
            observers: 0,
        }
    }
}

struct SessionInner {
    state: SessionState,
    artifact: Option<String>,
    identity: Option<Identity>,
    observers: HashMap<ObserverId, Observer>,
}

impl SessionInner {
    fn broadcast(&mut self, event: &SessionEvent) {
        self.observers
            .retain(|_, observer| observer.send(event.clone()).is_ok());
    }

    /// Events that bring a late observer up to date.
    fn replay(&self) -> Vec<SessionEvent> {
        match (&self.state, &self.artifact) {
            (SessionState::Connected, _) => vec![SessionEvent::Status {
                state: SessionState::Connected,
                identity: self.identity.clone(),
            }],
            (_, Some(artifact)) => vec![
                SessionEvent::Artifact {
                    artifact: artifact.clone(),
                },
                SessionEvent::status(SessionState::AwaitingHandshake),
            ],
            _ => vec![SessionEvent::status(SessionState::Connecting)],
        }
    }
}

/// Owned exclusively by the registry. State and observers share one lock so
/// replay to a new observer can never interleave with a fan-out.
pub(crate) struct Session {
    pub(crate) tenant_id: TenantId,
    pub(crate) transport: Arc<dyn TransportProvider>,
    /// Cancelled on logout, disconnect or failed initialization.
    pub(crate) cancel: CancellationToken,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub(crate) fn new(tenant_id: TenantId, transport: Arc<dyn TransportProvider>) -> Self {
        Self {
            tenant_id,
            transport,
            cancel: CancellationToken::new(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Uninitialized,
                artifact: None,
                identity: None,
                observers: HashMap::new(),
            }),
        }
    }

    /// Bind an observer, optionally replaying the current state to it first.
    /// Returns `false` when the session is already dead.
    pub(crate) async fn bind(&self, id: ObserverId, observer: &Observer, replay: bool) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Disconnected {
            return false;
        }
        if replay {
            for event in inner.replay() {
                if observer.send(event).is_err() {
                    return true;
                }
            }
        }
        inner.observers.insert(id, observer.clone());
        true
    }

    pub(crate) async fn unbind(&self, id: ObserverId) -> bool {
        self.inner.lock().await.observers.remove(&id).is_some()
    }

    /// Apply a transport event and fan it out. Returns the resulting state.
    pub(crate) async fn apply(&self, event: TransportEvent) -> SessionState {
        let mut inner = self.inner.lock().await;
        match event {
            TransportEvent::HandshakeArtifactReady(artifact) => {
                inner.state = SessionState::AwaitingHandshake;
                inner.artifact = Some(artifact.clone());
                inner.broadcast(&SessionEvent::Artifact { artifact });
                inner.broadcast(&SessionEvent::status(SessionState::AwaitingHandshake));
            }
            TransportEvent::Connecting => {
                inner.state = SessionState::Connecting;
                inner.broadcast(&SessionEvent::status(SessionState::Connecting));
            }
            TransportEvent::Connected(identity) => {
                inner.state = SessionState::Connected;
                inner.artifact = None;
                inner.identity = Some(identity.clone());
                inner.broadcast(&SessionEvent::Status {
                    state: SessionState::Connected,
                    identity: Some(identity),
                });
            }
            TransportEvent::Disconnected => {
                Self::terminate(&mut inner, None);
            }
        }
        inner.state
    }

    /// Report a lifecycle failure and mark the session dead.
    pub(crate) async fn fail(&self, message: String) {
        let mut inner = self.inner.lock().await;
        Self::terminate(&mut inner, Some(SessionEvent::Error { message }));
    }

    /// Mark the session dead after logout or shutdown.
    pub(crate) async fn close(&self) {
        let mut inner = self.inner.lock().await;
        Self::terminate(&mut inner, None);
    }

    fn terminate(inner: &mut SessionInner, event: Option<SessionEvent>) {
        inner.state = SessionState::Disconnected;
        inner.artifact = None;
        inner.identity = None;
        let event = event.unwrap_or_else(|| SessionEvent::status(SessionState::Disconnected));
        inner.broadcast(&event);
        inner.observers.clear();
    }

    pub(crate) async fn is_connected(&self) -> bool {
        self.inner.lock().await.state == SessionState::Connected
    }

    pub(crate) async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        SessionSnapshot {
            tenant_id: self.tenant_id.clone(),
            state: inner.state,
            identity: inner.identity.clone(),
            awaiting_scan: inner.artifact.is_some(),
            observers: inner.observers.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use courier_core::{
        AdapterType, CourierError, HealthStatus, MessageId, PluginAdapter,
    };

    use super::*;

    struct NullTransport;

    #[async_trait]
    impl PluginAdapter for NullTransport {
        fn name(&self) -> &str {
            "null"
        }

        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }

        fn adapter_type(&self) -> AdapterType {
            AdapterType::Transport
        }

        async fn health_check(&self) -> Result<HealthStatus, CourierError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl TransportProvider for NullTransport {
        async fn initialize(&self) -> Result<(), CourierError> {
            Ok(())
        }

        async fn send_text(&self, _: &str, _: &str) -> Result<MessageId, CourierError> {
            Ok(MessageId("null".into()))
        }

        async fn send_image(
            &self,
            _: &str,
            _: &str,
            _: Option<&str>,
        ) -> Result<MessageId, CourierError> {
            Ok(MessageId("null".into()))
        }

        async fn send_video(
            &self,
            _: &str,
            _: &str,
            _: Option<&str>,
        ) -> Result<MessageId, CourierError> {
            Ok(MessageId("null".into()))
        }

        async fn send_document(
            &self,
            _: &str,
            _: &str,
            _: Option<&str>,
            _: Option<&str>,
        ) -> Result<MessageId, CourierError> {
            Ok(MessageId("null".into()))
        }

        async fn send_sticker(&self, _: &str, _: &str) -> Result<MessageId, CourierError> {
            Ok(MessageId("null".into()))
        }

        async fn destroy(&self, _: bool) -> Result<(), CourierError> {
            Ok(())
        }
    }

    fn session() -> Session {
        Session::new(TenantId::from("u1"), Arc::new(NullTransport))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn replay_depends_on_state() {
        let session = session();

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(session.bind(ObserverId(1), &tx, true).await);
        assert_eq!(drain(&mut rx), vec![SessionEvent::status(SessionState::Connecting)]);

        session
            .apply(TransportEvent::HandshakeArtifactReady("qr-1".into()))
            .await;
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        session.bind(ObserverId(2), &tx2, true).await;
        assert_eq!(
            drain(&mut rx2),
            vec![
                SessionEvent::Artifact {
                    artifact: "qr-1".into()
                },
                SessionEvent::status(SessionState::AwaitingHandshake),
            ]
        );

        let identity = Identity {
            id: "628123@c.us".into(),
            name: None,
        };
        session
            .apply(TransportEvent::Connected(identity.clone()))
            .await;
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        session.bind(ObserverId(3), &tx3, true).await;
        assert_eq!(
            drain(&mut rx3),
            vec![SessionEvent::Status {
                state: SessionState::Connected,
                identity: Some(identity),
            }]
        );
        assert!(!session.snapshot().await.awaiting_scan);
    }

    #[tokio::test]
    async fn dropped_observers_are_pruned_on_fan_out() {
        let session = session();
        let (tx, rx) = mpsc::unbounded_channel();
        session.bind(ObserverId(1), &tx, false).await;
        drop(rx);
        assert_eq!(session.snapshot().await.observers, 1);

        session.apply(TransportEvent::Connecting).await;
        assert_eq!(session.snapshot().await.observers, 0);
    }

    #[tokio::test]
    async fn dead_session_refuses_new_observers() {
        let session = session();
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.bind(ObserverId(1), &tx, false).await;

        session.fail("boom".into()).await;
        assert_eq!(
            drain(&mut rx),
            vec![SessionEvent::Error {
                message: "boom".into()
            }]
        );

        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert!(!session.bind(ObserverId(2), &tx2, true).await);
        assert_eq!(session.snapshot().await.state, SessionState::Disconnected);
    }
}
