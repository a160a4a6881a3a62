// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of live tenant sessions.
//!
//! Every tenant has a slot guarded by its own async mutex. Create-or-attach,
//! logout and disconnect removal all run under that lock, so a tenant never has
//! two transports and a stale event never removes a newer session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use courier_core::{
    CourierError, Criteria, MessageId, OutboundMessage, SESSIONS_COLLECTION, SessionEvent,
    SessionState, StoreAdapter, TenantId, TransportDirectory, TransportEvent, TransportFactory,
    TransportProvider,
};

use crate::session::{Observer, ObserverId, Session, SessionHandle, SessionSnapshot};

type Slot = Arc<Mutex<Option<Arc<Session>>>>;

struct RegistryInner {
    factory: Arc<dyn TransportFactory>,
    /// Where connected-session metadata is recorded, if anywhere.
    store: Option<Arc<dyn StoreAdapter>>,
    /// Slots are never removed, only emptied; a waiter may still hold one.
    slots: DashMap<TenantId, Slot>,
    next_observer: AtomicU64,
}

/// Owns tenant sessions and their transports. Cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self::build(factory, None)
    }

    /// Also record `{tenant_id, state, identity, updated_at}` for connected
    /// sessions in the `sessions` collection of `store`.
    pub fn with_store(factory: Arc<dyn TransportFactory>, store: Arc<dyn StoreAdapter>) -> Self {
        Self::build(factory, Some(store))
    }

    fn build(factory: Arc<dyn TransportFactory>, store: Option<Arc<dyn StoreAdapter>>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                factory,
                store,
                slots: DashMap::new(),
                next_observer: AtomicU64::new(1),
            }),
        }
    }

    fn slot(&self, tenant_id: &TenantId) -> Slot {
        Arc::clone(self.inner.slots.entry(tenant_id.clone()).or_default().value())
    }

    fn existing_slot(&self, tenant_id: &TenantId) -> Option<Slot> {
        self.inner
            .slots
            .get(tenant_id)
            .map(|slot| Arc::clone(slot.value()))
    }

    async fn current(&self, tenant_id: &TenantId) -> Option<Arc<Session>> {
        let slot = self.existing_slot(tenant_id)?;
        let session = slot.lock().await.clone();
        session
    }

    /// Bind `observer` to the tenant's session, creating the session if there
    /// is none.
    ///
    /// A live session gets the observer plus a replay of its current state.
    /// Otherwise a transport is created and initialized in the background; any
    /// failure reaches the observer as [`SessionEvent::Error`].
    pub async fn acquire(&self, tenant_id: &TenantId, observer: Observer) -> SessionHandle {
        let observer_id = ObserverId(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        let handle = SessionHandle {
            tenant_id: tenant_id.clone(),
            observer_id,
        };

        let slot = self.slot(tenant_id);
        let mut guard = slot.lock().await;

        if let Some(session) = guard.as_ref()
            && session.bind(observer_id, &observer, true).await
        {
            debug!(tenant_id = %tenant_id, "observer attached to existing session");
            return handle;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = match self.inner.factory.create(tenant_id, events_tx) {
            Ok(transport) => transport,
            Err(e) => {
                error!(tenant_id = %tenant_id, error = %e, "failed to create transport");
                *guard = None;
                let _ = observer.send(SessionEvent::Error {
                    message: e.to_string(),
                });
                return handle;
            }
        };

        let session = Arc::new(Session::new(tenant_id.clone(), transport));
        session.bind(observer_id, &observer, false).await;
        *guard = Some(Arc::clone(&session));
        drop(guard);

        info!(tenant_id = %tenant_id, "session created");
        tokio::spawn(self.clone().pump_events(Arc::clone(&session), events_rx));
        tokio::spawn(self.clone().initialize(session));
        handle
    }

    /// Remove one observer binding. The session itself stays up.
    pub async fn detach_observer(&self, handle: &SessionHandle) -> bool {
        match self.current(&handle.tenant_id).await {
            Some(session) => session.unbind(handle.observer_id).await,
            None => false,
        }
    }

    /// Tear the tenant's session down and purge its credentials.
    ///
    /// Bound observers get `Status(disconnected)`. Teardown errors are logged
    /// and never prevent removal. Returns whether a session existed.
    pub async fn logout(&self, tenant_id: &TenantId) -> bool {
        let existed = match self.existing_slot(tenant_id) {
            Some(slot) => {
                let mut guard = slot.lock().await;
                match guard.take() {
                    Some(session) => {
                        session.cancel.cancel();
                        if let Err(e) = session.transport.destroy(true).await {
                            warn!(tenant_id = %tenant_id, error = %e, "transport teardown failed during logout");
                        }
                        session.close().await;
                        true
                    }
                    None => false,
                }
            }
            None => false,
        };
        self.forget(tenant_id).await;
        info!(tenant_id = %tenant_id, existed, "tenant logged out");
        existed
    }

    /// Send immediately through the tenant's connected transport.
    pub async fn send(
        &self,
        tenant_id: &TenantId,
        message: &OutboundMessage,
    ) -> Result<MessageId, CourierError> {
        let transport = self.ready_transport(tenant_id).await.ok_or_else(|| {
            CourierError::SessionNotReady {
                tenant_id: tenant_id.to_string(),
            }
        })?;
        transport.send(message).await
    }

    pub async fn snapshot(&self, tenant_id: &TenantId) -> SessionSnapshot {
        match self.current(tenant_id).await {
            Some(session) => session.snapshot().await,
            None => SessionSnapshot::absent(tenant_id),
        }
    }

    /// Number of tenants with a session entry.
    pub async fn active_sessions(&self) -> usize {
        let slots: Vec<Slot> = self
            .inner
            .slots
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    /// Tear down every session, keeping credentials for the next start.
    pub async fn shutdown(&self) {
        let slots: Vec<(TenantId, Slot)> = self
            .inner
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut closed = 0usize;
        for (tenant_id, slot) in slots {
            let Some(session) = slot.lock().await.take() else {
                continue;
            };
            session.cancel.cancel();
            if let Err(e) = session.transport.destroy(false).await {
                warn!(tenant_id = %tenant_id, error = %e, "transport teardown failed during shutdown");
            }
            session.close().await;
            closed += 1;
        }
        info!(sessions = closed, "session registry shut down");
    }

    /// Relay transport events until the session is cancelled or the transport
    /// drops its sender.
    async fn pump_events(
        self,
        session: Arc<Session>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let tenant_id = session.tenant_id.clone();
        loop {
            let event = tokio::select! {
                biased;
                _ = session.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if event == TransportEvent::Disconnected {
                self.remove_if_current(&session).await;
                session.cancel.cancel();
                session.apply(event).await;
                info!(tenant_id = %tenant_id, "session disconnected");
                self.forget(&tenant_id).await;
                if let Err(e) = session.transport.destroy(false).await {
                    debug!(tenant_id = %tenant_id, error = %e, "teardown after disconnect failed");
                }
                break;
            }

            match session.apply(event).await {
                SessionState::Connected => {
                    info!(tenant_id = %tenant_id, "session connected");
                    self.remember(&session).await;
                }
                SessionState::AwaitingHandshake => {
                    debug!(tenant_id = %tenant_id, "handshake artifact relayed");
                }
                state => debug!(tenant_id = %tenant_id, %state, "session state changed"),
            }
        }
        debug!(tenant_id = %tenant_id, "event pump stopped");
    }

    async fn initialize(self, session: Arc<Session>) {
        let result = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => {
                debug!(tenant_id = %session.tenant_id, "initialization cancelled");
                return;
            }
            result = session.transport.initialize() => result,
        };

        if let Err(e) = result {
            error!(tenant_id = %session.tenant_id, error = %e, "transport initialization failed");
            session.cancel.cancel();
            self.remove_if_current(&session).await;
            session.fail(e.to_string()).await;
            if let Err(e) = session.transport.destroy(false).await {
                debug!(tenant_id = %session.tenant_id, error = %e, "teardown after failed initialization failed");
            }
        }
    }

    /// Empty the tenant's slot if it still holds this exact session.
    async fn remove_if_current(&self, session: &Arc<Session>) -> bool {
        let Some(slot) = self.existing_slot(&session.tenant_id) else {
            return false;
        };
        let mut guard = slot.lock().await;
        if guard
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            *guard = None;
            true
        } else {
            false
        }
    }

    /// Record a connected session. Runs under the tenant's slot lock so a
    /// concurrent logout cannot forget the record before it is written.
    async fn remember(&self, session: &Arc<Session>) {
        let Some(store) = &self.inner.store else {
            return;
        };
        let Some(slot) = self.existing_slot(&session.tenant_id) else {
            return;
        };
        let guard = slot.lock().await;
        let current = guard
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session));
        if !current || session.cancel.is_cancelled() {
            debug!(tenant_id = %session.tenant_id, "session ended before its metadata was recorded");
            return;
        }

        let snapshot = session.snapshot().await;
        let record = json!({
            "tenant_id": snapshot.tenant_id,
            "state": snapshot.state,
            "identity": snapshot.identity,
            "updated_at": chrono::Utc::now().to_rfc3339(),
        });
        let criteria = Criteria::all().field("tenant_id", snapshot.tenant_id.as_str());
        let result = match store
            .update(SESSIONS_COLLECTION, &criteria, record.clone())
            .await
        {
            Ok(Some(_)) => Ok(()),
            Ok(None) => store.append(SESSIONS_COLLECTION, record).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(tenant_id = %snapshot.tenant_id, error = %e, "failed to record session metadata");
        }
        drop(guard);
    }

    async fn forget(&self, tenant_id: &TenantId) {
        let Some(store) = &self.inner.store else {
            return;
        };
        let criteria = Criteria::all().field("tenant_id", tenant_id.as_str());
        if let Err(e) = store.remove(SESSIONS_COLLECTION, &criteria).await {
            warn!(tenant_id = %tenant_id, error = %e, "failed to remove session metadata");
        }
    }
}

#[async_trait]
impl TransportDirectory for SessionRegistry {
    async fn ready_transport(&self, tenant_id: &TenantId) -> Option<Arc<dyn TransportProvider>> {
        let session = self.current(tenant_id).await?;
        if session.is_connected().await {
            Some(Arc::clone(&session.transport))
        } else {
            None
        }
    }
}
