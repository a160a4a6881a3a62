// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness wiring a memory store, the session registry and the scheduler
//! around mock transports.

use std::sync::Arc;

use courier_config::SchedulerConfig;
use courier_core::{SessionState, TenantId};
use courier_scheduler::Scheduler;
use courier_session::{SessionHandle, SessionRegistry};
use courier_storage::MemoryStore;

use crate::mock_transport::{MockBehavior, MockTransportFactory};
use crate::observer::{self, EventReceiver};
use crate::releaser::CountingReleaser;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    behavior: MockBehavior,
    scheduler: SchedulerConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            behavior: MockBehavior::silent(),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Default behavior of every transport the factory creates.
    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.scheduler.timezone = timezone.to_string();
        self
    }

    pub fn with_send_timeout_secs(mut self, secs: u64) -> Self {
        self.scheduler.send_timeout_secs = secs;
        self
    }

    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.scheduler.poll_interval_secs = secs;
        self
    }

    pub fn build(self) -> TestHarness {
        let store = Arc::new(MemoryStore::new());
        let factory = Arc::new(MockTransportFactory::new(self.behavior));
        let releaser = Arc::new(CountingReleaser::new());
        let registry = SessionRegistry::with_store(factory.clone(), store.clone());
        let scheduler = Scheduler::new(
            store.clone(),
            Arc::new(registry.clone()),
            releaser.clone(),
            &self.scheduler,
        )
        .expect("harness scheduler config is valid");

        TestHarness {
            store,
            factory,
            releaser,
            registry,
            scheduler,
        }
    }
}

/// A complete in-process stack with mock transports.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub factory: Arc<MockTransportFactory>,
    pub releaser: Arc<CountingReleaser>,
    pub registry: SessionRegistry,
    pub scheduler: Scheduler,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Acquire a session for `tenant` with a connecting transport and wait
    /// until it reports `connected`.
    pub async fn connect(&self, tenant: &str) -> (SessionHandle, EventReceiver) {
        self.factory
            .set_behavior_for(tenant, MockBehavior::connects_as(&format!("{tenant}@c.us")));
        let (tx, mut rx) = observer::observer();
        let handle = self.registry.acquire(&TenantId::from(tenant), tx).await;
        assert!(
            observer::wait_for_state(&mut rx, SessionState::Connected).await,
            "tenant {tenant} never connected"
        );
        (handle, rx)
    }
}
