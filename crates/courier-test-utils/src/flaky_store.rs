// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store wrapper with injectable lookup and update failures.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use courier_core::{
    AdapterType, CourierError, Criteria, HealthStatus, PluginAdapter, StoreAdapter,
};
use courier_storage::MemoryStore;

/// A [`MemoryStore`] whose next `n` single-record lookups or updates fail
/// with a storage error, and whose writes can be slowed down.
///
/// `filter` and `remove` always go through immediately.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_finds: AtomicUsize,
    failing_updates: AtomicUsize,
    updates: AtomicUsize,
    write_delay_ms: AtomicU64,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls to `find`.
    pub fn fail_next_finds(&self, n: usize) {
        self.failing_finds.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` calls to `update`.
    pub fn fail_next_updates(&self, n: usize) {
        self.failing_updates.store(n, Ordering::SeqCst);
    }

    /// Sleep this long before every append and update.
    pub fn delay_writes(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    async fn write_delay(&self) {
        let millis = self.write_delay_ms.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    /// Update attempts so far, failed ones included.
    pub fn update_attempts(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for FlakyStore {
    fn name(&self) -> &str {
        "flaky-memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl StoreAdapter for FlakyStore {
    async fn find(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Option<Value>, CourierError> {
        take_failure(&self.failing_finds)?;
        self.inner.find(collection, criteria).await
    }

    async fn filter(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Value>, CourierError> {
        self.inner.filter(collection, criteria).await
    }

    async fn append(&self, collection: &str, record: Value) -> Result<(), CourierError> {
        self.write_delay().await;
        self.inner.append(collection, record).await
    }

    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        patch: Value,
    ) -> Result<Option<Value>, CourierError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.write_delay().await;
        take_failure(&self.failing_updates)?;
        self.inner.update(collection, criteria, patch).await
    }

    async fn remove(&self, collection: &str, criteria: &Criteria) -> Result<bool, CourierError> {
        self.inner.remove(collection, criteria).await
    }
}

/// Consume one pending failure from `counter`, if any.
fn take_failure(counter: &AtomicUsize) -> Result<(), CourierError> {
    match counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)) {
        Ok(_) => Err(CourierError::storage(std::io::Error::other("disk full"))),
        Err(_) => Ok(()),
    }
}
