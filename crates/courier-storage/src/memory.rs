// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local store with the same semantics as [`crate::JsonStore`].

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use courier_core::{
    AdapterType, CourierError, Criteria, HealthStatus, PluginAdapter, StoreAdapter,
};

use crate::document::Document;

/// Nothing survives the process. Used by tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    doc: Mutex<Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
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
impl StoreAdapter for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Option<Value>, CourierError> {
        Ok(self.doc.lock().await.find(collection, criteria))
    }

    async fn filter(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> Result<Vec<Value>, CourierError> {
        Ok(self.doc.lock().await.filter(collection, criteria))
    }

    async fn append(&self, collection: &str, record: Value) -> Result<(), CourierError> {
        self.doc.lock().await.append(collection, record);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        patch: Value,
    ) -> Result<Option<Value>, CourierError> {
        Ok(self.doc.lock().await.update(collection, criteria, patch))
    }

    async fn remove(&self, collection: &str, criteria: &Criteria) -> Result<bool, CourierError> {
        Ok(self.doc.lock().await.remove(collection, criteria))
    }
}
