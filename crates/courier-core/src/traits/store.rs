// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store adapter trait for durable record collections.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Criteria;

/// Adapter for keyed record collections.
///
/// Records are JSON objects grouped in named collections. There are no
/// transactions: each call reads the collection, applies the operation,
/// and writes it back.
#[async_trait]
pub trait StoreAdapter: PluginAdapter {
    /// Returns the first record matching `criteria`.
    async fn find(&self, collection: &str, criteria: &Criteria)
    -> Result<Option<Value>, CourierError>;

    /// Returns every record matching `criteria`, in persisted order.
    async fn filter(&self, collection: &str, criteria: &Criteria)
    -> Result<Vec<Value>, CourierError>;

    /// Appends a record to the end of the collection.
    async fn append(&self, collection: &str, record: Value) -> Result<(), CourierError>;

    /// Shallow-merges `patch` into the first matching record and returns the result.
    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        patch: Value,
    ) -> Result<Option<Value>, CourierError>;

    /// Removes every matching record. Returns whether anything was removed.
    async fn remove(&self, collection: &str, criteria: &Criteria) -> Result<bool, CourierError>;
}
