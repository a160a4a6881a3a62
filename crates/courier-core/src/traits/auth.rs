// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication adapter trait for resolving request credentials to tenants.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::TenantIdentity;

/// Adapter that turns a bearer credential into a tenant identity.
#[async_trait]
pub trait AuthAdapter: PluginAdapter {
    /// Authenticates the given token and returns the verified tenant identity.
    async fn authenticate(&self, token: &str) -> Result<TenantIdentity, CourierError>;
}
