// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier token` command implementation.

use courier_config::CourierConfig;
use courier_core::{CourierError, TenantId};
use courier_gateway::JwtAuthenticator;

/// Mint a bearer token for `tenant` with the configured secret.
pub fn mint(
    config: &CourierConfig,
    tenant: &str,
    username: Option<&str>,
    ttl_hours: Option<u64>,
) -> Result<String, CourierError> {
    let tenant = tenant.trim();
    if tenant.is_empty() {
        return Err(CourierError::Validation("tenant must not be empty".into()));
    }
    JwtAuthenticator::new(&config.auth).mint(&TenantId::from(tenant), username, ttl_hours)
}
