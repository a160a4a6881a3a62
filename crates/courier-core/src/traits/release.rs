// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Release of temporary resources staged for a job.

use async_trait::async_trait;

use crate::error::CourierError;

/// Deletes staged temporary resources.
///
/// Implementations must treat an already-missing resource as success.
#[async_trait]
pub trait ResourceReleaser: Send + Sync + 'static {
    /// Releases the resource behind `reference`.
    async fn release(&self, reference: &str) -> Result<(), CourierError>;
}
