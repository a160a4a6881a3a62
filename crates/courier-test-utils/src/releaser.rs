// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resource releaser that only counts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use courier_core::{CourierError, ResourceReleaser};

/// Records every release attempt. Optionally fails them after counting.
#[derive(Default)]
pub struct CountingReleaser {
    releases: Mutex<HashMap<String, usize>>,
    fail: AtomicBool,
}

impl CountingReleaser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent releases return an error (they are still counted).
    pub fn fail_releases(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Release attempts for `reference`.
    pub fn count(&self, reference: &str) -> usize {
        self.lock().get(reference).copied().unwrap_or(0)
    }

    /// Release attempts across all references.
    pub fn total(&self) -> usize {
        self.lock().values().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
        self.releases.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ResourceReleaser for CountingReleaser {
    async fn release(&self, reference: &str) -> Result<(), CourierError> {
        *self.lock().entry(reference.to_string()).or_default() += 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(CourierError::ResourceRelease {
                reference: reference.to_string(),
                source: "release disabled by test".into(),
            });
        }
        Ok(())
    }
}
