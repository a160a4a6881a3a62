// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-job exclusive claims shared by the dispatch loop and cancellation.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use courier_core::JobId;

/// Keyed async locks. Entries exist only while someone holds or awaits them.
#[derive(Default)]
pub(crate) struct JobClaims {
    locks: DashMap<JobId, Arc<Mutex<()>>>,
}

/// Exclusive hold on one job; released on drop.
pub(crate) struct Claim<'a> {
    claims: &'a JobClaims,
    id: JobId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl JobClaims {
    /// Wait until no one else holds `id`, then hold it.
    pub(crate) async fn claim(&self, id: &JobId) -> Claim<'_> {
        let lock = Arc::clone(self.locks.entry(id.clone()).or_default().value());
        let guard = lock.lock_owned().await;
        Claim {
            claims: self,
            id: id.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody is waiting.
        self.claims
            .locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn claims_are_exclusive_per_job() {
        let claims = JobClaims::default();
        let a = JobId::from("a");

        let held = claims.claim(&a).await;
        let blocked = tokio::time::timeout(Duration::from_millis(20), claims.claim(&a)).await;
        assert!(blocked.is_err(), "second claim must wait");

        let other = claims.claim(&JobId::from("b")).await;
        drop(other);
        drop(held);

        let again = tokio::time::timeout(Duration::from_millis(20), claims.claim(&a)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn entries_are_dropped_when_unused() {
        let claims = JobClaims::default();
        {
            let _a = claims.claim(&JobId::from("a")).await;
            assert_eq!(claims.len(), 1);
        }
        assert_eq!(claims.len(), 0);
    }
}
