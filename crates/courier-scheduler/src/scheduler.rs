// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job persistence and the polling dispatch loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use courier_config::SchedulerConfig;
use courier_core::{
    CourierError, Criteria, JobContent, JobId, JobStatus, PayloadKind, ResourceReleaser,
    SCHEDULES_COLLECTION, ScheduledJob, StoreAdapter, TenantId, TransportDirectory,
};

use crate::bridge::DispatchBridge;
use crate::claims::JobClaims;
use crate::time::{now_in, parse_due_at};

/// Caller input for [`Scheduler::schedule`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobRequest {
    pub recipient: String,
    pub payload_kind: PayloadKind,
    pub content: JobContent,
    /// RFC 3339, or naive `YYYY-MM-DDTHH:MM[:SS]` in the reference zone.
    pub due_at: String,
}

/// What one `tick` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Another tick was still running; nothing was attempted.
    pub skipped: bool,
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
    /// Due jobs cancelled before they could be dispatched.
    pub cancelled: usize,
    /// Due jobs left pending because they could not be re-read.
    pub deferred: usize,
}

enum JobOutcome {
    Sent,
    Failed,
    Cancelled,
    Deferred,
}

struct Runner {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    store: Arc<dyn StoreAdapter>,
    bridge: DispatchBridge,
    releaser: Arc<dyn ResourceReleaser>,
    tz: Tz,
    poll_interval: Duration,
    run_on_start: bool,
    /// Held for the duration of a tick; a tick that cannot take it is skipped.
    tick_guard: Mutex<()>,
    /// Serializes the ownership check and insert of jobs with temporary media.
    temporary_guard: Mutex<()>,
    claims: JobClaims,
    /// Outcomes of jobs dispatched by this process that the store has not
    /// accepted yet. These jobs still read `pending` and must not be picked up
    /// again.
    unrecorded: DashMap<JobId, Value>,
    runner: Mutex<Option<Runner>>,
}

/// Owns the `schedules` collection and the polling loop. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        directory: Arc<dyn TransportDirectory>,
        releaser: Arc<dyn ResourceReleaser>,
        config: &SchedulerConfig,
    ) -> Result<Self, CourierError> {
        let tz = config.tz().map_err(CourierError::Config)?;
        if config.poll_interval_secs == 0 {
            return Err(CourierError::Config(
                "scheduler.poll_interval_secs must be greater than 0".into(),
            ));
        }
        let bridge =
            DispatchBridge::new(directory, Duration::from_secs(config.send_timeout_secs));
        Ok(Self {
            inner: Arc::new(SchedulerInner {
                store,
                bridge,
                releaser,
                tz,
                poll_interval: Duration::from_secs(config.poll_interval_secs),
                run_on_start: config.run_on_start,
                tick_guard: Mutex::new(()),
                temporary_guard: Mutex::new(()),
                claims: JobClaims::default(),
                unrecorded: DashMap::new(),
                runner: Mutex::new(None),
            }),
        })
    }

    pub fn timezone(&self) -> Tz {
        self.inner.tz
    }

    /// The bridge jobs are dispatched through; also usable for immediate sends.
    pub fn bridge(&self) -> &DispatchBridge {
        &self.inner.bridge
    }

    /// Validate and persist a new pending job.
    ///
    /// The tenant's session does not need to exist yet. Nothing is written when
    /// validation fails. Due times in the past are accepted and dispatched on
    /// the next tick.
    pub async fn schedule(
        &self,
        tenant_id: &TenantId,
        request: JobRequest,
    ) -> Result<ScheduledJob, CourierError> {
        let recipient = request.recipient.trim();
        if recipient.is_empty() {
            return Err(CourierError::Validation("recipient must not be empty".into()));
        }
        let content = request.content.normalize_for(request.payload_kind)?;
        let due_at = parse_due_at(&request.due_at, self.inner.tz)?;

        let _owning = match content.temporary_resource() {
            Some(resource) => {
                let guard = self.inner.temporary_guard.lock().await;
                if self.pending_owner_of(resource).await?.is_some() {
                    return Err(CourierError::Validation(
                        "temporary media is already attached to a pending job".into(),
                    ));
                }
                Some(guard)
            }
            None => None,
        };

        let job = ScheduledJob {
            id: JobId(uuid::Uuid::new_v4().to_string()),
            tenant_id: tenant_id.clone(),
            recipient: recipient.to_string(),
            payload_kind: request.payload_kind,
            content,
            due_at,
            status: JobStatus::Pending,
            created_at: now_in(self.inner.tz),
            executed_at: None,
            error: None,
        };
        self.inner
            .store
            .append(SCHEDULES_COLLECTION, serde_json::to_value(&job)?)
            .await?;

        info!(
            tenant_id = %tenant_id,
            job_id = %job.id,
            kind = %job.payload_kind,
            due_at = %job.due_at,
            "job scheduled"
        );
        Ok(job)
    }

    /// The pending job that owns `resource` as its temporary file, if any.
    async fn pending_owner_of(&self, resource: &str) -> Result<Option<JobId>, CourierError> {
        let pending = self
            .inner
            .store
            .filter(
                SCHEDULES_COLLECTION,
                &Criteria::all().field("status", JobStatus::Pending.to_string()),
            )
            .await?;
        Ok(pending
            .into_iter()
            .filter_map(decode)
            .find(|job| job.content.temporary_resource() == Some(resource))
            .map(|job| job.id))
    }

    /// The tenant's jobs in persisted order.
    pub async fn list(&self, tenant_id: &TenantId) -> Result<Vec<ScheduledJob>, CourierError> {
        let records = self
            .inner
            .store
            .filter(
                SCHEDULES_COLLECTION,
                &Criteria::all().field("tenant_id", tenant_id.as_str()),
            )
            .await?;
        Ok(records.into_iter().filter_map(decode).collect())
    }

    /// Remove a job owned by `tenant_id`.
    ///
    /// A pending job's temporary resource is released here. If the job is
    /// being dispatched right now this waits for the dispatch to finish first,
    /// so the resource is released by exactly one side. Returns `false` when
    /// nothing matched, including jobs owned by another tenant.
    pub async fn cancel(&self, tenant_id: &TenantId, job_id: &JobId) -> Result<bool, CourierError> {
        let _claim = self.inner.claims.claim(job_id).await;
        let criteria = Criteria::all()
            .field("id", job_id.as_str())
            .field("tenant_id", tenant_id.as_str());

        let Some(record) = self.inner.store.find(SCHEDULES_COLLECTION, &criteria).await? else {
            debug!(tenant_id = %tenant_id, job_id = %job_id, "cancel: no such job for tenant");
            return Ok(false);
        };
        if !self.inner.store.remove(SCHEDULES_COLLECTION, &criteria).await? {
            return Ok(false);
        }
        // Dispatched already; the dispatch released the resource.
        let dispatched = self.inner.unrecorded.remove(job_id).is_some();

        if !dispatched
            && let Some(job) = decode(record)
            && job.status == JobStatus::Pending
            && let Some(resource) = job.content.temporary_resource()
        {
            self.release(&job, resource).await;
        }
        info!(tenant_id = %tenant_id, job_id = %job_id, "job cancelled");
        Ok(true)
    }

    /// Dispatch every pending job whose due time has passed.
    ///
    /// Jobs of one tenant run in persisted order; tenants run concurrently.
    /// One job's failure is recorded on that job and never aborts the tick.
    pub async fn tick(&self) -> TickReport {
        let Ok(_running) = self.inner.tick_guard.try_lock() else {
            debug!("previous tick still running, skipping");
            return TickReport {
                skipped: true,
                ..TickReport::default()
            };
        };

        self.flush_unrecorded().await;

        let now = now_in(self.inner.tz);
        let pending = match self
            .inner
            .store
            .filter(
                SCHEDULES_COLLECTION,
                &Criteria::all().field("status", JobStatus::Pending.to_string()),
            )
            .await
        {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to load scheduled jobs");
                return TickReport::default();
            }
        };

        let mut batches: BTreeMap<TenantId, Vec<ScheduledJob>> = BTreeMap::new();
        for job in pending.into_iter().filter_map(decode) {
            if job.is_due(&now) && !self.inner.unrecorded.contains_key(&job.id) {
                batches.entry(job.tenant_id.clone()).or_default().push(job);
            }
        }

        let mut report = TickReport {
            due: batches.values().map(Vec::len).sum(),
            ..TickReport::default()
        };
        if report.due == 0 {
            return report;
        }
        debug!(due = report.due, tenants = batches.len(), "dispatching due jobs");

        let outcomes = join_all(batches.into_values().map(|jobs| self.run_batch(jobs))).await;
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                JobOutcome::Sent => report.sent += 1,
                JobOutcome::Failed => report.failed += 1,
                JobOutcome::Cancelled => report.cancelled += 1,
                JobOutcome::Deferred => report.deferred += 1,
            }
        }
        report
    }

    async fn run_batch(&self, jobs: Vec<ScheduledJob>) -> Vec<JobOutcome> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            outcomes.push(self.run_job(job).await);
        }
        outcomes
    }

    async fn run_job(&self, job: ScheduledJob) -> JobOutcome {
        let _claim = self.inner.claims.claim(&job.id).await;
        let by_id = Criteria::all().field("id", job.id.as_str());

        // The snapshot may be stale: the job could have been cancelled since.
        let current = match self.inner.store.find(SCHEDULES_COLLECTION, &by_id).await {
            Ok(record) => record.and_then(decode),
            Err(e) => {
                error!(job_id = %job.id, error = %e, "failed to re-read job, leaving it pending");
                return JobOutcome::Deferred;
            }
        };
        let Some(job) = current.filter(|j| j.status == JobStatus::Pending) else {
            debug!(job_id = %job.id, "job cancelled before dispatch");
            return JobOutcome::Cancelled;
        };

        let result = self
            .inner
            .bridge
            .dispatch(&job.tenant_id, &job.to_outbound())
            .await;

        let (outcome, patch) = match &result {
            Ok(message_id) => {
                info!(
                    tenant_id = %job.tenant_id,
                    job_id = %job.id,
                    message_id = %message_id.0,
                    "scheduled message sent"
                );
                (
                    JobOutcome::Sent,
                    json!({
                        "status": JobStatus::Sent,
                        "executed_at": now_in(self.inner.tz),
                        "error": null,
                    }),
                )
            }
            Err(e) => {
                warn!(
                    tenant_id = %job.tenant_id,
                    job_id = %job.id,
                    error = %e,
                    "scheduled message failed"
                );
                (
                    JobOutcome::Failed,
                    json!({
                        "status": JobStatus::Failed,
                        "error": e.to_string(),
                    }),
                )
            }
        };

        match self
            .inner
            .store
            .update(SCHEDULES_COLLECTION, &by_id, patch.clone())
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => debug!(job_id = %job.id, "job record vanished during dispatch"),
            Err(e) => {
                error!(job_id = %job.id, error = %e, "failed to record job outcome, will retry");
                self.inner.unrecorded.insert(job.id.clone(), patch);
            }
        }

        if let Some(resource) = job.content.temporary_resource() {
            self.release(&job, resource).await;
        }
        outcome
    }

    async fn release(&self, job: &ScheduledJob, resource: &str) {
        if let Err(e) = self.inner.releaser.release(resource).await {
            warn!(job_id = %job.id, error = %e, "failed to release temporary resource");
        }
    }

    /// Start the polling loop. Returns `false` if it is already running.
    pub async fn start(&self) -> bool {
        let mut runner = self.inner.runner.lock().await;
        if runner.is_some() {
            return false;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.clone().run(cancel.clone()));
        *runner = Some(Runner { cancel, handle });
        info!(
            interval_secs = self.inner.poll_interval.as_secs(),
            timezone = %self.inner.tz,
            "scheduler started"
        );
        true
    }

    /// Stop the polling loop, letting an in-flight tick finish.
    pub async fn stop(&self) {
        let runner = self.inner.runner.lock().await.take();
        if let Some(Runner { cancel, handle }) = runner {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "scheduler task ended abnormally");
            }
            info!("scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.runner.lock().await.is_some()
    }

    /// Retry persisting outcomes the store refused earlier.
    async fn flush_unrecorded(&self) {
        let ids: Vec<JobId> = self
            .inner
            .unrecorded
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for id in ids {
            let _claim = self.inner.claims.claim(&id).await;
            let Some(patch) = self.inner.unrecorded.get(&id).map(|p| p.value().clone()) else {
                continue;
            };
            let by_id = Criteria::all().field("id", id.as_str());
            match self.inner.store.update(SCHEDULES_COLLECTION, &by_id, patch).await {
                Ok(_) => {
                    self.inner.unrecorded.remove(&id);
                    debug!(job_id = %id, "recorded job outcome on retry");
                }
                Err(e) => warn!(job_id = %id, error = %e, "job outcome still not recorded"),
            }
        }
    }

    async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.inner.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.inner.run_on_start {
            // The first tick of an interval completes immediately.
            interval.tick().await;
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            let report = self.tick().await;
            if report.due > 0 {
                info!(
                    due = report.due,
                    sent = report.sent,
                    failed = report.failed,
                    cancelled = report.cancelled,
                    deferred = report.deferred,
                    "scheduler tick finished"
                );
            }
        }
    }
}

fn decode(record: Value) -> Option<ScheduledJob> {
    match serde_json::from_value::<ScheduledJob>(record) {
        Ok(job) => Some(job),
        Err(e) => {
            warn!(error = %e, "skipping malformed job record");
            None
        }
    }
}
