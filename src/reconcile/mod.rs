//! Reconciler
//!
//! Turns one policy notification into one pass over the live resource set:
//!
//! ```text
//! PolicyEvent
//!     |
//!     +-- extract_policy        -> InvalidPolicy   (skip pass)
//!     +-- registry.get(kind)    -> UnsupportedKind (skip pass)
//!     +-- adapter.list(ns)      -> ListFailed      (skip pass)
//!     |
//!     +-- for each candidate, in listing order
//!           name filter -> annotation filter -> expiry -> adapter.delete
//! ```
//!
//! Passes share nothing but the read-only adapter registry and atomic
//! counters, so any number may run concurrently, including two passes for
//! the same policy. Nothing here is fatal to the process.

pub mod report;
pub mod retry;

use crate::adapter::{AdapterRegistry, ResourceAdapter};
use crate::core::{
    CandidateResource, DeleteOutcome, PolicyEvent, PolicyObject, PolicyRef, Result, TtlError,
};
use crate::metrics::ControllerMetrics;
use crate::policy::{TtlPolicy, expires_at, extract_policy, is_expired, matches};
use crate::shutdown::Shutdown;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub use report::{CandidateReport, Decision, PassOutcome, PassReport};
pub use retry::RetryPolicy;

/// Tunables for a [`Reconciler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Deadline for every single `list`/`delete` attempt.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    /// Evaluate and report, but never call `delete`.
    pub dry_run: bool,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            dry_run: false,
        }
    }
}

#[derive(Clone)]
pub struct Reconciler {
    registry: Arc<AdapterRegistry>,
    settings: ReconcilerSettings,
    metrics: Arc<ControllerMetrics>,
    shutdown: Shutdown,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Reconciler {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            settings: ReconcilerSettings::default(),
            metrics: Arc::new(ControllerMetrics::default()),
            shutdown: Shutdown::never(),
        }
    }

    pub fn with_settings(mut self, settings: ReconcilerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ControllerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<ControllerMetrics> {
        &self.metrics
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Handles one notification. `Deleted` only logs: there is no
    /// per-policy state to release and no cleanup is implied.
    pub async fn handle(&self, event: PolicyEvent) -> Option<PassReport> {
        match event {
            PolicyEvent::Added(object) | PolicyEvent::Updated(object) => {
                Some(self.reconcile(&object).await)
            }
            PolicyEvent::Deleted(object) => {
                self.metrics.on_policy_deleted();
                info!(policy = %object.id, "Policy deleted, no longer tracked");
                None
            }
        }
    }

    /// Extracts the policy from `object` and runs a pass for it.
    pub async fn reconcile(&self, object: &PolicyObject) -> PassReport {
        match extract_policy(&object.body) {
            Ok(policy) => self.run_pass(&object.id, &policy).await,
            Err(err) => {
                self.metrics.on_pass();
                self.metrics.on_pass_skipped();
                self.metrics.on_invalid_policy();
                warn!(
                    policy = %object.id,
                    error_kind = err.kind(),
                    error = %err,
                    "Skipping invalid policy"
                );
                PassReport::start(&object.id).finish(PassOutcome::Skipped(err))
            }
        }
    }

    /// Evaluates `policy` against the current live resource set.
    pub async fn run_pass(&self, id: &PolicyRef, policy: &TtlPolicy) -> PassReport {
        self.metrics.on_pass();

        let mut report = PassReport::start(id);
        report.kind = Some(policy.kind.clone());
        report.namespace = Some(policy.namespace.clone());

        let adapter = match self.registry.get(&policy.kind) {
            Ok(adapter) => adapter,
            Err(err) => {
                self.metrics.on_pass_skipped();
                self.metrics.on_unsupported_kind();
                warn!(
                    policy = %id,
                    kind = %policy.kind,
                    error_kind = err.kind(),
                    error = %err,
                    "No adapter registered for kind"
                );
                return report.finish(PassOutcome::Skipped(err));
            }
        };

        let candidates = match self.list_candidates(adapter.as_ref(), policy).await {
            Ok(candidates) => candidates,
            Err(err) => {
                self.metrics.on_pass_skipped();
                if matches!(err, TtlError::ListFailed { .. }) {
                    self.metrics.on_list_failure();
                }
                error!(
                    policy = %id,
                    kind = %policy.kind,
                    namespace = %policy.namespace,
                    error_kind = err.kind(),
                    error = %err,
                    "Listing candidates failed, skipping pass"
                );
                return report.finish(PassOutcome::Skipped(err));
            }
        };

        let now = Utc::now();
        debug!(
            policy = %id,
            kind = %policy.kind,
            namespace = %policy.namespace,
            candidates = candidates.len(),
            ttl_seconds = policy.ttl.as_secs(),
            "Evaluating candidates"
        );

        for candidate in &candidates {
            let decision = match self.decide(adapter.as_ref(), policy, candidate, now).await {
                Ok(decision) => decision,
                Err(err) => {
                    warn!(
                        policy = %id,
                        candidate = %candidate.name,
                        error_kind = err.kind(),
                        error = %err,
                        "Pass aborted"
                    );
                    return report.finish(PassOutcome::Aborted(err));
                }
            };

            self.record(id, policy, candidate, &decision);
            report.candidates.push(CandidateReport {
                name: candidate.name.clone(),
                created_at: candidate.created_at,
                decision,
            });
        }

        let report = report.finish(PassOutcome::Completed);
        info!(
            policy = %id,
            kind = %policy.kind,
            namespace = %policy.namespace,
            candidates = report.candidates.len(),
            selected = report.selected().len(),
            expired = report.expired().len(),
            deleted = report.deleted().len(),
            failed = report.failed().len(),
            "Pass complete"
        );
        report
    }

    /// Runs the filter chain for one candidate and deletes it if expired.
    ///
    /// Only cancellation is returned as an error; a failed delete is a
    /// decision like any other.
    async fn decide(
        &self,
        adapter: &dyn ResourceAdapter,
        policy: &TtlPolicy,
        candidate: &CandidateResource,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        if !policy.selects_name(candidate) {
            return Ok(Decision::NameMismatch);
        }
        if !matches(&candidate.annotations, &policy.required_annotations) {
            return Ok(Decision::AnnotationMismatch);
        }
        if !is_expired(candidate.created_at, policy.ttl, now) {
            return Ok(Decision::NotExpired {
                expires_at: expires_at(candidate.created_at, policy.ttl),
            });
        }
        if self.settings.dry_run {
            return Ok(Decision::WouldDelete);
        }

        match self.delete_candidate(adapter, policy, candidate).await {
            Ok(DeleteOutcome::Deleted) => Ok(Decision::Deleted),
            Ok(DeleteOutcome::AlreadyGone) => Ok(Decision::AlreadyGone),
            Err(err @ TtlError::Cancelled(_)) => Err(err),
            Err(err) => Ok(Decision::DeleteFailed(err)),
        }
    }

    /// Emits the log line and counters for one decision.
    fn record(
        &self,
        id: &PolicyRef,
        policy: &TtlPolicy,
        candidate: &CandidateResource,
        decision: &Decision,
    ) {
        let label = decision.label();
        match decision {
            Decision::NameMismatch | Decision::AnnotationMismatch => {
                debug!(policy = %id, kind = %policy.kind, candidate = %candidate.name, decision = label, "Candidate skipped");
            }
            Decision::NotExpired { expires_at } => {
                debug!(
                    policy = %id,
                    kind = %policy.kind,
                    candidate = %candidate.name,
                    decision = label,
                    expires_at = ?expires_at,
                    "Candidate not expired"
                );
            }
            Decision::WouldDelete => {
                info!(policy = %id, kind = %policy.kind, candidate = %candidate.name, decision = label, "Dry run, candidate expired");
            }
            Decision::Deleted => {
                self.metrics.on_deleted();
                info!(
                    policy = %id,
                    kind = %policy.kind,
                    namespace = %policy.namespace,
                    candidate = %candidate.name,
                    decision = label,
                    created_at = %candidate.created_at,
                    "Deleted expired resource"
                );
            }
            Decision::AlreadyGone => {
                self.metrics.on_already_gone();
                info!(policy = %id, kind = %policy.kind, candidate = %candidate.name, decision = label, "Expired resource already gone");
            }
            Decision::DeleteFailed(err) => {
                self.metrics.on_delete_failure();
                error!(
                    policy = %id,
                    kind = %policy.kind,
                    namespace = %policy.namespace,
                    candidate = %candidate.name,
                    decision = label,
                    error = %err,
                    "Failed to delete expired resource"
                );
            }
        }
    }

    async fn list_candidates(
        &self,
        adapter: &dyn ResourceAdapter,
        policy: &TtlPolicy,
    ) -> Result<Vec<CandidateResource>> {
        let timeout = self.settings.call_timeout;
        self.call(
            "list",
            || TtlError::ListFailed {
                kind: policy.kind.to_string(),
                namespace: policy.namespace.clone(),
                reason: format!("timed out after {:?}", timeout),
            },
            || adapter.list(&policy.namespace),
        )
        .await
    }

    async fn delete_candidate(
        &self,
        adapter: &dyn ResourceAdapter,
        policy: &TtlPolicy,
        candidate: &CandidateResource,
    ) -> Result<DeleteOutcome> {
        let timeout = self.settings.call_timeout;
        // Namespace always comes from the policy, never from the listing.
        self.call(
            "delete",
            || TtlError::DeleteFailed {
                kind: policy.kind.to_string(),
                namespace: policy.namespace.clone(),
                name: candidate.name.clone(),
                reason: format!("timed out after {:?}", timeout),
            },
            || adapter.delete(&policy.namespace, &candidate.name),
        )
        .await
    }

    /// Runs `call` under the per-attempt deadline and the retry policy,
    /// racing every attempt and backoff against shutdown.
    async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        timeout_error: impl Fn() -> TtlError,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let retry = &self.settings.retry;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = self.shutdown.wait() => return Err(cancelled(operation)),
                result = tokio::time::timeout(self.settings.call_timeout, call()) => {
                    result.unwrap_or_else(|_| Err(timeout_error()))
                }
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if retry.should_retry(attempt, &err) => {
                    let backoff = retry.backoff(attempt);
                    debug!(
                        operation,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Retrying after failure"
                    );
                    tokio::select! {
                        biased;
                        _ = self.shutdown.wait() => return Err(cancelled(operation)),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn cancelled(operation: &str) -> TtlError {
    TtlError::Cancelled(format!("{} interrupted by shutdown", operation))
}
