// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of declared hostnames against the monitor registry.
//!
//! Given the previous and current snapshot of one routing resource, the
//! reconciler creates a monitor for every hostname the current snapshot
//! declares and deletes the monitor of every hostname only the previous
//! snapshot declared.
//!
//! # Algorithm
//!
//! 1. Identical snapshots (including both absent) are a no-op.
//! 2. A missing snapshot is replaced by an empty resource carrying the other
//!    snapshot's identity.
//! 3. Every routable hostname of the current snapshot is marked active, then
//!    created unless the registry already has it. On an update, an existing
//!    monitor whose name or TLS flag no longer matches is deleted and created
//!    again, since the backend cannot update monitors in place.
//! 4. Every routable hostname of the previous snapshot that is not active is
//!    deleted.
//!
//! Failures are scoped to one hostname: they are logged and the remaining
//! hostnames are still processed. The reconciler keeps no state of its own;
//! everything lives in the [`MonitorRegistry`], which also owns all locking.

use crate::metrics;
use crate::monitor::MonitorSpec;
use crate::notification::{DeletedResource, Notification};
use crate::registry::MonitorRegistry;
use crate::resource::LogicalResource;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, Instrument, Span};

/// Action attempted for a hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Create,
    Recreate,
    Delete,
}

/// A hostname whose action failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFailure {
    pub hostname: String,
    pub action: HostAction,
    pub error: String,
}

/// What one reconciliation did, hostname by hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: Vec<String>,
    pub recreated: Vec<String>,
    pub deleted: Vec<String>,
    /// Hostnames whose existing monitor was left untouched.
    pub unchanged: Vec<String>,
    /// Hostnames to remove that had no cached monitor.
    pub missing: Vec<String>,
    /// Rules skipped for lack of a hostname.
    pub skipped_rules: usize,
    pub failures: Vec<HostFailure>,
}

impl ReconcileOutcome {
    /// Whether no monitor was created, recreated or deleted.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.recreated.is_empty() && self.deleted.is_empty()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn fail(&mut self, hostname: &str, action: HostAction, error: impl ToString) {
        self.failures.push(HostFailure {
            hostname: hostname.to_string(),
            action,
            error: error.to_string(),
        });
    }
}

/// Drives the monitor registry from resource-change notifications.
#[derive(Debug, Clone)]
pub struct Reconciler {
    registry: Arc<MonitorRegistry>,
    span: Span,
}

impl Reconciler {
    /// Create a reconciler logging under `span`.
    #[must_use]
    pub fn new(registry: Arc<MonitorRegistry>, span: Span) -> Self {
        Self { registry, span }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<MonitorRegistry> {
        &self.registry
    }

    /// Dispatch a notification to the matching handler.
    pub async fn handle(&self, notification: Notification) {
        match notification {
            Notification::Added(resource) => self.on_add(&resource).await,
            Notification::Updated { previous, current } => self.on_update(&previous, &current).await,
            Notification::Deleted(deleted) => self.on_delete(deleted).await,
        }
    }

    /// A resource appeared.
    pub async fn on_add(&self, resource: &LogicalResource) {
        metrics::record_notification("added");
        self.run(None, Some(resource)).await;
    }

    /// A resource changed from `previous` to `current`.
    pub async fn on_update(&self, previous: &LogicalResource, current: &LogicalResource) {
        metrics::record_notification("updated");
        self.run(Some(previous), Some(current)).await;
    }

    /// A resource disappeared. Tombstones are unwrapped first.
    pub async fn on_delete(&self, deleted: DeletedResource) {
        metrics::record_notification("deleted");
        if deleted.is_tombstone() {
            debug!(parent: &self.span, resource = %deleted.resource().identity, "Unwrapping tombstone");
        }
        let resource = deleted.unwrap_tombstone();
        self.run(Some(&resource), None).await;
    }

    async fn run(&self, previous: Option<&LogicalResource>, current: Option<&LogicalResource>) {
        let start = Instant::now();
        let outcome = self.reconcile(previous, current).await;

        if outcome.has_failures() {
            metrics::record_reconciliation_error(start.elapsed());
        } else {
            metrics::record_reconciliation_success(start.elapsed());
        }

        if !outcome.is_noop() || outcome.has_failures() {
            info!(
                parent: &self.span,
                created = outcome.created.len(),
                recreated = outcome.recreated.len(),
                deleted = outcome.deleted.len(),
                failed = outcome.failures.len(),
                "Reconciliation finished"
            );
        }
    }

    /// Converge the registry from `previous` to `current`.
    ///
    /// Never fails as a whole: per-hostname failures are logged and collected
    /// in the returned outcome.
    pub async fn reconcile(
        &self,
        previous: Option<&LogicalResource>,
        current: Option<&LogicalResource>,
    ) -> ReconcileOutcome {
        // Only an update may replace an existing monitor
        let is_update = previous.is_some() && current.is_some();

        // Only the very same snapshot is skipped. Equal but distinct snapshots
        // still converge, so a host whose create failed is retried.
        let (previous, current): (Cow<'_, LogicalResource>, Cow<'_, LogicalResource>) =
            match (previous, current) {
                (Some(p), Some(c)) if std::ptr::eq(p, c) => return ReconcileOutcome::default(),
                (Some(p), Some(c)) => (Cow::Borrowed(p), Cow::Borrowed(c)),
                (None, Some(c)) => (Cow::Owned(c.empty_like()), Cow::Borrowed(c)),
                (Some(p), None) => (Cow::Borrowed(p), Cow::Owned(p.empty_like())),
                (None, None) => return ReconcileOutcome::default(),
            };

        let span = info_span!(parent: &self.span, "reconcile", resource = %current.identity);
        self.converge(&previous, &current, is_update)
            .instrument(span)
            .await
    }

    async fn converge(
        &self,
        previous: &LogicalResource,
        current: &LogicalResource,
        is_update: bool,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let mut active: HashSet<&str> = HashSet::new();

        for (index, rule) in current.rules.iter().enumerate() {
            if !rule.is_routable() {
                debug!(rule = index, "Skipping rule, missing host");
                outcome.skipped_rules += 1;
                continue;
            }

            let hostname = rule.hostname.as_str();
            // Marked before any backend call so step 4 never removes a declared host
            if !active.insert(hostname) {
                continue;
            }

            let spec = MonitorSpec::for_host(&current.identity, hostname, current.is_tls(hostname));

            let existing = match self.registry.get(hostname).await {
                Ok(existing) => existing,
                Err(e) => {
                    error!(hostname = %hostname, error = %e, "Failed to look up monitor");
                    outcome.fail(hostname, HostAction::Create, e);
                    continue;
                }
            };

            match existing {
                Some(record) if !is_update || spec.matches(&record) => {
                    info!(hostname = %hostname, monitor_id = %record.id, "Monitor already exists, skipping");
                    outcome.unchanged.push(hostname.to_string());
                }
                Some(record) => {
                    info!(
                        hostname = %hostname,
                        monitor_id = %record.id,
                        from = %record.name,
                        to = %spec.name,
                        tls = spec.tls,
                        "Monitor out of date, recreating"
                    );
                    match self.registry.replace(spec).await {
                        Ok(id) => {
                            info!(hostname = %hostname, monitor_id = %id, "Monitor recreated");
                            outcome.recreated.push(hostname.to_string());
                        }
                        Err(e) => {
                            error!(hostname = %hostname, error = %e, "Failed to recreate monitor");
                            outcome.fail(hostname, HostAction::Recreate, e);
                        }
                    }
                }
                None => match self.registry.create(spec).await {
                    Ok(id) => {
                        info!(hostname = %hostname, monitor_id = %id, "Monitor created");
                        outcome.created.push(hostname.to_string());
                    }
                    Err(e) => {
                        error!(hostname = %hostname, error = %e, "Failed to create monitor");
                        outcome.fail(hostname, HostAction::Create, e);
                    }
                },
            }
        }

        let mut removed: HashSet<&str> = HashSet::new();
        for (index, rule) in previous.rules.iter().enumerate() {
            if !rule.is_routable() {
                debug!(rule = index, "Skipping rule, missing host");
                outcome.skipped_rules += 1;
                continue;
            }

            let hostname = rule.hostname.as_str();
            if active.contains(hostname) || !removed.insert(hostname) {
                continue;
            }

            match self.registry.exists(hostname).await {
                Ok(true) => {}
                Ok(false) => {
                    error!(hostname = %hostname, "No cached monitor for hostname, nothing to delete");
                    outcome.missing.push(hostname.to_string());
                    continue;
                }
                Err(e) => {
                    error!(hostname = %hostname, error = %e, "Failed to look up monitor");
                    outcome.fail(hostname, HostAction::Delete, e);
                    continue;
                }
            }

            match self.registry.delete(hostname).await {
                Ok(()) => {
                    info!(hostname = %hostname, "Monitor deleted");
                    outcome.deleted.push(hostname.to_string());
                }
                Err(e) => {
                    error!(hostname = %hostname, error = %e, "Failed to delete monitor");
                    outcome.fail(hostname, HostAction::Delete, e);
                }
            }
        }

        outcome
    }
}
