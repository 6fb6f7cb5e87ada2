// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch boundary: where resource events enter the operator.
//!
//! Watch streams only carry the latest state of an object, while the
//! reconciler needs the previous and current snapshot. The [`SnapshotStore`]
//! remembers the last snapshot seen per `namespace/name` and turns raw
//! observations into [`Notification`]s:
//!
//! - the first observation of a key is `Added`
//! - later observations are `Updated { previous, current }`
//! - deletions are `Deleted(Live)`
//! - objects that vanish during a relist (their delete event was missed) are
//!   `Deleted(Tombstone)` carrying the last known snapshot
//!
//! Two event sources feed the store:
//!
//! - [`run_ingress_watch`] - a kube watcher over `networking.k8s.io/v1` Ingress
//! - [`replay`] - Kubernetes watch-event JSON lines (`{"type": ..., "object": ...}`),
//!   as produced by `kubectl get --raw '/apis/networking.k8s.io/v1/ingresses?watch=1'`
//!
//! Untyped JSON is validated here and nowhere else: payloads that are not
//! Ingress objects are reported as malformed and dropped.

use crate::metrics;
use crate::notification::{DeletedResource, Notification, HANDLER_ON_ADD, HANDLER_ON_UPDATE};
use crate::reconciler::Reconciler;
use crate::resource::LogicalResource;
use crate::uptime_errors::MalformedNotification;
use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info, warn};

/// Last known snapshot of every routing resource seen on a watch.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<String, LogicalResource>,
    relist: Option<HashSet<String>>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `resource` exists in its current state.
    pub fn applied(&mut self, resource: LogicalResource) -> Notification {
        let key = resource.identity.key();
        if let Some(seen) = self.relist.as_mut() {
            seen.insert(key.clone());
        }

        match self.snapshots.insert(key, resource.clone()) {
            Some(previous) => Notification::Updated {
                previous,
                current: resource,
            },
            None => Notification::Added(resource),
        }
    }

    /// Record the deletion of a resource.
    pub fn deleted(&mut self, deleted: DeletedResource) -> Notification {
        let key = deleted.resource().identity.key();
        self.snapshots.remove(&key);
        if let Some(seen) = self.relist.as_mut() {
            seen.remove(&key);
        }
        Notification::Deleted(deleted)
    }

    /// Start a relist: every resource must be observed again before
    /// [`Self::finish_relist`] or it is considered deleted.
    pub fn begin_relist(&mut self) {
        self.relist = Some(HashSet::new());
    }

    /// End a relist and emit tombstones for resources that were not re-observed.
    pub fn finish_relist(&mut self) -> Vec<Notification> {
        let Some(seen) = self.relist.take() else {
            return Vec::new();
        };

        let vanished: Vec<String> = self
            .snapshots
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();

        vanished
            .into_iter()
            .filter_map(|key| {
                self.snapshots.remove(&key).map(|last_known| {
                    Notification::Deleted(DeletedResource::Tombstone { key, last_known })
                })
            })
            .collect()
    }

    /// Apply a decoded watch event.
    pub fn observe(&mut self, event: WatchEvent) -> Vec<Notification> {
        match event {
            WatchEvent::Applied(resource) => vec![self.applied(resource)],
            WatchEvent::Deleted(deleted) => vec![self.deleted(deleted)],
            WatchEvent::Bookmark | WatchEvent::Error(_) => Vec::new(),
        }
    }

    /// Number of resources currently known.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Kubernetes watch-event envelope.
#[derive(Debug, Deserialize)]
struct RawWatchEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    object: Value,
}

/// A validated watch event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// `ADDED` or `MODIFIED`
    Applied(LogicalResource),
    /// `DELETED`, possibly carrying a tombstone
    Deleted(DeletedResource),
    /// `BOOKMARK`; carries no object change
    Bookmark,
    /// `ERROR` reported by the API server
    Error(String),
}

/// Decode one watch-event JSON line.
///
/// # Errors
///
/// Returns [`MalformedNotification`] if the line is not a watch event or its
/// object is not an Ingress.
pub fn decode_watch_event(line: &str) -> Result<WatchEvent, MalformedNotification> {
    let raw: RawWatchEvent =
        serde_json::from_str(line).map_err(|e| MalformedNotification::InvalidEvent {
            reason: e.to_string(),
        })?;

    match raw.event_type.as_str() {
        "ADDED" => LogicalResource::from_value(HANDLER_ON_ADD, &raw.object).map(WatchEvent::Applied),
        "MODIFIED" => {
            LogicalResource::from_value(HANDLER_ON_UPDATE, &raw.object).map(WatchEvent::Applied)
        }
        "DELETED" => DeletedResource::from_value(&raw.object).map(WatchEvent::Deleted),
        "BOOKMARK" => Ok(WatchEvent::Bookmark),
        "ERROR" => Ok(WatchEvent::Error(
            raw.object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown watch error")
                .to_string(),
        )),
        other => Err(MalformedNotification::InvalidEvent {
            reason: format!("unknown event type {other:?}"),
        }),
    }
}

/// Counts from a [`replay`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub notifications: usize,
    pub malformed: usize,
}

/// Feed watch-event JSON lines from `reader` through a fresh store into the
/// reconciler, one at a time and in order.
///
/// Malformed lines are logged and skipped.
///
/// # Errors
///
/// Returns an error only if reading from `reader` fails.
pub async fn replay<R>(reader: R, reconciler: &Reconciler) -> std::io::Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut store = SnapshotStore::new();
    let mut summary = ReplaySummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        summary.events += 1;

        let event = match decode_watch_event(&line) {
            Ok(event) => event,
            Err(e) => {
                error!("{e}");
                metrics::record_notification("malformed");
                summary.malformed += 1;
                continue;
            }
        };

        if let WatchEvent::Error(message) = &event {
            warn!(error = %message, "Watch stream reported an error");
        }

        for notification in store.observe(event) {
            debug!(
                kind = notification.kind(),
                resource = %notification.identity(),
                "Dispatching notification"
            );
            reconciler.handle(notification).await;
            summary.notifications += 1;
        }
    }

    Ok(summary)
}

/// Translate a kube watcher event into notifications.
pub fn translate_event(store: &mut SnapshotStore, event: watcher::Event<Ingress>) -> Vec<Notification> {
    match event {
        watcher::Event::Init => {
            debug!("Ingress relist started");
            store.begin_relist();
            Vec::new()
        }
        watcher::Event::InitApply(ingress) | watcher::Event::Apply(ingress) => {
            vec![store.applied(LogicalResource::from(&ingress))]
        }
        watcher::Event::Delete(ingress) => {
            vec![store.deleted(DeletedResource::Live(LogicalResource::from(&ingress)))]
        }
        watcher::Event::InitDone => {
            let tombstones = store.finish_relist();
            debug!(
                known = store.len(),
                vanished = tombstones.len(),
                "Ingress relist finished"
            );
            tombstones
        }
    }
}

/// Watch Ingress objects and reconcile every change. Runs until the stream ends.
///
/// Watch errors are logged and the watcher resumes with backoff.
///
/// # Errors
///
/// Returns an error if the watch stream terminates.
pub async fn run_ingress_watch(
    client: Client,
    namespace: Option<&str>,
    reconciler: Reconciler,
) -> anyhow::Result<()> {
    let api: Api<Ingress> = match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };
    info!(namespace = namespace.unwrap_or("*"), "Starting Ingress watch");

    let mut store = SnapshotStore::new();
    let mut events = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                for notification in translate_event(&mut store, event) {
                    reconciler.handle(notification).await;
                }
            }
            Err(e) => warn!(error = %e, "Ingress watch error, retrying"),
        }
    }

    anyhow::bail!("Ingress watch stream ended unexpectedly")
}
