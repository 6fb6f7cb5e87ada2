// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process uptime backend.
//!
//! Keeps monitors in memory and journals every call it receives. Used by
//! `serve --dry-run` / `replay --dry-run` to show what the operator would do
//! without touching a real account, and by tests as a backend whose state can
//! be inspected.

use super::UptimeBackend;
use crate::monitor::{Contact, ContactId, MonitorId, MonitorRecord, MonitorSpec};
use crate::uptime_errors::BackendError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// A call received by [`InMemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    ListMonitors,
    ListContacts,
    Create(MonitorSpec),
    Delete(MonitorId),
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    monitors: BTreeMap<MonitorId, MonitorRecord>,
    calls: Vec<BackendCall>,
}

/// Uptime backend that lives entirely in process memory.
#[derive(Debug)]
pub struct InMemoryBackend {
    contacts: Vec<Contact>,
    state: Mutex<MemoryState>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Backend with a single contact (id 1) and no monitors.
    #[must_use]
    pub fn new() -> Self {
        Self::with_contacts(vec![Contact {
            id: ContactId(1),
            name: "dry-run".to_string(),
        }])
    }

    /// Backend with the given contacts and no monitors.
    #[must_use]
    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        Self {
            contacts,
            state: Mutex::new(MemoryState {
                next_id: 1,
                ..MemoryState::default()
            }),
        }
    }

    /// Seed an existing monitor, as if it had been created before startup.
    #[must_use]
    pub fn with_monitor(self, hostname: &str, name: &str, tls: bool) -> Self {
        {
            let mut state = self.lock();
            let id = MonitorId(state.next_id);
            state.next_id += 1;
            state.monitors.insert(
                id,
                MonitorRecord {
                    id,
                    hostname: hostname.to_string(),
                    name: name.to_string(),
                    tls,
                    interval_minutes: crate::constants::CHECK_INTERVAL_MINUTES,
                    contact_id: None,
                    created_at: None,
                },
            );
        }
        self
    }

    /// Monitors currently held, ordered by identifier.
    #[must_use]
    pub fn monitors(&self) -> Vec<MonitorRecord> {
        self.lock().monitors.values().cloned().collect()
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Number of create calls received so far.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, BackendCall::Create(_)))
            .count()
    }

    /// Number of delete calls received so far.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, BackendCall::Delete(_)))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave the maps half-updated
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl UptimeBackend for InMemoryBackend {
    async fn list_monitors(&self) -> Result<Vec<MonitorRecord>, BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::ListMonitors);
        Ok(state.monitors.values().cloned().collect())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, BackendError> {
        self.lock().calls.push(BackendCall::ListContacts);
        Ok(self.contacts.clone())
    }

    async fn create_monitor(&self, spec: &MonitorSpec) -> Result<MonitorRecord, BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Create(spec.clone()));

        let id = MonitorId(state.next_id);
        state.next_id += 1;
        let record = MonitorRecord::from_spec(id, spec);
        state.monitors.insert(id, record.clone());

        info!(
            hostname = %spec.hostname,
            name = %spec.name,
            monitor_id = %id,
            "[dry-run] monitor created"
        );
        Ok(record)
    }

    async fn delete_monitor(&self, id: MonitorId) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Delete(id));

        if state.monitors.remove(&id).is_none() {
            return Err(BackendError::Other {
                operation: "delete_monitor",
                message: format!("monitor {id} does not exist"),
            });
        }

        info!(monitor_id = %id, "[dry-run] monitor deleted");
        Ok(())
    }
}
