// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Test doubles shared by the unit tests.

use crate::backend::memory::InMemoryBackend;
use crate::backend::UptimeBackend;
use crate::monitor::{Contact, MonitorId, MonitorRecord, MonitorSpec};
use crate::registry::{MonitorRegistry, RegistryConfig};
use crate::uptime_errors::BackendError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory backend that can be told to fail for chosen hostnames.
#[derive(Debug, Default)]
pub(crate) struct FlakyBackend {
    pub inner: InMemoryBackend,
    fail_create: Mutex<HashSet<String>>,
    fail_delete: Mutex<HashSet<String>>,
    fail_list: AtomicBool,
    create_delay: Option<Duration>,
}

impl FlakyBackend {
    pub fn new(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    pub fn fail_create_for(&self, hostname: &str) {
        self.fail_create.lock().unwrap().insert(hostname.to_string());
    }

    pub fn fail_delete_for(&self, hostname: &str) {
        self.fail_delete.lock().unwrap().insert(hostname.to_string());
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Stop failing for every hostname.
    pub fn heal(&self) {
        self.fail_create.lock().unwrap().clear();
        self.fail_delete.lock().unwrap().clear();
        self.fail_listing(false);
    }

    /// Hostnames that currently have a monitor on the backend, sorted.
    pub fn hostnames(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .inner
            .monitors()
            .into_iter()
            .map(|m| m.hostname)
            .collect();
        hosts.sort();
        hosts
    }

    fn injected(operation: &'static str, target: &str) -> BackendError {
        BackendError::Other {
            operation,
            message: format!("injected failure for {target}"),
        }
    }
}

#[async_trait]
impl UptimeBackend for FlakyBackend {
    async fn list_monitors(&self) -> Result<Vec<MonitorRecord>, BackendError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::injected("list_monitors", "listing"));
        }
        self.inner.list_monitors().await
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, BackendError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::injected("list_contacts", "listing"));
        }
        self.inner.list_contacts().await
    }

    async fn create_monitor(&self, spec: &MonitorSpec) -> Result<MonitorRecord, BackendError> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.lock().unwrap().contains(&spec.hostname) {
            return Err(Self::injected("create_monitor", &spec.hostname));
        }
        self.inner.create_monitor(spec).await
    }

    async fn delete_monitor(&self, id: MonitorId) -> Result<(), BackendError> {
        let hostname = self
            .inner
            .monitors()
            .into_iter()
            .find(|m| m.id == id)
            .map(|m| m.hostname);
        if let Some(hostname) = hostname {
            if self.fail_delete.lock().unwrap().contains(&hostname) {
                return Err(Self::injected("delete_monitor", &hostname));
            }
        }
        self.inner.delete_monitor(id).await
    }
}

/// Registry over `backend` with the backend's default contact.
pub(crate) fn registry_over(backend: &Arc<FlakyBackend>) -> Arc<MonitorRegistry> {
    Arc::new(MonitorRegistry::new(
        Arc::clone(backend) as Arc<dyn UptimeBackend>,
        RegistryConfig::default(),
    ))
}
