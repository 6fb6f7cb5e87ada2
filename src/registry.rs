// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Monitor registry: the in-process source of truth for which hostnames have
//! a monitor and what the backend calls it.
//!
//! The registry wraps an [`UptimeBackend`] and caches every monitor keyed by
//! hostname. The cache is populated once, lazily, from a full listing of the
//! account and is afterwards kept consistent by local mutation on every
//! successful create or delete. It is only re-listed when [`MonitorRegistry::sync`]
//! is called explicitly.
//!
//! # Locking
//!
//! Every check-then-act sequence on a hostname (look up, then create or delete)
//! runs under a per-hostname async lock that is held across the backend call.
//! Two reconciliations can therefore never create the same hostname twice or
//! race a create against a delete, while unrelated hostnames proceed
//! concurrently. The cache map itself is behind a short-lived `RwLock` that is
//! never held across an `.await`.
//!
//! # Failure semantics
//!
//! Backend errors are returned untouched and never retried. A failed create
//! leaves the cache unchanged; a failed delete keeps the cached entry so a later
//! attempt can reuse the same identifier.

use crate::backend::UptimeBackend;
use crate::metrics;
use crate::monitor::{Contact, ContactId, MonitorId, MonitorRecord, MonitorSpec};
use crate::uptime_errors::RegistryError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OnceCell, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Registry settings supplied at construction.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Contact that owns every monitor the registry creates.
    ///
    /// When `None`, the first contact listed by the backend is used.
    pub contact_id: Option<ContactId>,
}

/// Pick the contact that will own new monitors.
///
/// # Errors
///
/// Returns [`RegistryError::NoContacts`] if the account has no contacts and
/// [`RegistryError::UnknownContact`] if a configured contact is not among them.
pub fn select_contact(
    contacts: &[Contact],
    configured: Option<ContactId>,
) -> Result<ContactId, RegistryError> {
    let first = contacts.first().ok_or(RegistryError::NoContacts)?;

    match configured {
        Some(contact_id) if contacts.iter().any(|c| c.id == contact_id) => Ok(contact_id),
        Some(contact_id) => Err(RegistryError::UnknownContact { contact_id }),
        None => {
            warn!(
                contact_id = %first.id,
                contact_name = %first.name,
                "No contact configured; new monitors will be owned by the first listed contact"
            );
            Ok(first.id)
        }
    }
}

/// Per-hostname async locks.
///
/// Entries are dropped again once nobody holds or waits for them.
#[derive(Debug, Default)]
struct HostLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl HostLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock(&self, hostname: &str) -> HostGuard<'_> {
        let lock = Arc::clone(self.map().entry(hostname.to_string()).or_default());
        let guard = lock.lock_owned().await;
        HostGuard {
            locks: self,
            hostname: hostname.to_string(),
            guard: Some(guard),
        }
    }
}

struct HostGuard<'a> {
    locks: &'a HostLocks,
    hostname: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for HostGuard<'_> {
    fn drop(&mut self) {
        let mut map = self.locks.map();
        drop(self.guard.take());
        // Only the map's own reference left: no holder, no waiter
        if map
            .get(&self.hostname)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.hostname);
        }
    }
}

/// Cache of backend monitors keyed by hostname.
pub struct MonitorRegistry {
    backend: Arc<dyn UptimeBackend>,
    config: RegistryConfig,
    contact: OnceCell<ContactId>,
    cache: RwLock<HashMap<String, MonitorRecord>>,
    host_locks: HostLocks,
}

impl std::fmt::Debug for MonitorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorRegistry")
            .field("config", &self.config)
            .field("contact", &self.contact.get())
            .field("monitors", &self.len())
            .finish_non_exhaustive()
    }
}

impl MonitorRegistry {
    /// Create an uninitialized registry. Nothing is fetched until first use.
    #[must_use]
    pub fn new(backend: Arc<dyn UptimeBackend>, config: RegistryConfig) -> Self {
        Self {
            backend,
            config,
            contact: OnceCell::new(),
            cache: RwLock::new(HashMap::new()),
            host_locks: HostLocks::default(),
        }
    }

    /// Load contacts and monitors from the backend, exactly once.
    ///
    /// Concurrent callers wait for the single in-flight initialization. If it
    /// fails the registry stays uninitialized and the next caller tries again,
    /// but nothing can be created until it succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable, the account has no
    /// contacts, or the configured contact does not exist.
    pub async fn initialize(&self) -> Result<ContactId, RegistryError> {
        self.contact
            .get_or_try_init(|| self.load())
            .await
            .copied()
    }

    async fn load(&self) -> Result<ContactId, RegistryError> {
        debug!("Initializing monitor registry");
        let contacts = self.backend.list_contacts().await.inspect_err(|e| {
            metrics::record_backend_error(e.operation());
        })?;
        let contact_id = select_contact(&contacts, self.config.contact_id)?;

        let loaded = self.merge_listing().await?;
        info!(
            contact_id = %contact_id,
            monitors = loaded,
            "Monitor registry initialized"
        );
        Ok(contact_id)
    }

    /// List every backend monitor and merge it into the cache.
    async fn merge_listing(&self) -> Result<usize, RegistryError> {
        let monitors = self.backend.list_monitors().await.inspect_err(|e| {
            metrics::record_backend_error(e.operation());
        })?;
        let count = monitors.len();

        let mut cache = self.write();
        for record in monitors {
            if record.hostname.is_empty() {
                debug!(monitor_id = %record.id, name = %record.name, "Ignoring monitor without hostname");
                continue;
            }
            if let Some(previous) = cache.get(&record.hostname) {
                if previous.id != record.id {
                    warn!(
                        hostname = %record.hostname,
                        kept = %record.id,
                        shadowed = %previous.id,
                        "Several monitors share a hostname; keeping the last listed"
                    );
                }
            }
            cache.insert(record.hostname.clone(), record);
        }
        metrics::set_active_monitors(cache.len());
        Ok(count)
    }

    /// Re-list the backend and merge the result into the cache.
    ///
    /// Monitors created outside the operator become visible; entries for
    /// monitors deleted outside the operator are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization or the listing fails.
    pub async fn sync(&self) -> Result<usize, RegistryError> {
        if !self.is_initialized() {
            self.initialize().await?;
            return Ok(self.len());
        }
        self.merge_listing().await
    }

    /// Whether initialization has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.contact.initialized()
    }

    /// Contact owning new monitors, once initialized.
    #[must_use]
    pub fn contact_id(&self) -> Option<ContactId> {
        self.contact.get().copied()
    }

    /// Whether `hostname` has a cached monitor. No backend call beyond the
    /// one-time initialization.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be initialized.
    pub async fn exists(&self, hostname: &str) -> Result<bool, RegistryError> {
        Ok(self.get(hostname).await?.is_some())
    }

    /// Cached record for `hostname`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be initialized.
    pub async fn get(&self, hostname: &str) -> Result<Option<MonitorRecord>, RegistryError> {
        self.initialize().await?;
        Ok(self.read().get(hostname).cloned())
    }

    /// Create the monitor described by `spec` and cache it.
    ///
    /// If the hostname already has a cached monitor (another reconciliation
    /// got there first) its identifier is returned and the backend is not
    /// called.
    ///
    /// # Errors
    ///
    /// Returns the backend error untouched; the cache is unchanged.
    pub async fn create(&self, spec: MonitorSpec) -> Result<MonitorId, RegistryError> {
        let contact_id = self.initialize().await?;
        let _guard = self.host_locks.lock(&spec.hostname).await;

        let existing = self.read().get(&spec.hostname).map(|r| r.id);
        if let Some(id) = existing {
            debug!(
                hostname = %spec.hostname,
                monitor_id = %id,
                "Monitor appeared while waiting for the hostname lock, not creating"
            );
            return Ok(id);
        }

        self.create_locked(spec.with_contact(contact_id)).await
    }

    /// Delete the monitor cached for `hostname`.
    ///
    /// Succeeds without calling the backend when nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns the backend error untouched; the cached entry is kept.
    pub async fn delete(&self, hostname: &str) -> Result<(), RegistryError> {
        self.initialize().await?;
        let _guard = self.host_locks.lock(hostname).await;
        self.delete_locked(hostname).await
    }

    /// Delete whatever monitor `spec.hostname` has, then create `spec`.
    ///
    /// Both steps run under one hostname lock. If the delete fails nothing
    /// is created; if the create fails the hostname is left without a monitor.
    ///
    /// # Errors
    ///
    /// Returns the first backend error encountered.
    pub async fn replace(&self, spec: MonitorSpec) -> Result<MonitorId, RegistryError> {
        let contact_id = self.initialize().await?;
        let _guard = self.host_locks.lock(&spec.hostname).await;

        self.delete_locked(&spec.hostname).await?;
        self.create_locked(spec.with_contact(contact_id)).await
    }

    async fn create_locked(&self, spec: MonitorSpec) -> Result<MonitorId, RegistryError> {
        let record = self.backend.create_monitor(&spec).await.inspect_err(|e| {
            metrics::record_backend_error(e.operation());
        })?;
        let id = record.id;

        let mut cache = self.write();
        cache.insert(spec.hostname.clone(), record);
        metrics::record_monitor_created();
        metrics::set_active_monitors(cache.len());
        Ok(id)
    }

    async fn delete_locked(&self, hostname: &str) -> Result<(), RegistryError> {
        let Some(id) = self.read().get(hostname).map(|r| r.id) else {
            return Ok(());
        };

        self.backend.delete_monitor(id).await.inspect_err(|e| {
            metrics::record_backend_error(e.operation());
        })?;

        let mut cache = self.write();
        cache.remove(hostname);
        metrics::record_monitor_deleted();
        metrics::set_active_monitors(cache.len());
        Ok(())
    }

    /// Copy of the hostname to record mapping.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, MonitorRecord> {
        self.read().clone()
    }

    /// Number of cached monitors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, MonitorRecord>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, MonitorRecord>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}
