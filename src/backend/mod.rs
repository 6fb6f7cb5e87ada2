// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Uptime monitoring backends.
//!
//! The [`UptimeBackend`] trait is the seam between the monitor registry and the
//! remote service that actually probes hostnames. Every call is a single
//! network round trip that may fail; backends never retry and never cache.
//!
//! # Implementations
//!
//! - [`pingdom::PingdomClient`] - Pingdom 3.1 REST API over reqwest
//! - [`memory::InMemoryBackend`] - in-process backend for `--dry-run` and tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use upwatch::backend::{pingdom::PingdomClient, UptimeBackend};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = PingdomClient::new(
//!     "https://api.pingdom.com/api/3.1",
//!     "my-token",
//!     Duration::from_secs(30),
//! )?;
//! let monitors = client.list_monitors().await?;
//! println!("{} monitors", monitors.len());
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod pingdom;


use crate::monitor::{Contact, MonitorId, MonitorRecord, MonitorSpec};
use crate::uptime_errors::BackendError;
use async_trait::async_trait;

/// Operations the monitor registry needs from an uptime service.
#[async_trait]
pub trait UptimeBackend: Send + Sync {
    /// List every monitor on the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    async fn list_monitors(&self) -> Result<Vec<MonitorRecord>, BackendError>;

    /// List the account's alerting contacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded.
    async fn list_contacts(&self) -> Result<Vec<Contact>, BackendError>;

    /// Create a monitor and return the backend-confirmed record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the monitor or the request fails.
    async fn create_monitor(&self, spec: &MonitorSpec) -> Result<MonitorRecord, BackendError>;

    /// Delete the monitor with identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the deletion or the request fails.
    async fn delete_monitor(&self, id: MonitorId) -> Result<(), BackendError>;
}
