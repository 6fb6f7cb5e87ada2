// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Upwatch - Uptime Monitors for Kubernetes Ingress
//!
//! Upwatch keeps an uptime-monitoring account in step with the hostnames
//! declared by Kubernetes Ingress resources. Every routable hostname gets
//! exactly one HTTP check; when a hostname stops being declared its check is
//! deleted.
//!
//! ## Overview
//!
//! - A watch feeds resource-change notifications (add, update, delete) into the
//!   [`reconciler::Reconciler`]
//! - The reconciler diffs the previous and current hostnames of a resource
//! - The [`registry::MonitorRegistry`] caches the backend's monitors by hostname
//!   and serializes every create and delete per hostname
//! - An [`backend::UptimeBackend`] performs the remote calls (Pingdom, or an
//!   in-memory backend for dry runs)
//!
//! ## Modules
//!
//! - [`resource`] - Routing resources (identity, rules, TLS hosts)
//! - [`monitor`] - Monitor specs, records and naming
//! - [`notification`] - Add/update/delete notifications and tombstones
//! - [`backend`] - Uptime backend trait and implementations
//! - [`registry`] - Hostname-keyed monitor cache with per-hostname locking
//! - [`reconciler`] - Create and delete monitors from resource diffs
//! - [`watch`] - Kubernetes watch and watch-event replay
//! - [`server`] - Metrics, health and registry endpoints
//! - [`metrics`] - Prometheus metrics
//! - [`cli`] - Command line and configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use upwatch::backend::memory::InMemoryBackend;
//! use upwatch::reconciler::Reconciler;
//! use upwatch::registry::{MonitorRegistry, RegistryConfig};
//! use upwatch::resource::LogicalResource;
//!
//! # async fn example() {
//! let registry = Arc::new(MonitorRegistry::new(
//!     Arc::new(InMemoryBackend::new()),
//!     RegistryConfig::default(),
//! ));
//! let reconciler = Reconciler::new(registry, tracing::info_span!("reconciler"));
//!
//! let web = LogicalResource::new("default", "web")
//!     .with_rule("www.example.com")
//!     .with_tls_host("www.example.com");
//! reconciler.on_add(&web).await;
//! # }
//! ```

pub mod backend;
pub mod cli;
pub mod constants;
pub mod metrics;
pub mod monitor;
pub mod notification;
pub mod reconciler;
pub mod registry;
pub mod resource;
pub mod server;
pub mod uptime_errors;
pub mod watch;

#[cfg(test)]
mod registry_tests;
#[cfg(test)]
mod test_support;
#[cfg(test)]
mod watch_tests;
