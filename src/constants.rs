// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Upwatch operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Monitor Constants
// ============================================================================

/// Port probed for hostnames served in plain HTTP
pub const HTTP_PORT: u16 = 80;

/// Port probed for hostnames listed in an Ingress TLS block
pub const HTTPS_PORT: u16 = 443;

/// Check interval for every monitor created by the operator (minutes)
pub const CHECK_INTERVAL_MINUTES: u32 = 1;

/// Check type requested from the uptime backend
pub const CHECK_TYPE_HTTP: &str = "http";

/// Number of consecutive failures before the backend notifies contacts.
///
/// The Pingdom API rejects check creation when this is omitted.
pub const SEND_NOTIFICATION_WHEN_DOWN: u32 = 1;

// ============================================================================
// Pingdom API Constants
// ============================================================================

/// Default Pingdom REST API base URL
pub const DEFAULT_PINGDOM_API_URL: &str = "https://api.pingdom.com/api/3.1";

/// Environment variable holding the Pingdom API token
pub const ENV_PINGDOM_API_TOKEN: &str = "PINGDOM_API_TOKEN";

/// Environment variable overriding the Pingdom API base URL
pub const ENV_PINGDOM_API_URL: &str = "PINGDOM_API_URL";

/// Environment variable selecting the owning contact for new monitors
pub const ENV_PINGDOM_CONTACT_ID: &str = "PINGDOM_CONTACT_ID";

/// Default timeout for a single backend HTTP request (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Kubernetes Constants
// ============================================================================

/// Kind name of the watched routing resource
pub const KIND_INGRESS: &str = "Ingress";

// ============================================================================
// Server Constants
// ============================================================================

/// Default bind address for the metrics and health server
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Namespace prefix for all Prometheus metrics
pub const METRICS_NAMESPACE: &str = "upwatch";
