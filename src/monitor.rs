// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Monitor types shared by the registry, the reconciler and the backends.
//!
//! A [`MonitorSpec`] is the desired state of one uptime check, derived from a
//! hostname declared by a routing resource. A [`MonitorRecord`] is what the
//! backend confirmed: the same fields plus the backend-assigned [`MonitorId`].

use crate::constants::{CHECK_INTERVAL_MINUTES, HTTPS_PORT, HTTP_PORT};
use crate::resource::ResourceRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-assigned monitor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(pub u64);

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend-assigned contact identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub u64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An alerting contact known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
}

/// Port probed for a hostname: 443 when it terminates TLS, 80 otherwise.
#[must_use]
pub fn probe_port(tls: bool) -> u16 {
    if tls {
        HTTPS_PORT
    } else {
        HTTP_PORT
    }
}

/// Human-readable monitor name: `"{namespace}/{name} ({hostname}:{port})"`.
#[must_use]
pub fn display_name(owner: &ResourceRef, hostname: &str, port: u16) -> String {
    format!("{owner} ({hostname}:{port})")
}

/// Recover the TLS flag from a display name.
///
/// Listing monitors does not report whether a check uses TLS, so records
/// loaded at startup rely on the port embedded in the name.
#[must_use]
pub fn tls_from_display_name(name: &str) -> bool {
    name.trim_end()
        .strip_suffix(')')
        .and_then(|rest| rest.rsplit_once(':'))
        .is_some_and(|(_, port)| port == HTTPS_PORT.to_string())
}

/// Desired state of one monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSpec {
    /// Unique key: at most one live monitor per hostname.
    pub hostname: String,
    pub name: String,
    pub tls: bool,
    pub interval_minutes: u32,
    /// Owning contact. Filled in by the registry just before creation.
    pub contact_id: Option<ContactId>,
}

impl MonitorSpec {
    /// Build the spec for `hostname` declared by `owner`.
    #[must_use]
    pub fn for_host(owner: &ResourceRef, hostname: &str, tls: bool) -> Self {
        Self {
            hostname: hostname.to_string(),
            name: display_name(owner, hostname, probe_port(tls)),
            tls,
            interval_minutes: CHECK_INTERVAL_MINUTES,
            contact_id: None,
        }
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        probe_port(self.tls)
    }

    #[must_use]
    pub fn with_contact(mut self, contact_id: ContactId) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    /// Whether an existing record already matches this spec.
    ///
    /// The backend has no in-place update, so a mismatch means the monitor
    /// must be deleted and created again.
    #[must_use]
    pub fn matches(&self, record: &MonitorRecord) -> bool {
        record.hostname == self.hostname && record.name == self.name && record.tls == self.tls
    }
}

/// Backend-confirmed state of a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRecord {
    pub id: MonitorId,
    pub hostname: String,
    pub name: String,
    pub tls: bool,
    pub interval_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<ContactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl MonitorRecord {
    /// Combine a spec with the identifier the backend assigned to it.
    #[must_use]
    pub fn from_spec(id: MonitorId, spec: &MonitorSpec) -> Self {
        Self {
            id,
            hostname: spec.hostname.clone(),
            name: spec.name.clone(),
            tls: spec.tls,
            interval_minutes: spec.interval_minutes,
            contact_id: spec.contact_id,
            created_at: None,
        }
    }
}
