// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Uptime backend, registry and notification error types for Upwatch.
//!
//! This module provides specialized error types for:
//! - Uptime backend HTTP API operations (list, create, delete)
//! - Monitor registry initialization (contact selection)
//! - Malformed payloads arriving at the watch boundary
//!
//! None of these errors abort the watch loop. Reconciliation reports them per
//! hostname and moves on; only registry initialization failures are fatal.

use crate::monitor::ContactId;
use thiserror::Error;

/// Errors returned by an uptime backend.
///
/// Every variant names the backend operation that failed so that log lines
/// and metrics can be attributed without parsing messages.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The request never produced an HTTP response (DNS, TCP, TLS, timeout)
    #[error("{operation}: request to uptime backend failed: {source}")]
    Transport {
        /// Backend operation (e.g. `create_monitor`)
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status code
    #[error("{operation}: uptime backend returned HTTP {status}: {message}")]
    Api {
        /// Backend operation (e.g. `create_monitor`)
        operation: &'static str,
        /// HTTP status code
        status: u16,
        /// Error message extracted from the response body
        message: String,
    },

    /// The backend answered successfully but the body could not be understood
    #[error("{operation}: unexpected response from uptime backend: {reason}")]
    Decode {
        /// Backend operation (e.g. `list_monitors`)
        operation: &'static str,
        /// Decoder error
        reason: String,
    },

    /// Failure reported by a non-HTTP backend
    #[error("{operation}: {message}")]
    Other {
        /// Backend operation
        operation: &'static str,
        /// Description of the failure
        message: String,
    },
}

impl BackendError {
    /// Name of the backend operation that failed.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Transport { operation, .. }
            | Self::Api { operation, .. }
            | Self::Decode { operation, .. }
            | Self::Other { operation, .. } => operation,
        }
    }
}

/// Errors returned by the monitor registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A backend call failed; the cache was left as it was before the call
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The account has no contacts, so no monitor can be owned by anyone
    #[error("uptime backend returned no contacts; cannot select an owner for new monitors")]
    NoContacts,

    /// The configured contact does not exist on the account
    #[error("configured contact {contact_id} is not one of the account's contacts")]
    UnknownContact {
        /// Contact identifier from configuration
        contact_id: ContactId,
    },
}

/// A payload at the watch boundary that is not a routing resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedNotification {
    /// The payload is not an `Ingress` at all
    #[error("{handler} unexpected type {kind}: {value}")]
    UnexpectedType {
        /// Handler that received the payload (`OnAdd`, `OnUpdate`, `OnDelete`)
        handler: &'static str,
        /// Kind of the payload (object `kind` or JSON type)
        kind: String,
        /// The payload, serialized
        value: String,
    },

    /// The payload claims to be an `Ingress` but does not decode as one
    #[error("{handler} could not decode {kind}: {reason}")]
    Undecodable {
        /// Handler that received the payload
        handler: &'static str,
        /// Kind of the payload
        kind: String,
        /// Decoder error
        reason: String,
    },

    /// The watch event itself is not a recognized event envelope
    #[error("invalid watch event: {reason}")]
    InvalidEvent {
        /// Why the envelope was rejected
        reason: String,
    },
}
