// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource-change notifications delivered to the reconciler.
//!
//! Notifications are strongly typed: by the time one is built, its payloads
//! have already been validated as routing resources at the watch boundary.

use crate::resource::{describe_kind, LogicalResource, ResourceRef};
use crate::uptime_errors::MalformedNotification;
use serde_json::Value;

/// Handler names used when reporting malformed payloads.
pub const HANDLER_ON_ADD: &str = "OnAdd";
pub const HANDLER_ON_UPDATE: &str = "OnUpdate";
pub const HANDLER_ON_DELETE: &str = "OnDelete";

/// Kind used for tombstone wrappers in untyped payloads.
pub const KIND_TOMBSTONE: &str = "DeletedFinalStateUnknown";

/// Payload of a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletedResource {
    /// The object as it was when the delete was observed.
    Live(LogicalResource),
    /// The delete itself was missed; `last_known` is the last state seen
    /// before the object disappeared (e.g. discovered during a relist).
    Tombstone {
        key: String,
        last_known: LogicalResource,
    },
}

impl DeletedResource {
    /// The resource carried by the payload, with any tombstone removed.
    ///
    /// Unwrapping an already-live payload returns it unchanged.
    #[must_use]
    pub fn unwrap_tombstone(self) -> LogicalResource {
        match self {
            Self::Live(resource) | Self::Tombstone { last_known: resource, .. } => resource,
        }
    }

    #[must_use]
    pub fn resource(&self) -> &LogicalResource {
        match self {
            Self::Live(resource) | Self::Tombstone { last_known: resource, .. } => resource,
        }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone { .. })
    }

    /// Decode an untyped deletion payload.
    ///
    /// Accepts either an `Ingress` or a tombstone wrapper
    /// `{"kind": "DeletedFinalStateUnknown", "key": ..., "obj": ...}`. Wrappers
    /// nested inside wrappers are unwrapped down to the innermost object.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedNotification`] if the innermost object is not an `Ingress`.
    pub fn from_value(value: &Value) -> Result<Self, MalformedNotification> {
        if describe_kind(value) != KIND_TOMBSTONE {
            return LogicalResource::from_value(HANDLER_ON_DELETE, value).map(Self::Live);
        }

        let inner = value.get("obj").unwrap_or(&Value::Null);
        let last_known = Self::from_value(inner)?.unwrap_tombstone();
        let key = value
            .get("key")
            .and_then(Value::as_str)
            .map_or_else(|| last_known.identity.key(), str::to_string);

        Ok(Self::Tombstone { key, last_known })
    }
}

/// A change to one routing resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Added(LogicalResource),
    Updated {
        previous: LogicalResource,
        current: LogicalResource,
    },
    Deleted(DeletedResource),
}

impl Notification {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Updated { .. } => "updated",
            Self::Deleted(_) => "deleted",
        }
    }

    /// Identity of the resource the notification is about.
    #[must_use]
    pub fn identity(&self) -> &ResourceRef {
        match self {
            Self::Added(resource) | Self::Updated { current: resource, .. } => &resource.identity,
            Self::Deleted(deleted) => &deleted.resource().identity,
        }
    }
}
