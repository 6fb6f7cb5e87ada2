// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Routing resources as seen by the reconciler.
//!
//! A [`LogicalResource`] is the reconciler's view of an `Ingress`: its identity,
//! the hostnames it declares and which of those hostnames terminate TLS.
//! Everything else on the Kubernetes object (backends, paths, annotations) is
//! irrelevant to uptime monitoring and is dropped during conversion.
//!
//! Two conversions exist:
//!
//! - [`From<&Ingress>`] for typed objects delivered by the kube watcher
//! - [`LogicalResource::from_value`] for untyped JSON arriving at the system
//!   boundary (replayed watch events), which is where malformed payloads are
//!   detected and rejected

use crate::constants::KIND_INGRESS;
use crate::uptime_errors::MalformedNotification;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Stable `(namespace, name)` identity of a routing resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceRef {
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Store key in the `namespace/name` form used by Kubernetes caches.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One declared route. An empty hostname means the rule has no routable host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingRule {
    pub hostname: String,
}

impl RoutingRule {
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }

    /// Rules without a hostname never get a monitor.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        !self.hostname.is_empty()
    }
}

/// Snapshot of a routing resource at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogicalResource {
    pub identity: ResourceRef,
    /// Rules in declaration order.
    pub rules: Vec<RoutingRule>,
    /// Hostnames listed in the resource's TLS blocks.
    pub tls_hosts: BTreeSet<String>,
}

impl LogicalResource {
    /// Create a resource with no rules.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identity: ResourceRef::new(namespace, name),
            rules: Vec::new(),
            tls_hosts: BTreeSet::new(),
        }
    }

    /// Append a rule for `hostname` (builder style).
    #[must_use]
    pub fn with_rule(mut self, hostname: impl Into<String>) -> Self {
        self.rules.push(RoutingRule::new(hostname));
        self
    }

    /// Mark `hostname` as TLS-enabled (builder style).
    #[must_use]
    pub fn with_tls_host(mut self, hostname: impl Into<String>) -> Self {
        self.tls_hosts.insert(hostname.into());
        self
    }

    /// An empty resource carrying this resource's identity.
    ///
    /// Stands in for the missing side of an add or delete so that log lines
    /// and monitor names always have an identity to refer to.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            rules: Vec::new(),
            tls_hosts: BTreeSet::new(),
        }
    }

    /// Whether `hostname` appears in one of the resource's TLS blocks.
    #[must_use]
    pub fn is_tls(&self, hostname: &str) -> bool {
        self.tls_hosts.contains(hostname)
    }

    /// Decode an untyped payload into a resource.
    ///
    /// Only objects whose `kind` is `Ingress` are accepted. Anything else
    /// (strings, arrays, other kinds) is reported as a malformed notification
    /// naming `handler`, the offending kind and the value itself.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedNotification`] if the value is not an `Ingress` or
    /// cannot be decoded as one.
    pub fn from_value(handler: &'static str, value: &Value) -> Result<Self, MalformedNotification> {
        let kind = describe_kind(value);
        if kind != KIND_INGRESS {
            return Err(MalformedNotification::UnexpectedType {
                handler,
                kind,
                value: value.to_string(),
            });
        }

        let ingress: Ingress = serde_json::from_value(value.clone()).map_err(|e| {
            MalformedNotification::Undecodable {
                handler,
                kind: kind.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self::from(&ingress))
    }
}

impl From<&Ingress> for LogicalResource {
    fn from(ingress: &Ingress) -> Self {
        let spec = ingress.spec.as_ref();

        let rules = spec
            .and_then(|s| s.rules.as_ref())
            .map(|rules| {
                rules
                    .iter()
                    .map(|r| RoutingRule::new(r.host.clone().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();

        let tls_hosts = spec
            .and_then(|s| s.tls.as_ref())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|tls| tls.hosts.as_ref())
                    .flatten()
                    .filter(|h| !h.is_empty())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            identity: ResourceRef::new(ingress.namespace().unwrap_or_default(), ingress.name_any()),
            rules,
            tls_hosts,
        }
    }
}

/// Name the kind of an untyped value: its `kind` field for objects that have
/// one, otherwise the JSON type.
pub(crate) fn describe_kind(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .get("kind")
            .and_then(Value::as_str)
            .map_or_else(|| "object".to_string(), str::to_string),
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "array".to_string(),
    }
}
