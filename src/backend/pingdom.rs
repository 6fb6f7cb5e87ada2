// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pingdom 3.1 REST API backend.
//!
//! All requests authenticate with a bearer token and exchange JSON. Errors are
//! classified into [`BackendError`] variants: transport failures, non-success
//! HTTP statuses (with the message from Pingdom's error envelope) and
//! undecodable bodies.
//!
//! The client applies a per-request timeout; there is no retry layer. A failed
//! call is reported to the registry, which leaves its cache unchanged.

use super::UptimeBackend;
use crate::constants::{CHECK_INTERVAL_MINUTES, CHECK_TYPE_HTTP, SEND_NOTIFICATION_WHEN_DOWN};
use crate::monitor::{tls_from_display_name, Contact, ContactId, MonitorId, MonitorRecord, MonitorSpec};
use crate::uptime_errors::BackendError;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client as HttpClient, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

// ===== Wire types =====

#[derive(Debug, Deserialize)]
struct ChecksResponse {
    #[serde(default)]
    checks: Vec<CheckSummary>,
}

#[derive(Debug, Deserialize)]
struct CheckSummary {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    resolution: Option<u32>,
    #[serde(default)]
    created: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ContactsResponse {
    #[serde(default)]
    contacts: Vec<ContactSummary>,
}

#[derive(Debug, Deserialize)]
struct ContactSummary {
    id: u64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateCheckRequest<'a> {
    name: &'a str,
    host: &'a str,
    #[serde(rename = "type")]
    check_type: &'a str,
    resolution: u32,
    encryption: bool,
    sendnotificationwhendown: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    userids: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateCheckResponse {
    check: CreatedCheck,
}

#[derive(Debug, Deserialize)]
struct CreatedCheck {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    statusdesc: Option<String>,
    #[serde(default)]
    errormessage: Option<String>,
}

impl From<CheckSummary> for MonitorRecord {
    fn from(check: CheckSummary) -> Self {
        Self {
            id: MonitorId(check.id),
            tls: tls_from_display_name(&check.name),
            hostname: check.hostname,
            name: check.name,
            interval_minutes: check.resolution.unwrap_or(CHECK_INTERVAL_MINUTES),
            contact_id: None,
            created_at: check.created.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        }
    }
}

/// Build the API base URL, dropping any trailing slashes.
pub(crate) fn build_api_url(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}

/// Extract a human-readable message from a Pingdom error body.
///
/// Falls back to the raw body when it is not a Pingdom error envelope.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope
            .error
            .errormessage
            .or(envelope.error.statusdesc)
            .unwrap_or_else(|| body.to_string()),
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Pingdom REST API client.
#[derive(Debug, Clone)]
pub struct PingdomClient {
    client: HttpClient,
    base_url: String,
    token: Arc<String>,
}

impl PingdomClient {
    /// Create a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| BackendError::Transport {
                operation: "build_client",
                source,
            })?;

        Ok(Self {
            client,
            base_url: build_api_url(base_url),
            token: Arc::new(token.into()),
        })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and decode a successful JSON response as `T`.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = request
            .bearer_auth(self.token.as_str())
            .send()
            .await
            .map_err(|source| BackendError::Transport { operation, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| BackendError::Transport { operation, source })?;

        if !status.is_success() {
            let message = error_message(&body);
            error!(
                operation = operation,
                status = %status,
                error = %message,
                "Pingdom API request failed"
            );
            return Err(BackendError::Api {
                operation,
                status: status.as_u16(),
                message,
            });
        }

        // Deletions may answer with an empty body
        let payload = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(payload).map_err(|e| BackendError::Decode {
            operation,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl UptimeBackend for PingdomClient {
    async fn list_monitors(&self) -> Result<Vec<MonitorRecord>, BackendError> {
        debug!(url = %self.url("checks"), "Listing Pingdom checks");
        let response: ChecksResponse = self
            .send("list_monitors", self.client.get(self.url("checks")))
            .await?;

        Ok(response
            .checks
            .into_iter()
            .map(MonitorRecord::from)
            .collect())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, BackendError> {
        debug!(url = %self.url("alerting/contacts"), "Listing Pingdom contacts");
        let response: ContactsResponse = self
            .send("list_contacts", self.client.get(self.url("alerting/contacts")))
            .await?;

        Ok(response
            .contacts
            .into_iter()
            .map(|c| Contact {
                id: ContactId(c.id),
                name: c.name,
            })
            .collect())
    }

    async fn create_monitor(&self, spec: &MonitorSpec) -> Result<MonitorRecord, BackendError> {
        let body = CreateCheckRequest {
            name: &spec.name,
            host: &spec.hostname,
            check_type: CHECK_TYPE_HTTP,
            resolution: spec.interval_minutes,
            encryption: spec.tls,
            sendnotificationwhendown: SEND_NOTIFICATION_WHEN_DOWN,
            userids: spec.contact_id.map(|id| id.to_string()),
        };

        debug!(hostname = %spec.hostname, name = %spec.name, "Creating Pingdom check");
        let response: CreateCheckResponse = self
            .send(
                "create_monitor",
                self.client.post(self.url("checks")).json(&body),
            )
            .await?;

        Ok(MonitorRecord::from_spec(MonitorId(response.check.id), spec))
    }

    async fn delete_monitor(&self, id: MonitorId) -> Result<(), BackendError> {
        debug!(monitor_id = %id, "Deleting Pingdom check");
        let _: IgnoredAny = self
            .send(
                "delete_monitor",
                self.client.delete(self.url(&format!("checks/{id}"))),
            )
            .await?;
        Ok(())
    }
}
