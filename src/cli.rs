// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line interface and runtime configuration.
//!
//! Every option can also be set through the environment, which is how the
//! operator is normally configured when running in a cluster.

use crate::backend::memory::InMemoryBackend;
use crate::backend::pingdom::PingdomClient;
use crate::backend::UptimeBackend;
use crate::constants::{
    DEFAULT_METRICS_ADDR, DEFAULT_PINGDOM_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS,
    ENV_PINGDOM_API_TOKEN, ENV_PINGDOM_API_URL, ENV_PINGDOM_CONTACT_ID,
};
use crate::monitor::{Contact, ContactId};
use crate::registry::RegistryConfig;
use crate::uptime_errors::BackendError;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Keep uptime monitors in step with the hostnames declared by Ingress resources.
#[derive(Debug, Parser)]
#[command(name = "upwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch Ingress resources and reconcile monitors until stopped
    Serve(ServeArgs),
    /// Reconcile Kubernetes watch events read from a file, then exit
    Replay(ReplayArgs),
    /// Print shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Options shared by every command that talks to the uptime backend.
#[derive(Debug, Clone, Args)]
pub struct BackendArgs {
    /// Pingdom API token
    #[arg(long, env = ENV_PINGDOM_API_TOKEN, hide_env_values = true)]
    pub api_token: Option<String>,

    /// Pingdom API base URL
    #[arg(long, env = ENV_PINGDOM_API_URL, default_value = DEFAULT_PINGDOM_API_URL)]
    pub api_url: String,

    /// Contact that owns new monitors (defaults to the first listed contact)
    #[arg(long, env = ENV_PINGDOM_CONTACT_ID)]
    pub contact_id: Option<u64>,

    /// Timeout for a single backend request, in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Use an in-memory backend instead of Pingdom
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    /// Kubeconfig file (defaults to `KUBECONFIG`, in-cluster config or ~/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Only watch Ingress resources in this namespace
    #[arg(long)]
    pub namespace: Option<String>,

    /// Bind address for the metrics and health server
    #[arg(long, default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,
}

#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    /// File of watch-event JSON lines, or `-` for stdin
    #[arg(long, default_value = "-")]
    pub file: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PINGDOM_API_TOKEN (or --api-token) is required unless --dry-run is set")]
    MissingApiToken,
    #[error("invalid API URL {url:?}: {reason}")]
    InvalidApiUrl { url: String, reason: String },
    #[error("API URL must use http or https, got {scheme:?}")]
    UnsupportedScheme { scheme: String },
    #[error("request timeout must be at least one second")]
    InvalidTimeout,
}

/// Where monitors are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    DryRun,
    Pingdom { api_url: Url, api_token: String },
}

/// Validated backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub target: BackendTarget,
    pub contact_id: Option<ContactId>,
    pub request_timeout: Duration,
}

impl BackendArgs {
    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the token is missing outside dry-run, the URL
    /// is invalid, or the timeout is zero.
    pub fn validate(&self) -> Result<BackendConfig, ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let target = if self.dry_run {
            BackendTarget::DryRun
        } else {
            let api_token = self
                .api_token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .ok_or(ConfigError::MissingApiToken)?
                .to_string();
            BackendTarget::Pingdom {
                api_url: parse_api_url(&self.api_url)?,
                api_token,
            }
        };

        Ok(BackendConfig {
            target,
            contact_id: self.contact_id.map(ContactId),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidApiUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::UnsupportedScheme {
            scheme: scheme.to_string(),
        }),
    }
}

impl BackendConfig {
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            contact_id: self.contact_id,
        }
    }

    /// Instantiate the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn build_backend(&self) -> Result<Arc<dyn UptimeBackend>, BackendError> {
        match &self.target {
            BackendTarget::DryRun => {
                // The configured contact must exist for the registry to accept it
                let backend = InMemoryBackend::with_contacts(vec![Contact {
                    id: self.contact_id.unwrap_or(ContactId(1)),
                    name: "dry-run".to_string(),
                }]);
                Ok(Arc::new(backend))
            }
            BackendTarget::Pingdom { api_url, api_token } => Ok(Arc::new(PingdomClient::new(
                api_url.as_str(),
                api_token.clone(),
                self.request_timeout,
            )?)),
        }
    }
}
